// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Networked transcript backend (§4.1 "Networked"): messages are published
//! to a JetStream stream, and the metadata bag lives in a JetStream
//! key-value bucket. There is no file lock to coordinate writers; instead
//! the KV bucket's revision-gated update gives the same single-writer
//! serialization as the file backend's flock, with the loser of a race
//! retrying against the new revision.

use std::collections::BTreeMap;
use std::time::Duration;

use async_nats::jetstream::{self, kv, stream};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ConversationMetadata, ExpectedSender, HealthReport, TranscriptStore};
use crate::error::{EngineError, Result};
use crate::message::{normalize_sender, Message, MessageMetadata};

const MAX_CAS_RETRIES: u32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NatsState {
    total_turns: u64,
    per_sender_turns: BTreeMap<String, u64>,
    total_tokens: u64,
    terminated: bool,
    termination_reason: Option<String>,
    termination_timestamp: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    last_sender: Option<String>,
}

impl NatsState {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            total_turns: 0,
            per_sender_turns: BTreeMap::new(),
            total_tokens: 0,
            terminated: false,
            termination_reason: None,
            termination_timestamp: None,
            created_at: now,
            last_sender: None,
        }
    }

    fn into_public(self) -> ConversationMetadata {
        ConversationMetadata {
            total_turns: self.total_turns,
            per_sender_turns: self.per_sender_turns,
            total_tokens: self.total_tokens,
            terminated: self.terminated,
            termination_reason: self.termination_reason,
            termination_timestamp: self.termination_timestamp,
            created_at: self.created_at,
        }
    }
}

/// Multi-process [`TranscriptStore`] backed by NATS JetStream.
#[derive(Clone)]
pub struct NatsStore {
    jetstream: jetstream::Context,
    kv: kv::Store,
    subject: String,
    stream_name: String,
    state_key: String,
    max_message_length: usize,
}

impl NatsStore {
    /// Connect to `url` and provision (or bind to) the stream and KV
    /// bucket for conversation `conversation_id`.
    pub async fn connect(url: &str, conversation_id: &str, max_message_length: usize) -> Result<Self> {
        let client = async_nats::connect(url)
            .await
            .map_err(|e| EngineError::store_unavailable(format!("nats connect: {e}")))?;
        let jetstream = jetstream::new(client);

        let stream_name = "PARLEY_TRANSCRIPTS".to_owned();
        let subject = format!("parley.conversations.{conversation_id}.messages");
        jetstream
            .get_or_create_stream(stream::Config {
                name: stream_name.clone(),
                subjects: vec!["parley.conversations.*.messages".to_owned()],
                ..Default::default()
            })
            .await
            .map_err(|e| EngineError::store_unavailable(format!("get_or_create_stream: {e}")))?;

        let kv = jetstream
            .get_or_create_key_value(kv::Config {
                bucket: "parley_conversation_state".to_owned(),
                history: 5,
                ..Default::default()
            })
            .await
            .map_err(|e| EngineError::store_unavailable(format!("get_or_create_key_value: {e}")))?;

        Ok(Self {
            jetstream,
            kv,
            subject,
            stream_name,
            state_key: format!("conversation.{conversation_id}"),
            max_message_length,
        })
    }

    async fn read_state(&self) -> Result<(NatsState, Option<u64>)> {
        match self.kv.entry(&self.state_key).await {
            Ok(Some(entry)) => {
                let state: NatsState = serde_json::from_slice(&entry.value)?;
                Ok((state, Some(entry.revision)))
            }
            Ok(None) => Ok((NatsState::new(Utc::now()), None)),
            Err(e) => Err(EngineError::store_unavailable(format!("kv entry: {e}"))),
        }
    }

    /// Compare-and-set a new state, retrying against the latest revision
    /// on conflict. `body` recomputes the next state from the latest read
    /// each attempt so a concurrent writer's update is not silently lost.
    async fn cas_update<T>(
        &self,
        mut body: impl FnMut(NatsState) -> Result<(NatsState, T)>,
    ) -> Result<T> {
        for _ in 0..MAX_CAS_RETRIES {
            let (state, revision) = self.read_state().await?;
            let (next_state, out) = body(state)?;
            let bytes = serde_json::to_vec(&next_state)?;
            let put_result = match revision {
                Some(rev) => self.kv.update(&self.state_key, bytes.into(), rev).await,
                None => self.kv.create(&self.state_key, bytes.into()).await,
            };
            match put_result {
                Ok(_) => return Ok(out),
                Err(_) => continue,
            }
        }
        Err(EngineError::transient("exhausted CAS retries against conversation state"))
    }
}

#[async_trait]
impl TranscriptStore for NatsStore {
    async fn append(
        &self,
        sender: &str,
        content: &str,
        metadata: MessageMetadata,
        expect_last_sender: ExpectedSender<'_>,
    ) -> Result<Message> {
        let normalized =
            normalize_sender(sender).ok_or_else(|| EngineError::invalid_input("empty sender"))?;
        if content.is_empty() {
            return Err(EngineError::invalid_input("empty content"));
        }
        if content.len() > self.max_message_length {
            return Err(EngineError::invalid_input("content exceeds MAX_MESSAGE_LENGTH"));
        }

        let normalized_for_cas = normalized.clone();
        let content_owned = content.to_owned();
        let metadata_for_state = metadata.clone();

        let message = self
            .cas_update(move |mut state| {
                let guard_satisfied = match expect_last_sender {
                    ExpectedSender::Any => true,
                    ExpectedSender::Empty => state.last_sender.is_none(),
                    ExpectedSender::Sender(expected) => {
                        state.last_sender.as_deref() == Some(expected)
                    }
                };
                if !guard_satisfied {
                    return Err(EngineError::turn_violation(
                        "observed last_sender does not match the expected prior sender",
                    ));
                }
                let id = state.total_turns + 1;
                let message = Message {
                    id,
                    sender: normalized_for_cas.clone(),
                    content: content_owned.clone(),
                    timestamp: Utc::now(),
                    metadata: metadata_for_state.clone(),
                };
                state.total_turns = id;
                *state.per_sender_turns.entry(normalized_for_cas.clone()).or_insert(0) += 1;
                state.total_tokens += metadata_for_state.tokens.unwrap_or(0);
                state.last_sender = Some(normalized_for_cas.clone());
                Ok((state, message))
            })
            .await?;

        let payload = serde_json::to_vec(&message)?;
        self.jetstream
            .publish(self.subject.clone(), payload.into())
            .await
            .map_err(|e| EngineError::transient(format!("publish: {e}")))?
            .await
            .map_err(|e| EngineError::transient(format!("publish ack: {e}")))?;

        Ok(message)
    }

    async fn context(&self, limit: usize) -> Result<Vec<Message>> {
        let (state, _) = self.read_state().await?;
        let limit = limit.max(1) as u64;
        let total = state.total_turns;
        let start_seq = total.saturating_sub(limit).saturating_add(1).max(1);

        let stream = self
            .jetstream
            .get_stream(&self.stream_name)
            .await
            .map_err(|e| EngineError::store_unavailable(format!("get_stream: {e}")))?;

        let mut messages = Vec::new();
        for seq in start_seq..=total {
            match stream.get_raw_message(seq).await {
                Ok(raw) => match serde_json::from_slice::<Message>(&raw.payload) {
                    Ok(msg) => messages.push(msg),
                    Err(e) => tracing::warn!(seq, error = %e, "skipping corrupt transcript record"),
                },
                Err(e) => tracing::warn!(seq, error = %e, "transcript sequence unavailable"),
            }
        }
        Ok(messages)
    }

    async fn last_sender(&self) -> Result<Option<String>> {
        Ok(self.read_state().await?.0.last_sender)
    }

    async fn mark_terminated(&self, reason: &str) -> Result<()> {
        let reason = reason.to_owned();
        self.cas_update(move |mut state| {
            if !state.terminated {
                state.terminated = true;
                state.termination_reason = Some(reason.clone());
                state.termination_timestamp = Some(Utc::now());
            }
            Ok((state, ()))
        })
        .await
    }

    async fn terminated(&self) -> Result<bool> {
        Ok(self.read_state().await?.0.terminated)
    }

    async fn termination_reason(&self) -> Result<Option<String>> {
        Ok(self.read_state().await?.0.termination_reason)
    }

    async fn health(&self) -> Result<HealthReport> {
        let backend_reachable = self.jetstream.get_stream(&self.stream_name).await.is_ok();
        let kv_reachable =
            tokio::time::timeout(Duration::from_secs(2), self.kv.entry(&self.state_key))
                .await
                .map(|r| r.is_ok())
                .unwrap_or(false);
        Ok(HealthReport {
            healthy: backend_reachable && kv_reachable,
            backend: "nats".to_owned(),
            lock_acquirable: kv_reachable,
            detail: None,
        })
    }

    async fn metadata(&self) -> Result<ConversationMetadata> {
        Ok(self.read_state().await?.0.into_public())
    }
}

#[cfg(test)]
#[path = "nats_store_tests.rs"]
mod tests;
