// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-host transcript backend: a JSONL message log plus a JSON
//! metadata sidecar, guarded by an OS advisory lock (§4.1 "File-backed").
//! All mutation and all reads run inside the same flock critical section,
//! so writers serialize and readers observe a consistent snapshot. The
//! blocking file and lock operations run on a blocking-pool thread so an
//! agent loop's own task never stalls on disk I/O.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nix::fcntl::{Flock, FlockArg};
use serde::{Deserialize, Serialize};

use super::{ConversationMetadata, ExpectedSender, HealthReport, TranscriptStore};
use crate::error::{EngineError, Result};
use crate::message::{normalize_sender, Message, MessageMetadata};

/// Internal persisted state: [`ConversationMetadata`] plus the
/// store-private `last_sender` field the public data model omits.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedState {
    total_turns: u64,
    per_sender_turns: BTreeMap<String, u64>,
    total_tokens: u64,
    terminated: bool,
    termination_reason: Option<String>,
    termination_timestamp: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    last_sender: Option<String>,
}

impl PersistedState {
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

/// File-backed [`TranscriptStore`]. One instance owns one conversation's
/// directory: `messages.jsonl`, `metadata.json`, and `.lock`. Cheap to
/// clone: every field is a `PathBuf` naming the same on-disk files.
#[derive(Clone)]
pub struct FileStore {
    lock_path: PathBuf,
    messages_path: PathBuf,
    metadata_path: PathBuf,
    max_message_length: usize,
}

impl FileStore {
    /// Open (creating if absent) a store rooted at `dir`. `dir` must be
    /// permitted under `DATA_DIR` (§6.3); the caller is responsible for
    /// that check.
    pub fn open(dir: impl Into<PathBuf>, max_message_length: usize) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            lock_path: dir.join(".lock"),
            messages_path: dir.join("messages.jsonl"),
            metadata_path: dir.join("metadata.json"),
            max_message_length,
        })
    }

    fn locked<T>(&self, body: impl FnOnce() -> Result<T>) -> Result<T> {
        let file = OpenOptions::new().create(true).write(true).open(&self.lock_path)?;
        let locked = Flock::lock(file, FlockArg::LockExclusive)
            .map_err(|(_file, errno)| EngineError::store_unavailable(format!("flock: {errno}")))?;
        let result = body();
        drop(locked);
        result
    }

    fn read_state(&self) -> Result<PersistedState> {
        match fs::read(&self.metadata_path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PersistedState::new(Utc::now())),
            Err(e) => Err(e.into()),
        }
    }

    fn write_state(&self, state: &PersistedState) -> Result<()> {
        let tmp_path = self.metadata_path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(state)?;
        fs::write(&tmp_path, bytes)?;
        fs::rename(&tmp_path, &self.metadata_path)?;
        Ok(())
    }

    fn append_line(&self, message: &Message) -> Result<()> {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');
        let mut file = OpenOptions::new().create(true).append(true).open(&self.messages_path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    fn read_tail(&self, limit: usize) -> Result<Vec<Message>> {
        let file = match File::open(&self.messages_path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut all = Vec::new();
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Message>(&line) {
                Ok(msg) => all.push(msg),
                Err(e) => {
                    tracing::warn!(lineno, error = %e, "skipping corrupt transcript record");
                    if let Some(placeholder) = recover_best_effort(&line) {
                        all.push(placeholder);
                    }
                }
            }
        }
        let start = all.len().saturating_sub(limit);
        Ok(all.split_off(start))
    }

    fn append_sync(
        &self,
        sender: String,
        content: String,
        metadata: MessageMetadata,
        expect_last_sender: OwnedExpectedSender,
    ) -> Result<Message> {
        let normalized =
            normalize_sender(&sender).ok_or_else(|| EngineError::invalid_input("empty sender"))?;
        if content.is_empty() {
            return Err(EngineError::invalid_input("empty content"));
        }
        if content.len() > self.max_message_length {
            return Err(EngineError::invalid_input("content exceeds MAX_MESSAGE_LENGTH"));
        }

        self.locked(|| {
            let mut state = self.read_state()?;
            let guard_satisfied = match &expect_last_sender {
                OwnedExpectedSender::Any => true,
                OwnedExpectedSender::Empty => state.last_sender.is_none(),
                OwnedExpectedSender::Sender(expected) => {
                    state.last_sender.as_deref() == Some(expected.as_str())
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
                sender: normalized.clone(),
                content: content.clone(),
                timestamp: Utc::now(),
                metadata: metadata.clone(),
            };

            self.append_line(&message)?;

            state.total_turns = id;
            *state.per_sender_turns.entry(normalized.clone()).or_insert(0) += 1;
            state.total_tokens += metadata.tokens.unwrap_or(0);
            state.last_sender = Some(normalized);
            self.write_state(&state)?;

            Ok(message)
        })
    }

    fn try_lock_probe(&self) -> bool {
        let file = match OpenOptions::new().create(true).write(true).open(&self.lock_path) {
            Ok(f) => f,
            Err(_) => return false,
        };
        match Flock::lock(file, FlockArg::LockExclusive) {
            Ok(locked) => {
                drop(locked);
                true
            }
            Err(_) => false,
        }
    }
}

/// Owned mirror of [`ExpectedSender`], needed because `append_sync` runs on
/// a `spawn_blocking` thread and its arguments must be `'static`.
enum OwnedExpectedSender {
    Any,
    Empty,
    Sender(String),
}

impl From<ExpectedSender<'_>> for OwnedExpectedSender {
    fn from(e: ExpectedSender<'_>) -> Self {
        match e {
            ExpectedSender::Any => Self::Any,
            ExpectedSender::Empty => Self::Empty,
            ExpectedSender::Sender(s) => Self::Sender(s.to_owned()),
        }
    }
}

/// Best-effort recovery for a corrupted JSONL line: salvage `id`/`sender`
/// if the line still parses as JSON, per §4.1's read-tolerance rule.
fn recover_best_effort(line: &str) -> Option<Message> {
    let value: serde_json::Value = serde_json::from_str(line).ok()?;
    let id = value.get("id")?.as_u64()?;
    let sender = value.get("sender")?.as_str()?.to_owned();
    Some(Message {
        id,
        sender,
        content: "<corrupted record>".to_owned(),
        timestamp: Utc::now(),
        metadata: MessageMetadata::default(),
    })
}

/// Run a blocking `FileStore` operation on the blocking thread pool.
async fn spawn<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| EngineError::store_unavailable(format!("blocking task panicked: {e}")))?
}

#[async_trait]
impl TranscriptStore for FileStore {
    async fn append(
        &self,
        sender: &str,
        content: &str,
        metadata: MessageMetadata,
        expect_last_sender: ExpectedSender<'_>,
    ) -> Result<Message> {
        let store = self.clone();
        let sender = sender.to_owned();
        let content = content.to_owned();
        let expect_last_sender = OwnedExpectedSender::from(expect_last_sender);
        spawn(move || store.append_sync(sender, content, metadata, expect_last_sender)).await
    }

    async fn context(&self, limit: usize) -> Result<Vec<Message>> {
        let store = self.clone();
        let limit = limit.max(1);
        spawn(move || store.locked(|| store.read_tail(limit))).await
    }

    async fn last_sender(&self) -> Result<Option<String>> {
        let store = self.clone();
        spawn(move || store.locked(|| Ok(store.read_state()?.last_sender))).await
    }

    async fn mark_terminated(&self, reason: &str) -> Result<()> {
        let store = self.clone();
        let reason = reason.to_owned();
        spawn(move || {
            store.locked(|| {
                let mut state = store.read_state()?;
                if !state.terminated {
                    state.terminated = true;
                    state.termination_reason = Some(reason.clone());
                    state.termination_timestamp = Some(Utc::now());
                    store.write_state(&state)?;
                }
                Ok(())
            })
        })
        .await
    }

    async fn terminated(&self) -> Result<bool> {
        let store = self.clone();
        spawn(move || store.locked(|| Ok(store.read_state()?.terminated))).await
    }

    async fn termination_reason(&self) -> Result<Option<String>> {
        let store = self.clone();
        spawn(move || store.locked(|| Ok(store.read_state()?.termination_reason))).await
    }

    async fn health(&self) -> Result<HealthReport> {
        let store = self.clone();
        spawn(move || {
            let lock_acquirable = store.try_lock_probe();
            Ok(HealthReport {
                healthy: lock_acquirable,
                backend: "file".to_owned(),
                lock_acquirable,
                detail: None,
            })
        })
        .await
    }

    async fn metadata(&self) -> Result<ConversationMetadata> {
        let store = self.clone();
        spawn(move || store.locked(|| Ok(store.read_state()?.into_public()))).await
    }
}

#[cfg(test)]
#[path = "file_store_tests.rs"]
mod tests;
