// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The transcript store contract (§4.1): a durable ordered log plus a
//! metadata bag, with atomic append, atomic termination, and consistent
//! context reads under concurrent access from at least two agents.
//!
//! Two conforming backends ship with the engine: [`file_store`] (single
//! host, OS advisory locking) and [`nats_store`] (multi-process, NATS
//! JetStream). The runner selects one at startup; there is no shared
//! ownership between them.

pub mod file_store;
pub mod nats_store;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::Message;

/// What an appender expects the transcript's current `last_sender` to be,
/// checked atomically as part of the append per §5's CAS-guarded turn
/// enforcement. `Option<&str>` cannot distinguish "no opinion" from
/// "expect empty", so the guard is its own three-way type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedSender<'a> {
    /// No turn guard: append unconditionally.
    Any,
    /// Reject unless the transcript is currently empty.
    Empty,
    /// Reject unless the highest-ID message's sender is exactly this name.
    Sender(&'a str),
}

/// Health of a store backend, per §4.1's `health()` operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub backend: String,
    pub lock_acquirable: bool,
    pub detail: Option<String>,
}

/// Conversation-level metadata bag (§3), read back alongside the message
/// log for CLI summaries and health diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMetadata {
    pub total_turns: u64,
    pub per_sender_turns: std::collections::BTreeMap<String, u64>,
    pub total_tokens: u64,
    pub terminated: bool,
    pub termination_reason: Option<String>,
    pub termination_timestamp: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ConversationMetadata {
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            total_turns: 0,
            per_sender_turns: std::collections::BTreeMap::new(),
            total_tokens: 0,
            terminated: false,
            termination_reason: None,
            termination_timestamp: None,
            created_at,
        }
    }
}

/// A durable, ordered conversation log shared by every agent in a run.
///
/// Implementations must uphold invariants 1-7 of §3: strictly increasing
/// message IDs, `last_sender` reflecting the highest-ID append, and
/// `mark_terminated` being first-reason-wins.
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    /// Append a new message. `expect_last_sender` is checked atomically
    /// against the transcript's current `last_sender` before the append is
    /// allowed; a mismatch is rejected with `TurnViolation` and nothing is
    /// written. Pass [`ExpectedSender::Any`] to append unconditionally.
    async fn append(
        &self,
        sender: &str,
        content: &str,
        metadata: crate::message::MessageMetadata,
        expect_last_sender: ExpectedSender<'_>,
    ) -> Result<Message>;

    /// Up to `limit` most-recent messages, oldest-first.
    async fn context(&self, limit: usize) -> Result<Vec<Message>>;

    /// Sender of the highest-ID message, or `None` if the log is empty.
    async fn last_sender(&self) -> Result<Option<String>>;

    /// First-reason-wins idempotent termination.
    async fn mark_terminated(&self, reason: &str) -> Result<()>;

    async fn terminated(&self) -> Result<bool>;

    async fn termination_reason(&self) -> Result<Option<String>>;

    async fn health(&self) -> Result<HealthReport>;

    async fn metadata(&self) -> Result<ConversationMetadata>;
}
