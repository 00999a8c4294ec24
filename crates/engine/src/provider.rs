// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The opaque provider adapter contract (§6.1). Concrete adapters —
//! vendor SDK clients, a generic HTTP adapter, a deterministic mock for
//! tests — live outside the engine crate; the engine only depends on
//! this trait.

use async_trait::async_trait;

use crate::error::{EngineError, ErrorKind};

/// One message in the ordered context handed to a provider call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderMessage {
    pub role: ProviderRole,
    pub content: String,
}

/// Role mapping per §6.1: self ↔ assistant, peer ↔ user, seed ↔ system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderRole {
    System,
    User,
    Assistant,
}

/// Token accounting as reported by the adapter. §9's open question:
/// providers differ on whether they report input/output separately or
/// only a total; the engine stores whatever is given without normalizing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens.unwrap_or(0) + self.output_tokens.unwrap_or(0)
    }
}

/// A successful provider call result.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub text: String,
    pub usage: TokenUsage,
}

/// A failed provider call. `retriable` overrides the engine's default
/// classification for `kind` when set.
#[derive(Debug, Clone)]
pub struct ProviderError {
    pub kind: ErrorKind,
    pub detail: String,
    pub retriable: Option<bool>,
}

impl ProviderError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self { kind, detail: detail.into(), retriable: None }
    }

    /// Whether the agent loop should retry this failure: the adapter's
    /// explicit override if set, else the kind's default classification.
    pub fn is_retriable(&self) -> bool {
        self.retriable.unwrap_or_else(|| self.kind.retriable())
    }
}

impl From<ProviderError> for EngineError {
    fn from(e: ProviderError) -> Self {
        EngineError::new(e.kind, e.detail)
    }
}

/// The opaque remote LLM client contract every registered provider must
/// implement.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Stable identifier used in `<PROVIDER>_API_KEY` lookups and in
    /// `provider_error:{kind}:{agent}` termination-reason tags.
    fn name(&self) -> &str;

    /// The model identifier this adapter calls if the CLI did not
    /// override it with `--model1`/`--model2`.
    fn default_model(&self) -> &str;

    /// Invoke the provider with the ordered context. `temperature` and
    /// `max_tokens` are forwarded from `EngineConfig`.
    async fn call(
        &self,
        model: &str,
        messages: &[ProviderMessage],
        temperature: f64,
        max_tokens: u32,
    ) -> Result<ProviderResponse, ProviderError>;
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
