// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared across the transcript store, circuit breaker,
//! and agent loop. Kinds, not type names — callers branch on
//! [`EngineError::kind`], not on the enum variant directly.

use std::fmt;

/// Closed set of failure kinds the engine can surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller violated a precondition (empty content, oversize, bad name).
    InvalidInput,
    /// Retryable failure from a dependency (provider 5xx, network blip, store busy).
    Transient,
    /// Retryable with mandatory backoff; breaker-counted like `Transient`.
    RateLimited,
    /// Fatal: bad credentials or unrecoverable provider auth failure.
    Auth,
    /// Fatal: configuration cannot be made to work without operator changes.
    PermanentConfig,
    /// Fatal-for-call; the agent loop may attempt one context truncation and retry once.
    ContextTooLarge,
    /// Transient at the per-call layer; terminal at the agent-deadline layer.
    Timeout,
    /// Fatal for the run after bounded retries.
    StoreUnavailable,
    /// Normal termination initiated externally.
    Cancelled,
    /// A CAS-guarded append's expected prior sender did not match the
    /// transcript's observed `last_sender`.
    TurnViolation,
}

impl ErrorKind {
    /// Whether the agent loop should retry an operation that failed with
    /// this kind, absent an adapter-supplied override.
    pub fn retriable(&self) -> bool {
        matches!(self, Self::Transient | Self::RateLimited)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::Transient => "transient",
            Self::RateLimited => "rate_limited",
            Self::Auth => "auth",
            Self::PermanentConfig => "permanent_config",
            Self::ContextTooLarge => "context_too_large",
            Self::Timeout => "timeout",
            Self::StoreUnavailable => "store_unavailable",
            Self::Cancelled => "cancelled",
            Self::TurnViolation => "turn_violation",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An engine-level error: a [`ErrorKind`] plus a human-readable detail.
#[derive(Debug, Clone)]
pub struct EngineError {
    kind: ErrorKind,
    detail: String,
}

impl EngineError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self { kind, detail: detail.into() }
    }

    pub fn invalid_input(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, detail)
    }

    pub fn transient(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, detail)
    }

    pub fn store_unavailable(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::StoreUnavailable, detail)
    }

    pub fn turn_violation(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::TurnViolation, detail)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    pub fn retriable(&self) -> bool {
        self.kind.retriable()
    }

    /// The termination-reason tag this error would produce if it ends a
    /// conversation (e.g. `"store_unavailable"`); callers append an
    /// agent-qualifying suffix where the reason calls for one.
    pub fn reason_tag(&self) -> &'static str {
        self.kind.as_str()
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}

impl std::error::Error for EngineError {}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => {
                Self::new(ErrorKind::Transient, e.to_string())
            }
            _ => Self::new(ErrorKind::StoreUnavailable, e.to_string()),
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(ErrorKind::InvalidInput, e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
