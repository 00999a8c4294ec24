// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A deterministic adapter with no network dependency, for offline
//! smoke-testing the engine end to end.

use async_trait::async_trait;
use parley_engine::{ErrorKind, ProviderAdapter, ProviderError, ProviderMessage, ProviderResponse, TokenUsage};

/// Replies with a canned sentence referencing the last peer message,
/// so a two-mock conversation produces a visibly alternating transcript
/// without ever calling a real provider.
pub struct MockAdapter {
    name: String,
    default_model: String,
}

impl MockAdapter {
    pub fn new(name: impl Into<String>, default_model: impl Into<String>) -> Self {
        Self { name: name.into(), default_model: default_model.into() }
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn call(
        &self,
        _model: &str,
        messages: &[ProviderMessage],
        _temperature: f64,
        _max_tokens: u32,
    ) -> Result<ProviderResponse, ProviderError> {
        let prior = messages.last().map(|m| m.content.as_str()).unwrap_or("");
        if prior.is_empty() {
            return Err(ProviderError::new(ErrorKind::InvalidInput, "no context to respond to"));
        }
        let text = format!("({}) noted: {}", self.name, truncate(prior, 120));
        let usage = TokenUsage {
            input_tokens: Some(prior.len() as u64 / 4),
            output_tokens: Some(text.len() as u64 / 4),
        };
        Ok(ProviderResponse { text, usage })
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_owned();
    }
    s.chars().take(max_chars).collect::<String>() + "..."
}

#[cfg(test)]
#[path = "mock_tests.rs"]
mod tests;
