// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine-internal configuration: the immutable, validated tuning knobs
//! that govern retry, repetition, and sanitization behavior. Threaded
//! through the runner at construction time rather than read ad hoc from
//! the environment by individual modules.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{EngineError, Result};

/// Validated engine configuration, built once at startup from the
/// environment (or defaults) and never mutated afterward.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub default_max_turns: u32,
    pub default_timeout_minutes: u32,
    pub temperature: f64,
    pub max_tokens: u32,
    pub max_context_msgs: usize,
    pub similarity_threshold: f64,
    pub max_consecutive_similar: u32,
    pub max_message_length: usize,
    pub initial_backoff: Duration,
    pub backoff_multiplier: f64,
    pub max_backoff: Duration,
    pub data_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_max_turns: 50,
            default_timeout_minutes: 30,
            temperature: 0.7,
            max_tokens: 1024,
            max_context_msgs: 10,
            similarity_threshold: 0.85,
            max_consecutive_similar: 2,
            max_message_length: 100_000,
            initial_backoff: Duration::from_secs_f64(2.0),
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_secs_f64(120.0),
            data_dir: PathBuf::from("./data"),
        }
    }
}

impl EngineConfig {
    /// Build from environment variables, falling back to defaults for any
    /// key that is unset. Does not validate; call [`Self::validate`] after.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            default_max_turns: parse_env("DEFAULT_MAX_TURNS", defaults.default_max_turns)?,
            default_timeout_minutes: parse_env(
                "DEFAULT_TIMEOUT_MINUTES",
                defaults.default_timeout_minutes,
            )?,
            temperature: parse_env("TEMPERATURE", defaults.temperature)?,
            max_tokens: parse_env("MAX_TOKENS", defaults.max_tokens)?,
            max_context_msgs: parse_env("MAX_CONTEXT_MSGS", defaults.max_context_msgs)?,
            similarity_threshold: parse_env("SIMILARITY_THRESHOLD", defaults.similarity_threshold)?,
            max_consecutive_similar: parse_env(
                "MAX_CONSECUTIVE_SIMILAR",
                defaults.max_consecutive_similar,
            )?,
            max_message_length: parse_env("MAX_MESSAGE_LENGTH", defaults.max_message_length)?,
            initial_backoff: Duration::from_secs_f64(parse_env(
                "INITIAL_BACKOFF",
                defaults.initial_backoff.as_secs_f64(),
            )?),
            backoff_multiplier: parse_env("BACKOFF_MULTIPLIER", defaults.backoff_multiplier)?,
            max_backoff: Duration::from_secs_f64(parse_env(
                "MAX_BACKOFF",
                defaults.max_backoff.as_secs_f64(),
            )?),
            data_dir: env::var("DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
        })
    }

    /// Check every bound from §6.3. Returns `PermanentConfig` on the first
    /// violation found.
    pub fn validate(&self) -> Result<()> {
        if self.default_max_turns < 1 {
            return Err(EngineError::new(
                crate::error::ErrorKind::PermanentConfig,
                "DEFAULT_MAX_TURNS must be >= 1",
            ));
        }
        if self.default_timeout_minutes < 1 {
            return Err(EngineError::new(
                crate::error::ErrorKind::PermanentConfig,
                "DEFAULT_TIMEOUT_MINUTES must be >= 1",
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(EngineError::new(
                crate::error::ErrorKind::PermanentConfig,
                "TEMPERATURE must be in [0, 2]",
            ));
        }
        if self.max_tokens < 1 {
            return Err(EngineError::new(
                crate::error::ErrorKind::PermanentConfig,
                "MAX_TOKENS must be >= 1",
            ));
        }
        if self.max_context_msgs < 1 {
            return Err(EngineError::new(
                crate::error::ErrorKind::PermanentConfig,
                "MAX_CONTEXT_MSGS must be >= 1",
            ));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(EngineError::new(
                crate::error::ErrorKind::PermanentConfig,
                "SIMILARITY_THRESHOLD must be in [0, 1]",
            ));
        }
        if self.max_consecutive_similar < 1 {
            return Err(EngineError::new(
                crate::error::ErrorKind::PermanentConfig,
                "MAX_CONSECUTIVE_SIMILAR must be >= 1",
            ));
        }
        if self.max_message_length < 1 {
            return Err(EngineError::new(
                crate::error::ErrorKind::PermanentConfig,
                "MAX_MESSAGE_LENGTH must be >= 1",
            ));
        }
        if self.initial_backoff.as_secs_f64() <= 0.0 {
            return Err(EngineError::new(
                crate::error::ErrorKind::PermanentConfig,
                "INITIAL_BACKOFF must be > 0",
            ));
        }
        if self.backoff_multiplier < 1.0 {
            return Err(EngineError::new(
                crate::error::ErrorKind::PermanentConfig,
                "BACKOFF_MULTIPLIER must be >= 1",
            ));
        }
        if self.max_backoff.as_secs_f64() <= 0.0 {
            return Err(EngineError::new(
                crate::error::ErrorKind::PermanentConfig,
                "MAX_BACKOFF must be > 0",
            ));
        }
        Ok(())
    }

    /// Credential lookup for a registered provider name, per §6.3's
    /// `<PROVIDER>_API_KEY` convention.
    pub fn api_key_for(provider: &str) -> Option<String> {
        env::var(format!("{}_API_KEY", provider.to_uppercase())).ok()
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.parse::<T>().map_err(|e| {
            EngineError::new(
                crate::error::ErrorKind::PermanentConfig,
                format!("{key}: invalid value {raw:?}: {e}"),
            )
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
