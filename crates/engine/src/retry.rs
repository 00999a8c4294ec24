// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Jittered exponential backoff for provider call retries (§4.4 step 6).
//! `±jitter_fraction` of the computed delay is applied to avoid a
//! thundering herd across agents sharing a provider.

use std::time::Duration;

use rand::Rng;

/// Backoff policy: `delay(n) = min(max, initial * multiplier^n)`, jittered.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub multiplier: f64,
    pub max: Duration,
    pub jitter_fraction: f64,
    pub max_retries: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs_f64(2.0),
            multiplier: 2.0,
            max: Duration::from_secs_f64(120.0),
            jitter_fraction: 0.2,
            max_retries: 3,
        }
    }
}

impl BackoffPolicy {
    /// The base delay before jitter for retry attempt `attempt` (0-based).
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let scaled = self.initial.as_secs_f64() * self.multiplier.powi(attempt as i32);
        Duration::from_secs_f64(scaled.min(self.max.as_secs_f64()))
    }

    /// Base delay with `±jitter_fraction` applied, never below zero.
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt).as_secs_f64();
        if self.jitter_fraction <= 0.0 {
            return Duration::from_secs_f64(base);
        }
        let spread = base * self.jitter_fraction;
        let offset = rand::rng().random_range(-spread..=spread);
        Duration::from_secs_f64((base + offset).max(0.0))
    }

    /// Sleep for the jittered delay of this attempt, cancellation-aware.
    pub async fn sleep(&self, attempt: u32, cancel: &tokio_util::sync::CancellationToken) -> bool {
        let delay = self.jittered_delay(attempt);
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = cancel.cancelled() => false,
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
