// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process engine metrics. An external exporter (serving these over
//! `METRICS_PORT`, §6.3) is outside the core's scope; this module only
//! owns the atomic counters a snapshot is built from.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared, cheaply cloneable metrics handle for one conversation run.
#[derive(Clone)]
pub struct EngineMetrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    provider_calls: AtomicU64,
    provider_failures: AtomicU64,
    provider_retries: AtomicU64,
    turns_appended: AtomicU64,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
    repetition_triggers: AtomicU64,
    breaker_trips: AtomicU64,
    active_conversations: AtomicU64,
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                provider_calls: AtomicU64::new(0),
                provider_failures: AtomicU64::new(0),
                provider_retries: AtomicU64::new(0),
                turns_appended: AtomicU64::new(0),
                input_tokens: AtomicU64::new(0),
                output_tokens: AtomicU64::new(0),
                repetition_triggers: AtomicU64::new(0),
                breaker_trips: AtomicU64::new(0),
                active_conversations: AtomicU64::new(0),
            }),
        }
    }

    pub fn record_provider_call(&self) {
        self.inner.provider_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_provider_failure(&self) {
        self.inner.provider_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_provider_retry(&self) {
        self.inner.provider_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_turn(&self, input_tokens: u64, output_tokens: u64) {
        self.inner.turns_appended.fetch_add(1, Ordering::Relaxed);
        self.inner.input_tokens.fetch_add(input_tokens, Ordering::Relaxed);
        self.inner.output_tokens.fetch_add(output_tokens, Ordering::Relaxed);
    }

    pub fn record_repetition_trigger(&self) {
        self.inner.repetition_triggers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_breaker_trip(&self) {
        self.inner.breaker_trips.fetch_add(1, Ordering::Relaxed);
    }

    pub fn conversation_started(&self) {
        self.inner.active_conversations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn conversation_finished(&self) {
        self.inner.active_conversations.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            provider_calls: self.inner.provider_calls.load(Ordering::Relaxed),
            provider_failures: self.inner.provider_failures.load(Ordering::Relaxed),
            provider_retries: self.inner.provider_retries.load(Ordering::Relaxed),
            turns_appended: self.inner.turns_appended.load(Ordering::Relaxed),
            input_tokens: self.inner.input_tokens.load(Ordering::Relaxed),
            output_tokens: self.inner.output_tokens.load(Ordering::Relaxed),
            repetition_triggers: self.inner.repetition_triggers.load(Ordering::Relaxed),
            breaker_trips: self.inner.breaker_trips.load(Ordering::Relaxed),
            active_conversations: self.inner.active_conversations.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot, serializable for the CLI's summary output or an
/// external exporter.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSnapshot {
    pub provider_calls: u64,
    pub provider_failures: u64,
    pub provider_retries: u64,
    pub turns_appended: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub repetition_triggers: u64,
    pub breaker_trips: u64,
    pub active_conversations: u64,
}

impl MetricsSnapshot {
    pub fn failure_rate(&self) -> f64 {
        if self.provider_calls == 0 {
            0.0
        } else {
            self.provider_failures as f64 / self.provider_calls as f64
        }
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
