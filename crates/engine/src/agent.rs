// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-party cooperative task (§4.4): waits for its turn, fetches
//! context, invokes the provider adapter under retry, validates and
//! records the response, and exits on the first terminal condition it
//! observes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::breaker::{BreakerConfig, BreakerState, CircuitBreaker};
use crate::config::EngineConfig;
use crate::error::{EngineError, ErrorKind, Result};
use crate::fingerprint::fingerprint;
use crate::message::{Message, MessageMetadata};
use crate::metrics::EngineMetrics;
use crate::provider::{ProviderAdapter, ProviderMessage, ProviderRole, TokenUsage};
use crate::repetition::{default_termination_phrases, RepetitionDetector};
use crate::retry::BackoffPolicy;
use crate::sanitize::sanitize_text;
use crate::transcript::{ExpectedSender, TranscriptStore};

/// Cooperative turn-yield sleep bounds (§4.4 step 2).
const YIELD_JITTER_MS: std::ops::RangeInclusive<u64> = 200..=400;

/// Construction parameters for one [`Agent`].
pub struct AgentParams {
    pub name: String,
    pub provider: Arc<dyn ProviderAdapter>,
    pub model: String,
}

/// Terminal result of one agent's participation in a run.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub name: String,
    pub reason: String,
    pub turns_produced: u32,
}

enum CallFailure {
    /// The call cannot be retried further; exit the loop with this reason.
    Fatal(String),
    /// The adapter reported `ContextTooLarge`; the caller should halve
    /// `MAX_CONTEXT_MSGS` and retry once before giving up.
    ContextTooLarge,
    /// Retries within this invocation are exhausted on a retriable error;
    /// the caller should restart the outer loop so the next terminal
    /// check re-evaluates the breaker rather than ending the run here.
    Exhausted,
}

enum AppendOutcome {
    Appended,
    Terminal(String),
    /// Lost the CAS race to a peer that appended first; the generated
    /// text is stale and discarded without counting as a turn.
    Raced,
}

enum YieldOutcome {
    NotMyTurn,
    Yielded,
    Cancelled,
}

/// One party's cooperative task driving its provider across a conversation.
pub struct Agent {
    name: String,
    provider: Arc<dyn ProviderAdapter>,
    model: String,
    store: Arc<dyn TranscriptStore>,
    config: EngineConfig,
    metrics: EngineMetrics,
    cancel: CancellationToken,
    breaker: CircuitBreaker,
    repetition: RepetitionDetector,
    max_turns: u32,
    deadline: Instant,
    turns_produced: u32,
}

impl Agent {
    /// Build an agent. `name` is normalized per §3; an empty name after
    /// normalization is a caller bug and rejected with `InvalidInput`.
    pub fn new(
        params: AgentParams,
        store: Arc<dyn TranscriptStore>,
        config: EngineConfig,
        metrics: EngineMetrics,
        cancel: CancellationToken,
        max_turns: u32,
        timeout: Duration,
    ) -> Result<Self> {
        let name = crate::message::normalize_sender(&params.name)
            .ok_or_else(|| EngineError::invalid_input("empty agent name"))?;
        let repetition = RepetitionDetector::new(
            config.similarity_threshold,
            config.max_consecutive_similar,
            default_termination_phrases(),
        );
        Ok(Self {
            name,
            provider: params.provider,
            model: params.model,
            store,
            breaker: CircuitBreaker::new(BreakerConfig::default()),
            repetition,
            config,
            metrics,
            cancel,
            max_turns,
            deadline: Instant::now() + timeout,
            turns_produced: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Drive the loop to a terminal condition. Never returns an error:
    /// any unexpected failure is itself mapped to a terminal reason so the
    /// runner always gets a clean outcome to aggregate.
    pub async fn run(mut self) -> AgentOutcome {
        loop {
            match self.iterate().await {
                Ok(Some(reason)) => return self.finish(reason),
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(agent = %self.name, error = %e, "agent loop ended on an unexpected store error");
                    let reason = if e.kind() == ErrorKind::StoreUnavailable {
                        "store_unavailable".to_owned()
                    } else {
                        "internal_invariant".to_owned()
                    };
                    let _ = self.store.mark_terminated(&reason).await;
                    return self.finish(reason);
                }
            }
        }
    }

    fn finish(self, reason: String) -> AgentOutcome {
        AgentOutcome { name: self.name, reason, turns_produced: self.turns_produced }
    }

    /// One loop iteration. `Ok(Some(reason))` means exit now; `Ok(None)`
    /// means restart the loop; `Err` is an unexpected store failure.
    async fn iterate(&mut self) -> Result<Option<String>> {
        if let Some(reason) = self.terminal_check().await? {
            return Ok(Some(reason));
        }

        match self.maybe_yield().await? {
            YieldOutcome::Yielded => return Ok(None),
            YieldOutcome::Cancelled => {
                let _ = self.store.mark_terminated("cancelled").await;
                return Ok(Some("cancelled".to_owned()));
            }
            YieldOutcome::NotMyTurn => {}
        }

        let mut context_limit = self.config.max_context_msgs;
        let mut truncated_once = false;
        let mut last_context = Vec::new();
        let call_result = loop {
            let context = self.store.context(context_limit).await?;
            let messages = self.to_provider_messages(&context);
            last_context = context;

            match self.call_with_retry(&messages).await {
                Ok(outcome) => break Some(outcome),
                Err(CallFailure::Fatal(reason)) => return Ok(Some(reason)),
                Err(CallFailure::Exhausted) => break None,
                Err(CallFailure::ContextTooLarge) => {
                    if truncated_once {
                        let reason = format!("invalid_response:{}", self.name);
                        let _ = self.store.mark_terminated(&reason).await;
                        return Ok(Some(reason));
                    }
                    truncated_once = true;
                    context_limit = (context_limit / 2).max(1);
                }
            }
        };
        let Some((sanitized, usage, elapsed)) = call_result else {
            return Ok(None);
        };
        let peer_responses = self.peer_responses(&last_context);

        if let Some(phrase) = self.repetition.matches_termination_phrase(&sanitized) {
            tracing::info!(agent = %self.name, phrase, "termination phrase matched");
            match self.append_message(&sanitized, &usage, elapsed).await? {
                AppendOutcome::Terminal(reason) => return Ok(Some(reason)),
                AppendOutcome::Raced => return Ok(None),
                AppendOutcome::Appended => {}
            }
            let reason = format!("explicit_termination:{}", self.name);
            self.store.mark_terminated(&reason).await?;
            return Ok(Some(reason));
        }

        if self.repetition.observe(&sanitized, &peer_responses) {
            self.metrics.record_repetition_trigger();
            match self.append_message(&sanitized, &usage, elapsed).await? {
                AppendOutcome::Terminal(reason) => return Ok(Some(reason)),
                AppendOutcome::Raced => return Ok(None),
                AppendOutcome::Appended => {}
            }
            let reason = format!("repetition_loop:{}", self.name);
            self.store.mark_terminated(&reason).await?;
            return Ok(Some(reason));
        }

        match self.append_message(&sanitized, &usage, elapsed).await? {
            AppendOutcome::Appended => Ok(None),
            AppendOutcome::Terminal(reason) => Ok(Some(reason)),
            AppendOutcome::Raced => Ok(None),
        }
    }

    /// Recent peer-sent (non-self, non-seed) message bodies from a context
    /// fetch, oldest-first — the peer half of §4.3's `max_sim` window.
    fn peer_responses(&self, context: &[Message]) -> Vec<String> {
        context
            .iter()
            .filter(|m| m.sender != self.name && m.metadata.seed != Some(true))
            .map(|m| m.content.clone())
            .collect()
    }

    async fn terminal_check(&mut self) -> Result<Option<String>> {
        if self.store.terminated().await? {
            return Ok(Some("peer_terminated".to_owned()));
        }
        if Instant::now() >= self.deadline {
            self.store.mark_terminated("timeout").await?;
            return Ok(Some("timeout".to_owned()));
        }
        if self.turns_produced >= self.max_turns {
            self.store.mark_terminated("max_turns_reached").await?;
            return Ok(Some("max_turns_reached".to_owned()));
        }
        // `allow_call` returns false only while truly OPEN; it flips the
        // gate to HALF_OPEN (and returns true) as a side effect of an
        // elapsed cooldown, matching §4.2's `is_open()` contract.
        if !self.breaker.allow_call() {
            let reason = format!("circuit_open:{}", self.name);
            self.store.mark_terminated(&reason).await?;
            return Ok(Some(reason));
        }
        Ok(None)
    }

    async fn maybe_yield(&mut self) -> Result<YieldOutcome> {
        match self.store.last_sender().await? {
            Some(last) if last == self.name => {
                let jitter_ms = rand::rng().random_range(YIELD_JITTER_MS);
                if self.sleep_cancelable(Duration::from_millis(jitter_ms)).await {
                    Ok(YieldOutcome::Yielded)
                } else {
                    Ok(YieldOutcome::Cancelled)
                }
            }
            _ => Ok(YieldOutcome::NotMyTurn),
        }
    }

    async fn sleep_cancelable(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.cancel.cancelled() => false,
        }
    }

    /// Map ordered transcript messages to the role mapping of §6.1: self
    /// ↔ assistant, peer ↔ user, seed ↔ system.
    fn to_provider_messages(&self, context: &[Message]) -> Vec<ProviderMessage> {
        context
            .iter()
            .map(|m| {
                let role = if m.metadata.seed == Some(true) {
                    ProviderRole::System
                } else if m.sender == self.name {
                    ProviderRole::Assistant
                } else {
                    ProviderRole::User
                };
                ProviderMessage { role, content: m.content.clone() }
            })
            .collect()
    }

    fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            initial: self.config.initial_backoff,
            multiplier: self.config.backoff_multiplier,
            max: self.config.max_backoff,
            jitter_fraction: 0.2,
            max_retries: 3,
        }
    }

    /// Invoke the provider under the retry policy of §4.4 step 4, then
    /// validate the result per step 5. Returns the sanitized text, the
    /// reported usage, and the latency of the attempt that succeeded.
    async fn call_with_retry(
        &mut self,
        messages: &[ProviderMessage],
    ) -> std::result::Result<(String, TokenUsage, Duration), CallFailure> {
        let backoff = self.backoff_policy();
        let provider_name = self.provider.name().to_owned();

        for attempt in 0..=backoff.max_retries {
            let started = Instant::now();
            let span = tracing::info_span!(
                "provider_call",
                agent = %self.name,
                provider = %provider_name,
                attempt,
            );
            let result = self
                .provider
                .call(&self.model, messages, self.config.temperature, self.config.max_tokens)
                .instrument(span)
                .await;
            self.metrics.record_provider_call();

            match result {
                Ok(response) => {
                    let sanitized = sanitize_text(&response.text);
                    let elapsed = started.elapsed();
                    if sanitized.is_empty() || sanitized.len() > self.config.max_message_length {
                        self.metrics.record_provider_failure();
                        self.breaker.record_failure();
                        if attempt == backoff.max_retries {
                            return Err(CallFailure::Fatal(format!(
                                "invalid_response:{}",
                                self.name
                            )));
                        }
                        self.metrics.record_provider_retry();
                        if !backoff.sleep(attempt, &self.cancel).await {
                            return Err(CallFailure::Fatal("cancelled".to_owned()));
                        }
                        continue;
                    }
                    self.breaker.record_success();
                    return Ok((sanitized, response.usage, elapsed));
                }
                Err(provider_err) => {
                    self.metrics.record_provider_failure();
                    if provider_err.kind == ErrorKind::ContextTooLarge {
                        return Err(CallFailure::ContextTooLarge);
                    }
                    // Per-call timeouts are treated as transient regardless
                    // of the adapter's override, per §7: terminal only at
                    // the agent-deadline layer, not the per-call layer.
                    let retriable =
                        provider_err.kind == ErrorKind::Timeout || provider_err.is_retriable();
                    self.breaker.record_failure();
                    if self.breaker.state() == BreakerState::Open {
                        self.metrics.record_breaker_trip();
                    }
                    if !retriable {
                        tracing::warn!(
                            agent = %self.name,
                            kind = %provider_err.kind,
                            detail = %provider_err.detail,
                            "provider call failed fatally"
                        );
                        return Err(CallFailure::Fatal(format!(
                            "provider_error:{}:{}",
                            provider_err.kind, self.name
                        )));
                    }
                    if attempt == backoff.max_retries {
                        return Err(CallFailure::Exhausted);
                    }
                    self.metrics.record_provider_retry();
                    if !backoff.sleep(attempt, &self.cancel).await {
                        return Err(CallFailure::Fatal("cancelled".to_owned()));
                    }
                }
            }
        }
        // Every branch above returns by the final attempt; this satisfies
        // the type checker for the theoretical case none of them did.
        Err(CallFailure::Exhausted)
    }

    /// Append the produced message (§4.4 step 8), retrying `Transient`
    /// store failures under the same backoff policy as provider calls.
    async fn append_message(
        &mut self,
        text: &str,
        usage: &TokenUsage,
        elapsed: Duration,
    ) -> Result<AppendOutcome> {
        let turn_number = self.turns_produced + 1;
        let metadata = MessageMetadata {
            tokens: Some(usage.total()),
            model: Some(self.model.clone()),
            turn: Some(turn_number),
            response_time_ms: Some(elapsed.as_millis() as u64),
            fingerprint: Some(fingerprint(&self.name, text)),
            seed: None,
            extra: std::collections::BTreeMap::new(),
        };
        self.metrics.record_turn(usage.input_tokens.unwrap_or(0), usage.output_tokens.unwrap_or(0));

        let backoff = self.backoff_policy();
        for attempt in 0..=backoff.max_retries {
            let expected = self.store.last_sender().await?;
            let guard = match expected.as_deref() {
                Some(sender) => ExpectedSender::Sender(sender),
                None => ExpectedSender::Empty,
            };
            match self.store.append(&self.name, text, metadata.clone(), guard).await {
                Ok(_) => {
                    self.turns_produced = turn_number;
                    return Ok(AppendOutcome::Appended);
                }
                Err(e) if e.kind() == ErrorKind::TurnViolation => {
                    tracing::debug!(agent = %self.name, "lost the turn race to a peer append, discarding this turn");
                    return Ok(AppendOutcome::Raced);
                }
                Err(e) if e.kind() == ErrorKind::InvalidInput => {
                    tracing::error!(agent = %self.name, error = %e, "append rejected: internal invariant violated");
                    return Ok(AppendOutcome::Terminal("internal_invariant".to_owned()));
                }
                Err(e) if e.kind() == ErrorKind::Transient || e.kind() == ErrorKind::StoreUnavailable => {
                    if attempt == backoff.max_retries {
                        let _ = self.store.mark_terminated("store_unavailable").await;
                        return Ok(AppendOutcome::Terminal("store_unavailable".to_owned()));
                    }
                    if !backoff.sleep(attempt, &self.cancel).await {
                        return Ok(AppendOutcome::Terminal("cancelled".to_owned()));
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Ok(AppendOutcome::Terminal("store_unavailable".to_owned()))
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
