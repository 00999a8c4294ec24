// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bootstraps a run (§4.5): validates configuration, seeds the
//! deterministic opener, launches one agent loop per party, and
//! finalizes metrics once every agent has reached a terminal condition.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::agent::{Agent, AgentOutcome, AgentParams};
use crate::config::EngineConfig;
use crate::error::{EngineError, ErrorKind, Result};
use crate::message::{normalize_sender, MessageMetadata};
use crate::metrics::EngineMetrics;
use crate::provider::ProviderAdapter;
use crate::transcript::{ExpectedSender, TranscriptStore};

/// One party to seat at the table, plus whether its provider requires a
/// credential to be present (the mock adapter does not).
pub struct AgentSpec {
    pub name: String,
    pub provider: Arc<dyn ProviderAdapter>,
    pub model: String,
    pub requires_credential: bool,
}

/// Final accounting for a completed run, printed by the CLI on exit.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: uuid::Uuid,
    pub outcomes: Vec<AgentOutcome>,
    pub total_turns: u64,
    pub per_sender_turns: BTreeMap<String, u64>,
    pub total_tokens: u64,
    pub termination_reason: Option<String>,
    pub duration: Duration,
}

/// Bootstraps and drives one conversation to completion.
pub struct Runner {
    store: Arc<dyn TranscriptStore>,
    config: EngineConfig,
    metrics: EngineMetrics,
    cancel: CancellationToken,
    topic: String,
    agents: Vec<AgentSpec>,
    max_turns: u32,
    timeout: Duration,
}

impl Runner {
    /// Build a runner. Requires at least two agents with distinct
    /// normalized names, matching §4.5's "at least two distinct
    /// providers" initialization check.
    pub fn new(
        store: Arc<dyn TranscriptStore>,
        config: EngineConfig,
        metrics: EngineMetrics,
        cancel: CancellationToken,
        topic: String,
        agents: Vec<AgentSpec>,
        max_turns: u32,
        timeout: Duration,
    ) -> Result<Self> {
        config.validate()?;
        if topic.trim().is_empty() {
            return Err(EngineError::invalid_input("topic must be non-empty"));
        }
        if agents.len() < 2 {
            return Err(EngineError::new(
                ErrorKind::PermanentConfig,
                "at least two agents are required",
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for spec in &agents {
            let normalized = normalize_sender(&spec.name)
                .ok_or_else(|| EngineError::invalid_input("empty agent name"))?;
            if !seen.insert(normalized.clone()) {
                return Err(EngineError::new(
                    ErrorKind::PermanentConfig,
                    format!("duplicate agent name {normalized:?}"),
                ));
            }
            if spec.requires_credential
                && EngineConfig::api_key_for(spec.provider.name()).is_none()
            {
                return Err(EngineError::new(
                    ErrorKind::Auth,
                    format!("missing credentials for provider {}", spec.provider.name()),
                ));
            }
        }
        Ok(Self { store, config, metrics, cancel, topic, agents, max_turns, timeout })
    }

    /// Run to completion. Aborts before launching any agent if the store
    /// is unhealthy, per §4.5's "abort the run on unhealthy" rule.
    pub async fn run(self) -> Result<RunSummary> {
        let started = Instant::now();
        let run_id = uuid::Uuid::new_v4();

        let health = self.store.health().await?;
        if !health.healthy {
            return Err(EngineError::store_unavailable(
                health.detail.unwrap_or_else(|| "transcript store failed health check".to_owned()),
            ));
        }

        self.seed_opener().await?;

        self.metrics.conversation_started();
        tracing::info!(run_id = %run_id, topic = %self.topic, agents = self.agents.len(), "conversation starting");

        let mut handles = Vec::with_capacity(self.agents.len());
        for spec in self.agents {
            let agent = Agent::new(
                AgentParams { name: spec.name, provider: spec.provider, model: spec.model },
                Arc::clone(&self.store),
                self.config.clone(),
                self.metrics.clone(),
                self.cancel.clone(),
                self.max_turns,
                self.timeout,
            )?;
            handles.push(tokio::spawn(agent.run()));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(join_err) => {
                    let reason = format!("fatal:{join_err}");
                    tracing::error!(run_id = %run_id, error = %join_err, "agent task panicked");
                    let _ = self.store.mark_terminated(&reason).await;
                    outcomes.push(AgentOutcome {
                        name: "unknown".to_owned(),
                        reason,
                        turns_produced: 0,
                    });
                }
            }
        }

        let metadata = self.store.metadata().await?;
        self.metrics.conversation_finished();
        tracing::info!(
            run_id = %run_id,
            reason = ?metadata.termination_reason,
            total_turns = metadata.total_turns,
            "conversation finished"
        );

        Ok(RunSummary {
            run_id,
            outcomes,
            total_turns: metadata.total_turns,
            per_sender_turns: metadata.per_sender_turns,
            total_tokens: metadata.total_tokens,
            termination_reason: metadata.termination_reason,
            duration: started.elapsed(),
        })
    }

    /// Seed a synthetic opener if the transcript is empty, breaking the
    /// start-turn race: `last_sender` becomes `"System"`, which matches no
    /// agent name, so every agent's turn-ownership check passes on its
    /// first iteration. The append is guarded by `ExpectedSender::Empty`
    /// rather than a separate read-then-write check, so a second seeder
    /// racing against this one loses the append outright instead of
    /// double-seeding the transcript.
    async fn seed_opener(&self) -> Result<()> {
        let content = format!("Topic: {}. Begin.", self.topic);
        let metadata = MessageMetadata { seed: Some(true), ..MessageMetadata::default() };
        match self.store.append("System", &content, metadata, ExpectedSender::Empty).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::TurnViolation => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
