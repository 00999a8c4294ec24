// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::Parser;

/// Drive a two-or-more party LLM conversation to a terminal condition.
#[derive(Debug, Parser)]
#[command(name = "parley", version, about)]
pub struct Cli {
    /// Provider identifier for the first agent (from the registered set).
    #[arg(long)]
    pub agent1: String,

    /// Provider identifier for the second agent.
    #[arg(long)]
    pub agent2: String,

    /// Model override for agent1; defaults to the provider's own default.
    #[arg(long)]
    pub model1: Option<String>,

    /// Model override for agent2; defaults to the provider's own default.
    #[arg(long)]
    pub model2: Option<String>,

    /// Conversation topic. Required, non-empty.
    #[arg(long)]
    pub topic: String,

    /// Per-agent turn cap.
    #[arg(long, env = "DEFAULT_MAX_TURNS", default_value = "50")]
    pub turns: u32,

    /// Transcript location. Defaults to a path under `DATA_DIR`.
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Skip the interactive confirmation prompt.
    #[arg(long)]
    pub yes: bool,
}

/// Process exit codes per the CLI surface contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Normal = 0,
    UnexpectedFatal = 1,
    InvalidArguments = 2,
    ConfigInvalid = 3,
    CredentialsMissing = 4,
    StoreUnhealthy = 5,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl Cli {
    /// Validate flags that `clap` itself cannot express (non-empty topic,
    /// distinct agents). Returns `Err` with a message suitable for
    /// printing before exiting with [`ExitCode::InvalidArguments`].
    pub fn validate(&self) -> Result<(), String> {
        if self.topic.trim().is_empty() {
            return Err("--topic must be non-empty".to_owned());
        }
        if self.turns < 1 {
            return Err("--turns must be >= 1".to_owned());
        }
        if self.agent1.trim().is_empty() || self.agent2.trim().is_empty() {
            return Err("--agent1 and --agent2 must be non-empty".to_owned());
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
