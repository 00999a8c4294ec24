// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Glue between the parsed CLI flags and [`parley_engine::runner::Runner`]:
//! builds the engine configuration, resolves provider adapters, installs
//! signal handling, and maps the run's outcome to a process exit code.

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use parley_engine::{AgentSpec, EngineConfig, EngineMetrics, ErrorKind, RunSummary, Runner};

use crate::config::{Cli, ExitCode};
use crate::provider;

/// Initialize tracing from `RUST_LOG`, defaulting to `info`. Uses
/// `try_init` so it is safe to call more than once (e.g. from tests).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Install a SIGINT/SIGTERM handler that cancels `token` on the first
/// signal and force-exits on a second.
fn spawn_signal_handler(token: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
        let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();

        tokio::select! {
            _ = async { if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await } } => {
                info!("received SIGTERM");
            }
            _ = async { if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await } } => {
                info!("received SIGINT");
            }
        }
        token.cancel();

        tokio::select! {
            _ = async { if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await } } => {
                info!("received SIGTERM again, forcing exit");
            }
            _ = async { if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await } } => {
                info!("received SIGINT again, forcing exit");
            }
        }
        std::process::exit(130);
    });
}

fn db_path(cli: &Cli, config: &EngineConfig) -> PathBuf {
    cli.db.clone().unwrap_or_else(|| config.data_dir.clone())
}

/// Interactive `(y/n)` confirmation, bypassed entirely by `--yes` (§6.2).
/// Anything other than a case-insensitive `y` is treated as a decline.
fn confirm(question: &str) -> anyhow::Result<bool> {
    print!("{question} (y/n): ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

/// Run the configured conversation to completion and return the process
/// exit code. The happy path and every anticipated failure (bad config,
/// missing credentials, an unhealthy store, a terminated-with-reason
/// run) are mapped to the exit codes of §6.2 explicitly; anything else
/// — a bug surfacing as an unexpected `anyhow::Error` — falls through to
/// `UnexpectedFatal`.
pub async fn run(cli: Cli) -> i32 {
    match try_run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("fatal: {e:#}");
            ExitCode::UnexpectedFatal.code()
        }
    }
}

async fn try_run(cli: Cli) -> anyhow::Result<i32> {
    init_tracing();

    if let Err(msg) = cli.validate() {
        eprintln!("error: {msg}");
        return Ok(ExitCode::InvalidArguments.code());
    }

    let config = match EngineConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return Ok(ExitCode::ConfigInvalid.code());
        }
    };
    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        return Ok(ExitCode::ConfigInvalid.code());
    }

    if provider::requires_credential(&cli.agent1) && EngineConfig::api_key_for(&cli.agent1).is_none() {
        eprintln!("error: missing credentials for provider {}", cli.agent1);
        return Ok(ExitCode::CredentialsMissing.code());
    }
    if provider::requires_credential(&cli.agent2) && EngineConfig::api_key_for(&cli.agent2).is_none() {
        eprintln!("error: missing credentials for provider {}", cli.agent2);
        return Ok(ExitCode::CredentialsMissing.code());
    }

    let path = db_path(&cli, &config);
    let store: std::sync::Arc<dyn parley_engine::TranscriptStore> =
        match parley_engine::transcript::file_store::FileStore::open(&path, config.max_message_length) {
            Ok(fs) => std::sync::Arc::new(fs),
            Err(e) => {
                error!("failed to open transcript store: {e}");
                return Ok(ExitCode::StoreUnhealthy.code());
            }
        };

    let agent1 = provider::resolve(&cli.agent1, cli.model1.as_deref());
    let agent2 = provider::resolve(&cli.agent2, cli.model2.as_deref());
    let model1 = cli.model1.clone().unwrap_or_else(|| agent1.default_model().to_owned());
    let model2 = cli.model2.clone().unwrap_or_else(|| agent2.default_model().to_owned());

    let agents = vec![
        AgentSpec {
            name: cli.agent1.clone(),
            provider: agent1,
            model: model1,
            requires_credential: provider::requires_credential(&cli.agent1),
        },
        AgentSpec {
            name: cli.agent2.clone(),
            provider: agent2,
            model: model2,
            requires_credential: provider::requires_credential(&cli.agent2),
        },
    ];

    if !cli.yes {
        let question = format!(
            "run \"{}\" between {} ({}) and {} ({}) for up to {} turns each?",
            cli.topic, agents[0].name, agents[0].model, agents[1].name, agents[1].model, cli.turns
        );
        if !confirm(&question)? {
            println!("aborted");
            return Ok(ExitCode::InvalidArguments.code());
        }
    }

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let timeout = Duration::from_secs(u64::from(config.default_timeout_minutes) * 60);
    let runner = match Runner::new(
        store,
        config,
        EngineMetrics::new(),
        cancel,
        cli.topic.clone(),
        agents,
        cli.turns,
        timeout,
    ) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return Ok(exit_code_for(e.kind()));
        }
    };

    Ok(match runner.run().await {
        Ok(summary) => {
            print_summary(&summary);
            ExitCode::Normal.code()
        }
        Err(e) => {
            error!("fatal: {e}");
            exit_code_for(e.kind())
        }
    })
}

fn exit_code_for(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::PermanentConfig => ExitCode::ConfigInvalid.code(),
        ErrorKind::Auth => ExitCode::CredentialsMissing.code(),
        ErrorKind::StoreUnavailable => ExitCode::StoreUnhealthy.code(),
        ErrorKind::InvalidInput => ExitCode::InvalidArguments.code(),
        _ => ExitCode::UnexpectedFatal.code(),
    }
}

fn print_summary(summary: &RunSummary) {
    println!("run {}", summary.run_id);
    println!("terminated: {}", summary.termination_reason.as_deref().unwrap_or("unknown"));
    println!("turns: {} over {:?}", summary.total_turns, summary.duration);
    println!("tokens: {}", summary.total_tokens);
    for (sender, turns) in &summary.per_sender_turns {
        println!("  {sender}: {turns} turns");
    }
    for outcome in &summary.outcomes {
        println!("  {} exited: {}", outcome.name, outcome.reason);
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
