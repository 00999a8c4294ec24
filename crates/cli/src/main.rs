// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

mod config;
mod provider;
mod run;

use clap::Parser;

use crate::config::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    std::process::exit(run::run(cli).await);
}
