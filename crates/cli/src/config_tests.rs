// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use clap::Parser;

fn parse(args: &[&str]) -> Cli {
    let mut full = vec!["parley"];
    full.extend_from_slice(args);
    Cli::parse_from(full)
}

#[test]
fn parses_required_flags() {
    let cli = parse(&["--agent1", "openai", "--agent2", "anthropic", "--topic", "chess"]);
    assert_eq!(cli.agent1, "openai");
    assert_eq!(cli.agent2, "anthropic");
    assert_eq!(cli.topic, "chess");
    assert_eq!(cli.turns, 50);
    assert!(!cli.yes);
}

#[test]
fn rejects_blank_topic() {
    let cli = parse(&["--agent1", "openai", "--agent2", "anthropic", "--topic", "   "]);
    assert!(cli.validate().is_err());
}

#[test]
fn rejects_zero_turns() {
    let cli =
        parse(&["--agent1", "openai", "--agent2", "anthropic", "--topic", "chess", "--turns", "0"]);
    assert!(cli.validate().is_err());
}

#[test]
fn accepts_model_overrides_and_yes_flag() {
    let cli = parse(&[
        "--agent1", "openai",
        "--agent2", "anthropic",
        "--model1", "gpt-5",
        "--model2", "claude-opus",
        "--topic", "chess",
        "--yes",
    ]);
    assert_eq!(cli.model1.as_deref(), Some("gpt-5"));
    assert_eq!(cli.model2.as_deref(), Some("claude-opus"));
    assert!(cli.yes);
}
