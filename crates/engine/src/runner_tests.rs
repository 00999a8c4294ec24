// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tempfile::tempdir;

use super::*;
use crate::provider::{ProviderError, ProviderMessage, ProviderResponse, TokenUsage};
use crate::transcript::file_store::FileStore;

struct ScriptedAdapter {
    name: String,
    responses: Vec<std::result::Result<&'static str, ProviderError>>,
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_model(&self) -> &str {
        "scripted-1"
    }

    async fn call(
        &self,
        _model: &str,
        _messages: &[ProviderMessage],
        _temperature: f64,
        _max_tokens: u32,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let idx = self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self.responses.get(idx).or_else(|| self.responses.last()).cloned();
        match outcome.unwrap_or(Ok("fallback")) {
            Ok(text) => Ok(ProviderResponse {
                text: text.to_owned(),
                usage: TokenUsage { input_tokens: Some(1), output_tokens: Some(1) },
            }),
            Err(e) => Err(e),
        }
    }
}

fn fast_config() -> EngineConfig {
    EngineConfig {
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
        backoff_multiplier: 2.0,
        ..EngineConfig::default()
    }
}

async fn store() -> (tempfile::TempDir, Arc<dyn TranscriptStore>) {
    let dir = tempdir().expect("create temp dir");
    let fs = FileStore::open(dir.path(), 100_000).expect("open store");
    (dir, Arc::new(fs))
}

fn spec(name: &str, responses: Vec<std::result::Result<&'static str, ProviderError>>) -> AgentSpec {
    let adapter =
        Arc::new(ScriptedAdapter { name: name.to_lowercase(), responses, calls: AtomicUsize::new(0) });
    AgentSpec {
        name: name.to_owned(),
        provider: adapter,
        model: "m1".to_owned(),
        requires_credential: false,
    }
}

#[tokio::test]
async fn seeds_a_system_opener_with_the_topic_before_any_agent_speaks() {
    let (_dir, store) = store().await;
    let agents = vec![
        spec("Alice", vec![Ok("hi")]),
        spec("Bob", vec![Ok("hi back")]),
    ];
    let runner = Runner::new(
        Arc::clone(&store),
        fast_config(),
        EngineMetrics::new(),
        CancellationToken::new(),
        "quantum gravity".to_owned(),
        agents,
        1,
        Duration::from_secs(30),
    )
    .unwrap();

    let summary = runner.run().await.unwrap();
    assert_eq!(summary.outcomes.len(), 2);

    let context = store.context(10).await.unwrap();
    assert_eq!(context[0].sender, "System");
    assert_eq!(context[0].content, "Topic: quantum gravity. Begin.");
    assert_eq!(context[0].metadata.seed, Some(true));
}

#[tokio::test]
async fn does_not_reseed_an_opener_onto_a_non_empty_transcript() {
    let (_dir, store) = store().await;
    store
        .append(
            "System",
            "Topic: preexisting. Begin.",
            MessageMetadata { seed: Some(true), ..Default::default() },
            ExpectedSender::Empty,
        )
        .await
        .unwrap();
    let agents = vec![spec("Alice", vec![Ok("hi")]), spec("Bob", vec![Ok("hi back")])];
    let runner = Runner::new(
        Arc::clone(&store),
        fast_config(),
        EngineMetrics::new(),
        CancellationToken::new(),
        "ignored topic".to_owned(),
        agents,
        1,
        Duration::from_secs(30),
    )
    .unwrap();

    runner.run().await.unwrap();
    let context = store.context(10).await.unwrap();
    assert_eq!(context[0].content, "Topic: preexisting. Begin.");
}

#[tokio::test]
async fn rejects_construction_with_fewer_than_two_agents() {
    let (_dir, store) = store().await;
    let agents = vec![spec("Alice", vec![Ok("hi")])];
    let err = Runner::new(
        store,
        fast_config(),
        EngineMetrics::new(),
        CancellationToken::new(),
        "topic".to_owned(),
        agents,
        1,
        Duration::from_secs(30),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermanentConfig);
}

#[tokio::test]
async fn rejects_construction_with_duplicate_normalized_names() {
    let (_dir, store) = store().await;
    let agents = vec![spec("alice", vec![Ok("hi")]), spec("Alice", vec![Ok("hi")])];
    let err = Runner::new(
        store,
        fast_config(),
        EngineMetrics::new(),
        CancellationToken::new(),
        "topic".to_owned(),
        agents,
        1,
        Duration::from_secs(30),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermanentConfig);
}

#[tokio::test]
async fn rejects_construction_with_blank_topic() {
    let (_dir, store) = store().await;
    let agents = vec![spec("Alice", vec![Ok("hi")]), spec("Bob", vec![Ok("hi")])];
    let err = Runner::new(
        store,
        fast_config(),
        EngineMetrics::new(),
        CancellationToken::new(),
        "   ".to_owned(),
        agents,
        1,
        Duration::from_secs(30),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[tokio::test]
async fn summary_aggregates_turns_and_tokens_across_both_agents() {
    let (_dir, store) = store().await;
    let agents = vec![
        spec("Alice", vec![Ok("one"), Ok("three")]),
        spec("Bob", vec![Ok("two"), Ok("four")]),
    ];
    let runner = Runner::new(
        store,
        fast_config(),
        EngineMetrics::new(),
        CancellationToken::new(),
        "topic".to_owned(),
        agents,
        2,
        Duration::from_secs(30),
    )
    .unwrap();

    let summary = runner.run().await.unwrap();
    assert_eq!(summary.total_turns, 4);
    assert_eq!(summary.total_tokens, 8);
    assert_eq!(summary.per_sender_turns.get("Alice"), Some(&2));
    assert_eq!(summary.per_sender_turns.get("Bob"), Some(&2));
    assert_eq!(summary.termination_reason, Some("max_turns_reached".to_owned()));
}
