// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use parley_engine::ProviderRole;

#[tokio::test]
async fn echoes_a_truncated_reference_to_the_last_message() {
    let adapter = MockAdapter::new("mock-a", "mock-1");
    let messages =
        vec![ProviderMessage { role: ProviderRole::User, content: "hello there".to_owned() }];
    let response = adapter.call("mock-1", &messages, 0.7, 256).await.unwrap();
    assert!(response.text.contains("hello there"));
    assert!(response.text.starts_with("(mock-a)"));
}

#[tokio::test]
async fn rejects_an_empty_context() {
    let adapter = MockAdapter::new("mock-a", "mock-1");
    let err = adapter.call("mock-1", &[], 0.7, 256).await.unwrap_err();
    assert_eq!(err.kind, parley_engine::ErrorKind::InvalidInput);
}

#[test]
fn truncate_appends_ellipsis_only_past_the_limit() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("0123456789ABC", 10), "0123456789...");
}
