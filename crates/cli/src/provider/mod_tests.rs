// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn mock_never_requires_a_credential() {
    assert!(!requires_credential("mock"));
    assert!(!requires_credential("MOCK"));
}

#[test]
fn other_providers_require_a_credential() {
    assert!(requires_credential("openai"));
    assert!(requires_credential("anthropic"));
}

#[test]
fn resolve_mock_uses_the_requested_model_override() {
    let adapter = resolve("mock", Some("mock-2"));
    assert_eq!(adapter.name(), "mock");
    assert_eq!(adapter.default_model(), "mock-2");
}
