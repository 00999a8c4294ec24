// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn normalize_trims_and_capitalizes_first_letter() {
    assert_eq!(normalize_sender("  alice  ").as_deref(), Some("Alice"));
    assert_eq!(normalize_sender("bob").as_deref(), Some("Bob"));
}

#[test]
fn normalize_preserves_rest_of_casing() {
    assert_eq!(normalize_sender("aLICE").as_deref(), Some("ALICE"));
}

#[test]
fn normalize_rejects_empty_or_whitespace() {
    assert_eq!(normalize_sender(""), None);
    assert_eq!(normalize_sender("   "), None);
}

#[test]
fn metadata_round_trips_through_json() -> Result<(), serde_json::Error> {
    let meta = MessageMetadata {
        tokens: Some(42),
        model: Some("demo-model".to_owned()),
        turn: Some(3),
        response_time_ms: Some(120),
        fingerprint: Some("abc123".to_owned()),
        seed: None,
        extra: BTreeMap::new(),
    };
    let json = serde_json::to_string(&meta)?;
    let back: MessageMetadata = serde_json::from_str(&json)?;
    assert_eq!(back, meta);
    Ok(())
}

#[test]
fn message_round_trips_through_json() -> Result<(), serde_json::Error> {
    let msg = Message {
        id: 1,
        sender: "Alice".to_owned(),
        content: "hello".to_owned(),
        timestamp: Utc::now(),
        metadata: MessageMetadata::default(),
    };
    let json = serde_json::to_string(&msg)?;
    let back: Message = serde_json::from_str(&json)?;
    assert_eq!(back, msg);
    Ok(())
}
