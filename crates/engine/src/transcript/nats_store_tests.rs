// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn nats_state_round_trips_through_json() {
    let mut state = NatsState::new(Utc::now());
    state.total_turns = 3;
    state.per_sender_turns.insert("Alice".to_owned(), 2);
    state.last_sender = Some("Alice".to_owned());

    let bytes = serde_json::to_vec(&state).expect("serialize state");
    let back: NatsState = serde_json::from_slice(&bytes).expect("deserialize state");
    assert_eq!(back.total_turns, 3);
    assert_eq!(back.last_sender.as_deref(), Some("Alice"));
}

#[test]
fn into_public_drops_last_sender_but_keeps_totals() {
    let mut state = NatsState::new(Utc::now());
    state.total_turns = 5;
    state.total_tokens = 42;
    state.last_sender = Some("Bob".to_owned());

    let public = state.into_public();
    assert_eq!(public.total_turns, 5);
    assert_eq!(public.total_tokens, 42);
}

// Connection-dependent behavior (append/context/health against a live
// JetStream server) is exercised in integration tests outside this crate;
// mirroring the file-store suite here would require a running NATS
// server, which this repository's unit tests do not assume.
