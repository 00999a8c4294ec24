// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tempfile::tempdir;

use super::*;
use crate::message::MessageMetadata;

fn store() -> (tempfile::TempDir, FileStore) {
    let dir = tempdir().expect("create temp dir");
    let store = FileStore::open(dir.path(), 100_000).expect("open store");
    (dir, store)
}

#[tokio::test]
async fn append_then_context_returns_the_message() {
    let (_dir, store) = store();
    let msg = store.append("alice", "hello there", MessageMetadata::default(), ExpectedSender::Any).await.unwrap();
    assert_eq!(msg.id, 1);
    assert_eq!(msg.sender, "Alice");

    let context = store.context(10).await.unwrap();
    assert_eq!(context.len(), 1);
    assert_eq!(context[0].content, "hello there");
}

#[tokio::test]
async fn ids_increase_strictly_across_appends() {
    let (_dir, store) = store();
    let a = store.append("alice", "first", MessageMetadata::default(), ExpectedSender::Any).await.unwrap();
    let b = store.append("bob", "second", MessageMetadata::default(), ExpectedSender::Any).await.unwrap();
    assert_eq!(a.id, 1);
    assert_eq!(b.id, 2);
}

#[tokio::test]
async fn last_sender_reflects_highest_id_append() {
    let (_dir, store) = store();
    store.append("alice", "first", MessageMetadata::default(), ExpectedSender::Any).await.unwrap();
    store.append("bob", "second", MessageMetadata::default(), ExpectedSender::Any).await.unwrap();
    assert_eq!(store.last_sender().await.unwrap().as_deref(), Some("Bob"));
}

#[tokio::test]
async fn empty_content_is_rejected() {
    let (_dir, store) = store();
    let err = store.append("alice", "", MessageMetadata::default(), ExpectedSender::Any).await.unwrap_err();
    assert_eq!(err.kind(), crate::error::ErrorKind::InvalidInput);
}

#[tokio::test]
async fn oversize_content_is_rejected() {
    let dir = tempdir().expect("create temp dir");
    let store = FileStore::open(dir.path(), 4).expect("open store");
    let err = store.append("alice", "too long", MessageMetadata::default(), ExpectedSender::Any).await.unwrap_err();
    assert_eq!(err.kind(), crate::error::ErrorKind::InvalidInput);
}

#[tokio::test]
async fn mark_terminated_is_first_reason_wins() {
    let (_dir, store) = store();
    store.mark_terminated("max_turns_reached").await.unwrap();
    store.mark_terminated("timeout").await.unwrap();
    assert!(store.terminated().await.unwrap());
    assert_eq!(store.termination_reason().await.unwrap().as_deref(), Some("max_turns_reached"));
}

#[tokio::test]
async fn context_limit_returns_only_latest_messages() {
    let (_dir, store) = store();
    for i in 0..5 {
        store.append("alice", &format!("message {i}"), MessageMetadata::default(), ExpectedSender::Any).await.unwrap();
    }
    let context = store.context(1).await.unwrap();
    assert_eq!(context.len(), 1);
    assert_eq!(context[0].content, "message 4");
}

#[tokio::test]
async fn metadata_tracks_totals_per_sender() {
    let (_dir, store) = store();
    let meta = MessageMetadata { tokens: Some(10), ..Default::default() };
    store.append("alice", "one", meta.clone(), ExpectedSender::Any).await.unwrap();
    store.append("alice", "two", meta, ExpectedSender::Any).await.unwrap();
    let snapshot = store.metadata().await.unwrap();
    assert_eq!(snapshot.total_turns, 2);
    assert_eq!(snapshot.total_tokens, 20);
    assert_eq!(snapshot.per_sender_turns.get("Alice"), Some(&2));
}

#[tokio::test]
async fn cas_guard_rejects_a_stale_expected_sender() {
    let (_dir, store) = store();
    store.append("alice", "first", MessageMetadata::default(), ExpectedSender::Any).await.unwrap();
    store.append("bob", "second", MessageMetadata::default(), ExpectedSender::Any).await.unwrap();
    // A caller that still believes Alice spoke last (stale view: Bob has
    // since posted) must be rejected, not silently allowed through.
    let err = store
        .append("carol", "third", MessageMetadata::default(), ExpectedSender::Sender("Alice"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), crate::error::ErrorKind::TurnViolation);
}

#[tokio::test]
async fn cas_guard_accepts_when_expected_sender_matches_observed() {
    let (_dir, store) = store();
    store.append("alice", "first", MessageMetadata::default(), ExpectedSender::Any).await.unwrap();
    store
        .append("bob", "second", MessageMetadata::default(), ExpectedSender::Sender("Alice"))
        .await
        .unwrap();
}

#[tokio::test]
async fn cas_guard_rejects_a_racing_append_against_an_empty_store() {
    let (_dir, store) = store();
    // Two agents racing to post the opening turn both observe an empty
    // transcript and both guard on `Empty`; only the first writer may win.
    store
        .append("alice", "alice spoke first", MessageMetadata::default(), ExpectedSender::Empty)
        .await
        .unwrap();
    let err = store
        .append("bob", "bob also thought it was empty", MessageMetadata::default(), ExpectedSender::Empty)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), crate::error::ErrorKind::TurnViolation);
    assert_eq!(store.last_sender().await.unwrap().as_deref(), Some("Alice"));
}

#[tokio::test]
async fn health_reports_lock_acquirable_on_fresh_store() {
    let (_dir, store) = store();
    let health = store.health().await.unwrap();
    assert!(health.healthy);
    assert!(health.lock_acquirable);
}

#[tokio::test]
async fn corrupt_record_is_skipped_with_best_effort_recovery() {
    let (_dir, store) = store();
    store.append("alice", "good message", MessageMetadata::default(), ExpectedSender::Any).await.unwrap();

    // Hand-corrupt the log: truncate the well-formed line's trailing content
    // but keep enough JSON structure for id/sender salvage.
    let mut bytes = std::fs::read(&store.messages_path).unwrap();
    bytes.extend_from_slice(b"{\"id\":2,\"sender\":\"Bob\"}\n");
    std::fs::write(&store.messages_path, bytes).unwrap();

    let context = store.context(10).await.unwrap();
    assert_eq!(context.len(), 2);
    assert_eq!(context[1].sender, "Bob");
    assert_eq!(context[1].content, "<corrupted record>");
}
