// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn transient_and_rate_limited_are_retriable() {
    assert!(ErrorKind::Transient.retriable());
    assert!(ErrorKind::RateLimited.retriable());
}

#[test]
fn invalid_input_is_not_retriable() {
    assert!(!ErrorKind::InvalidInput.retriable());
    assert!(!ErrorKind::Auth.retriable());
    assert!(!ErrorKind::PermanentConfig.retriable());
}

#[test]
fn display_includes_kind_and_detail() {
    let err = EngineError::invalid_input("empty content");
    let s = err.to_string();
    assert!(s.contains("invalid_input"));
    assert!(s.contains("empty content"));
}

#[test]
fn reason_tag_matches_kind_str() {
    let err = EngineError::store_unavailable("disk full");
    assert_eq!(err.reason_tag(), "store_unavailable");
}

#[test]
fn io_would_block_maps_to_transient() {
    let io_err = std::io::Error::new(std::io::ErrorKind::WouldBlock, "locked");
    let err: EngineError = io_err.into();
    assert_eq!(err.kind(), ErrorKind::Transient);
}

#[test]
fn io_other_maps_to_store_unavailable() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
    let err: EngineError = io_err.into();
    assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
}
