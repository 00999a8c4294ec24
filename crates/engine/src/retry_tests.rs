// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn base_delay_grows_by_multiplier() {
    let policy = BackoffPolicy {
        initial: Duration::from_secs_f64(2.0),
        multiplier: 2.0,
        max: Duration::from_secs_f64(120.0),
        jitter_fraction: 0.2,
        max_retries: 3,
    };
    assert_eq!(policy.base_delay(0), Duration::from_secs_f64(2.0));
    assert_eq!(policy.base_delay(1), Duration::from_secs_f64(4.0));
    assert_eq!(policy.base_delay(2), Duration::from_secs_f64(8.0));
}

#[test]
fn base_delay_is_capped_at_max() {
    let policy = BackoffPolicy { max: Duration::from_secs_f64(5.0), ..BackoffPolicy::default() };
    assert_eq!(policy.base_delay(10), Duration::from_secs_f64(5.0));
}

#[test]
fn zero_jitter_fraction_returns_base_delay_exactly() {
    let policy = BackoffPolicy { jitter_fraction: 0.0, ..BackoffPolicy::default() };
    assert_eq!(policy.jittered_delay(1), policy.base_delay(1));
}

#[test]
fn jittered_delay_stays_within_spread() {
    let policy = BackoffPolicy::default();
    let base = policy.base_delay(1).as_secs_f64();
    let spread = base * policy.jitter_fraction;
    for _ in 0..50 {
        let jittered = policy.jittered_delay(1).as_secs_f64();
        assert!(jittered >= (base - spread).max(0.0) - 1e-9);
        assert!(jittered <= base + spread + 1e-9);
    }
}

#[tokio::test]
async fn sleep_returns_true_when_not_cancelled() {
    let policy = BackoffPolicy {
        initial: Duration::from_millis(1),
        jitter_fraction: 0.0,
        ..BackoffPolicy::default()
    };
    let cancel = tokio_util::sync::CancellationToken::new();
    assert!(policy.sleep(0, &cancel).await);
}

#[tokio::test]
async fn sleep_returns_false_when_cancelled_first() {
    let policy = BackoffPolicy {
        initial: Duration::from_secs(30),
        jitter_fraction: 0.0,
        ..BackoffPolicy::default()
    };
    let cancel = tokio_util::sync::CancellationToken::new();
    cancel.cancel();
    assert!(!policy.sleep(0, &cancel).await);
}
