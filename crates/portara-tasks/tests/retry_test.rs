// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tests for the single-flight retry executor.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use portara_tasks::{CallOutcome, Error, RetryConfig, RetryExecutor};

fn config(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        min_delay: Duration::from_millis(100),
        max_delay: Duration::from_millis(500),
    }
}

// ============================================================================
// Retry bound
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_first_attempt_success_needs_no_retry() {
    let executor = RetryExecutor::new(config(5));
    let attempts = Arc::new(AtomicUsize::new(0));

    let result = executor
        .execute(|| {
            let attempts = attempts.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Ok(CallOutcome::Completed("job-123"))
            }
        })
        .await
        .expect("first attempt should succeed");

    assert_eq!(result, "job-123");
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_transient_cancellations_are_retried() {
    let executor = RetryExecutor::new(config(5));
    let attempts = Arc::new(AtomicUsize::new(0));

    let result = executor
        .execute(|| {
            let attempts = attempts.clone();
            async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Ok(CallOutcome::Cancelled)
                } else {
                    Ok(CallOutcome::Completed(n))
                }
            }
        })
        .await
        .expect("third attempt should succeed");

    assert_eq!(result, 3);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_exhaustion_after_exactly_max_attempts() {
    let executor = RetryExecutor::new(config(5));
    let attempts = Arc::new(AtomicUsize::new(0));

    let result: portara_tasks::Result<()> = executor
        .execute(|| {
            let attempts = attempts.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Ok(CallOutcome::Cancelled)
            }
        })
        .await;

    assert_eq!(attempts.load(Ordering::SeqCst), 5, "never more, never fewer");
    match result {
        Err(Error::RetriesExhausted { attempts }) => assert_eq!(attempts, 5),
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_hard_error_is_not_retried() {
    let executor = RetryExecutor::new(config(5));
    let attempts = Arc::new(AtomicUsize::new(0));

    let result: portara_tasks::Result<()> = executor
        .execute(|| {
            let attempts = attempts.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(Error::ResourceUnavailable("job service is down".to_string()))
            }
        })
        .await;

    assert_eq!(attempts.load(Ordering::SeqCst), 1, "hard errors are terminal");
    match result {
        Err(Error::ResourceUnavailable(message)) => {
            assert_eq!(message, "job service is down");
        }
        other => panic!("expected ResourceUnavailable, got {other:?}"),
    }
}

// ============================================================================
// Single-flight
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_concurrent_executes_never_overlap() {
    let executor = Arc::new(RetryExecutor::new(config(3)));
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_in_flight = Arc::new(AtomicUsize::new(0));
    let completed = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let executor = executor.clone();
        let in_flight = in_flight.clone();
        let max_in_flight = max_in_flight.clone();
        let completed = completed.clone();
        handles.push(tokio::spawn(async move {
            executor
                .execute(move || {
                    let in_flight = in_flight.clone();
                    let max_in_flight = max_in_flight.clone();
                    async move {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        max_in_flight.fetch_max(now, Ordering::SeqCst);
                        // Keep the call in flight long enough for the other
                        // callers to pile up.
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        Ok(CallOutcome::Completed(()))
                    }
                })
                .await
                .expect("call should succeed");
            completed.fetch_add(1, Ordering::SeqCst);
        }));
    }

    for handle in handles {
        handle.await.expect("caller task should not panic");
    }

    assert_eq!(completed.load(Ordering::SeqCst), 4, "every caller ran");
    assert_eq!(
        max_in_flight.load(Ordering::SeqCst),
        1,
        "two calls were in flight at once"
    );
}

#[tokio::test(start_paused = true)]
async fn test_waiting_caller_runs_after_retry_delays() {
    let executor = Arc::new(RetryExecutor::new(config(3)));
    let calls = Arc::new(AtomicUsize::new(0));

    // First caller burns all attempts, holding the flight lock across its
    // inter-attempt delays.
    let first = {
        let executor = executor.clone();
        let calls = calls.clone();
        tokio::spawn(async move {
            let result: portara_tasks::Result<()> = executor
                .execute(move || {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(CallOutcome::Cancelled)
                    }
                })
                .await;
            result
        })
    };

    let second = {
        let executor = executor.clone();
        let calls = calls.clone();
        tokio::spawn(async move {
            executor
                .execute(move || {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(CallOutcome::Completed(()))
                    }
                })
                .await
        })
    };

    let first = first.await.expect("first caller should not panic");
    assert!(matches!(first, Err(Error::RetriesExhausted { attempts: 3 })));

    second
        .await
        .expect("second caller should not panic")
        .expect("second caller should succeed");

    // 3 exhausted attempts from the first caller, 1 from the second.
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}
