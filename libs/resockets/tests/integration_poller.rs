//! Tests for the poller's retry-loop contract.

mod common;

use common::wait_until;
use resockets::{FixedDelay, NoRetry, Poller, StreamError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn failing_forever(runs: &Arc<AtomicUsize>) -> impl Fn() -> std::future::Ready<resockets::Result<()>> + Send + 'static {
    let runs = Arc::clone(runs);
    move || {
        runs.fetch_add(1, Ordering::AcqRel);
        std::future::ready(Err(StreamError::Transport("down".into())))
    }
}

#[tokio::test]
async fn retries_until_the_operation_succeeds() {
    let runs = Arc::new(AtomicUsize::new(0));
    let op_runs = Arc::clone(&runs);

    let poller = Poller::start(
        "test",
        Box::new(FixedDelay::new(Duration::from_millis(10), None)),
        move || {
            let n = op_runs.fetch_add(1, Ordering::AcqRel);
            async move {
                if n < 2 {
                    Err(StreamError::Transport("not yet".into()))
                } else {
                    Ok(())
                }
            }
        },
    );

    assert!(wait_until(|| runs.load(Ordering::Acquire) == 3, Duration::from_secs(1)).await);

    // Success ends the loop; nothing more runs.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(runs.load(Ordering::Acquire), 3);
    assert!(!poller.is_disposed(), "completion is not disposal");
}

#[tokio::test]
async fn dispose_stops_retrying_permanently() {
    let runs = Arc::new(AtomicUsize::new(0));
    let poller = Poller::start(
        "test",
        Box::new(FixedDelay::new(Duration::from_millis(10), None)),
        failing_forever(&runs),
    );

    assert!(wait_until(|| runs.load(Ordering::Acquire) >= 2, Duration::from_secs(1)).await);

    poller.dispose();
    assert!(poller.is_disposed());

    let runs_at_dispose = runs.load(Ordering::Acquire);
    tokio::time::sleep(Duration::from_millis(100)).await;
    // At most the run already in flight finishes; no new cycle starts.
    assert!(runs.load(Ordering::Acquire) <= runs_at_dispose + 1);

    poller.dispose(); // idempotent
    assert!(poller.is_disposed());
}

#[tokio::test]
async fn exhausted_policy_stops_the_loop() {
    let runs = Arc::new(AtomicUsize::new(0));
    let _poller = Poller::start("test", Box::new(NoRetry), failing_forever(&runs));

    assert!(wait_until(|| runs.load(Ordering::Acquire) == 1, Duration::from_secs(1)).await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(runs.load(Ordering::Acquire), 1, "NoRetry allowed a retry");
}

#[tokio::test]
async fn dispose_cuts_a_long_backoff_short() {
    let runs = Arc::new(AtomicUsize::new(0));
    let poller = Poller::start(
        "test",
        Box::new(FixedDelay::new(Duration::from_secs(3600), None)),
        failing_forever(&runs),
    );

    assert!(wait_until(|| runs.load(Ordering::Acquire) == 1, Duration::from_secs(1)).await);

    // The loop is now parked in an hour-long wait; disposal must not hang
    // behind it.
    poller.dispose();
    assert!(poller.is_disposed());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(runs.load(Ordering::Acquire), 1);
}
