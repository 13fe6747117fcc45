//! Retry scheduler that keeps one asynchronous operation alive.
//!
//! The poller runs a caller-supplied operation in a dedicated Tokio task.
//! A failed run is retried after the delay its [`BackoffPolicy`] dictates;
//! a successful run means the operation has nothing left to do and the
//! loop ends. Exactly one run is in flight at any time.

use crate::backoff::BackoffPolicy;
use crate::error::Result;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, warn};

/// Handle to a running retry loop.
///
/// Disposal is permanent: no further runs are started, and an in-flight
/// backoff wait is cut short. The operation itself is not cancelled; it is
/// expected to observe its owner's disposal and complete on its own.
pub struct Poller {
    active: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl Poller {
    /// Spawn the retry loop and start the first run immediately.
    ///
    /// `operation` is invoked repeatedly: on `Err` the poller waits
    /// `policy.delay_for(attempt)` and runs it again; on `Ok` the loop ends.
    /// The attempt counter tracks consecutive failures.
    pub fn start<F, Fut>(label: &str, policy: Box<dyn BackoffPolicy>, operation: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let active = Arc::new(AtomicBool::new(true));
        let wake = Arc::new(Notify::new());
        let label = label.to_owned();

        let task_active = Arc::clone(&active);
        let task_wake = Arc::clone(&wake);
        tokio::spawn(async move {
            let mut attempt = 0usize;
            loop {
                if !task_active.load(Ordering::Acquire) {
                    debug!("poller '{}': disposed, exiting", label);
                    break;
                }

                match operation().await {
                    Ok(()) => {
                        debug!("poller '{}': operation completed, stopping", label);
                        break;
                    }
                    Err(e) => {
                        // Disposal may have happened while the run was in
                        // flight; do not schedule another one.
                        if !task_active.load(Ordering::Acquire) {
                            debug!("poller '{}': disposed during run, not retrying", label);
                            break;
                        }

                        match policy.delay_for(attempt) {
                            Some(delay) => {
                                debug!(
                                    "poller '{}': run {} failed ({}), retrying in {:?}",
                                    label, attempt, e, delay
                                );
                                tokio::select! {
                                    _ = tokio::time::sleep(delay) => {}
                                    _ = task_wake.notified() => {}
                                }
                                attempt += 1;
                            }
                            None => {
                                warn!(
                                    "poller '{}': policy exhausted after {} attempts ({})",
                                    label, attempt, e
                                );
                                break;
                            }
                        }
                    }
                }
            }
            debug!("poller '{}' task exiting", label);
        });

        Self { active, wake }
    }

    /// Stop the loop permanently. Idempotent.
    pub fn dispose(&self) {
        if self.active.swap(false, Ordering::AcqRel) {
            // notify_one stores a permit, so a backoff wait that starts
            // after this call still returns immediately.
            self.wake.notify_one();
        }
    }

    /// Whether `dispose` has been called.
    #[inline]
    pub fn is_disposed(&self) -> bool {
        !self.active.load(Ordering::Acquire)
    }
}
