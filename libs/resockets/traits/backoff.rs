use std::time::Duration;

/// Pacing policy for the poller's retry loop.
///
/// The poller consults the policy after every failed cycle of its
/// operation. Attempt numbers count consecutive failures, starting at 0.
pub trait BackoffPolicy: Send + Sync {
    /// Delay before re-running the operation after failure number `attempt`.
    ///
    /// # Returns
    /// * `Some(duration)` - wait this long, then retry
    /// * `None` - give up permanently
    fn delay_for(&self, attempt: usize) -> Option<Duration>;
}

/// Exponential backoff: `base * 2^attempt`, capped at `cap`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base: Duration,
    cap: Duration,
    max_attempts: Option<usize>,
}

impl ExponentialBackoff {
    /// # Arguments
    /// * `base` - delay before the first retry
    /// * `cap` - upper bound on any single delay
    /// * `max_attempts` - total retries allowed (None = unlimited)
    pub fn new(base: Duration, cap: Duration, max_attempts: Option<usize>) -> Self {
        Self {
            base,
            cap,
            max_attempts,
        }
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(250), Duration::from_secs(30), None)
    }
}

impl BackoffPolicy for ExponentialBackoff {
    fn delay_for(&self, attempt: usize) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if attempt >= max {
                return None;
            }
        }
        // Shift saturates well before u64 overflow; the cap keeps the
        // result sane for any attempt number.
        let factor = 1u64 << attempt.min(32) as u32;
        let millis = (self.base.as_millis() as u64).saturating_mul(factor);
        Some(Duration::from_millis(
            millis.min(self.cap.as_millis() as u64),
        ))
    }
}

/// Fixed delay between every retry.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: Option<usize>,
}

impl FixedDelay {
    pub fn new(delay: Duration, max_attempts: Option<usize>) -> Self {
        Self {
            delay,
            max_attempts,
        }
    }
}

impl BackoffPolicy for FixedDelay {
    fn delay_for(&self, attempt: usize) -> Option<Duration> {
        match self.max_attempts {
            Some(max) if attempt >= max => None,
            _ => Some(self.delay),
        }
    }
}

/// Never retry: the first failure is final.
#[derive(Debug, Clone)]
pub struct NoRetry;

impl BackoffPolicy for NoRetry {
    fn delay_for(&self, _attempt: usize) -> Option<Duration> {
        None
    }
}
