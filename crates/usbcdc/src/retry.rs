//! Bounded retry with exponential backoff
//!
//! Replaces the classic "spin until the device shows up" open loop with an
//! explicit policy: sleep between attempts, double the sleep up to a cap, and
//! give up once an optional deadline has passed. `deadline: None` waits
//! forever, which is the old behavior as an explicit caller choice.

use std::time::{Duration, Instant};
use tracing::debug;

/// Backoff policy for waiting on a resource to become available.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Sleep before the second attempt.
    pub initial: Duration,
    /// Upper bound on the sleep between attempts.
    pub max: Duration,
    /// Total time budget; `None` retries indefinitely.
    pub deadline: Option<Duration>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(50),
            max: Duration::from_secs(2),
            deadline: Some(Duration::from_secs(30)),
        }
    }
}

impl BackoffPolicy {
    /// Retry `attempt` until it yields `Some` or the deadline passes.
    ///
    /// On exhaustion returns the total time waited so the caller can report
    /// it.
    pub fn wait_for<T>(&self, mut attempt: impl FnMut() -> Option<T>) -> Result<T, Duration> {
        let start = Instant::now();
        let mut backoff = self.initial;

        loop {
            if let Some(value) = attempt() {
                return Ok(value);
            }

            let elapsed = start.elapsed();
            if let Some(deadline) = self.deadline {
                if elapsed >= deadline {
                    return Err(elapsed);
                }
            }

            debug!("resource not available, retrying in {:?}", backoff);
            std::thread::sleep(backoff);
            backoff = (backoff * 2).min(self.max);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_policy(deadline: Option<Duration>) -> BackoffPolicy {
        BackoffPolicy {
            initial: Duration::from_millis(1),
            max: Duration::from_millis(2),
            deadline,
        }
    }

    #[test]
    fn test_immediate_success_does_not_sleep() {
        let policy = quick_policy(Some(Duration::from_secs(1)));
        let result = policy.wait_for(|| Some(42));
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_succeeds_after_failures() {
        let policy = quick_policy(Some(Duration::from_secs(5)));
        let mut attempts = 0;
        let result = policy.wait_for(|| {
            attempts += 1;
            if attempts < 4 { None } else { Some("ready") }
        });
        assert_eq!(result.unwrap(), "ready");
        assert_eq!(attempts, 4);
    }

    #[test]
    fn test_deadline_exhaustion() {
        let policy = quick_policy(Some(Duration::from_millis(5)));
        let result: Result<(), Duration> = policy.wait_for(|| None);
        let waited = result.unwrap_err();
        assert!(waited >= Duration::from_millis(5));
    }
}
