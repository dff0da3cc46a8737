use std::time::Duration;

use super::types::HiveError;
use tracing::warn;

/// Bounded retry policy for mutating store operations under contention.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 50,
            max_delay_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    /// Delay for the given 0-indexed attempt: exponential backoff plus
    /// random jitter, capped at `max_delay_ms`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay_ms.saturating_mul(1u64 << attempt.min(10));
        let jitter = (rand::random::<f64>() * self.base_delay_ms as f64) as u64;
        Duration::from_millis(base.saturating_add(jitter).min(self.max_delay_ms))
    }
}

/// Run a store write, retrying on lock contention with backoff and jitter.
///
/// After the attempt budget is exhausted the last error is surfaced and the
/// caller must treat the operation as not having happened at all. The sleep
/// is blocking: rusqlite itself is blocking and critical sections are short.
pub fn retrying_write<T, F>(operation: &str, policy: &RetryPolicy, mut f: F) -> Result<T, HiveError>
where
    F: FnMut() -> Result<T, HiveError>,
{
    let mut last = None;
    for attempt in 0..policy.max_attempts {
        match f() {
            Ok(v) => return Ok(v),
            Err(e) if e.is_contention() && attempt + 1 < policy.max_attempts => {
                let delay = policy.delay(attempt);
                warn!(
                    operation,
                    attempt = attempt + 1,
                    max = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Storage contention, retrying"
                );
                std::thread::sleep(delay);
                last = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(last.unwrap_or_else(|| HiveError::Internal("Retry loop exited unexpectedly".into())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = RetryPolicy::default();
        let d0 = policy.delay(0);
        assert!(d0.as_millis() >= 50 && d0.as_millis() < 150);
        let d9 = policy.delay(9);
        assert_eq!(d9.as_millis(), 2_000);
    }

    #[test]
    fn test_retrying_write_succeeds_first_try() {
        let policy = RetryPolicy::default();
        let result = retrying_write("test", &policy, || Ok::<_, HiveError>(42));
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_non_contention_fails_immediately() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::default();
        let result: Result<(), _> = retrying_write("test", &policy, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(HiveError::Config("bad".into()))
        });
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_contention_retries_until_success() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay_ms: 1,
            max_delay_ms: 5,
        };
        let result = retrying_write("test", &policy, || {
            if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(HiveError::Database("database is locked".into()))
            } else {
                Ok(7)
            }
        });
        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_contention_exhausts_attempts() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
        };
        let result: Result<(), _> = retrying_write("test", &policy, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(HiveError::Database("database is locked".into()))
        });
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
