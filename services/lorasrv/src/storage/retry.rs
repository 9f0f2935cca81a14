//! Bounded retry with exponential backoff

use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry policy for a single sink write
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay after the first failure
    pub initial_delay: Duration,
    /// Backoff multiplier for exponential delay
    pub backoff_multiplier: f64,
    /// Upper bound for a single delay
    pub max_delay: Duration,
    /// Whether to add ±25% jitter to delays
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// Policy that retries `max_attempts` times without waiting
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Delay after the `failures`-th failed attempt: `initial * multiplier^(failures-1)`
    pub fn delay(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.backoff_multiplier.powi(exponent);

        let mut delay = Duration::try_from_secs_f64(self.initial_delay.as_secs_f64() * factor)
            .unwrap_or(self.max_delay);

        if delay > self.max_delay {
            delay = self.max_delay;
        }

        if self.jitter && !delay.is_zero() {
            let secs = delay.as_secs_f64();
            let jitter_range = secs * 0.25;
            let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
            delay = Duration::try_from_secs_f64((secs + jitter).max(0.0)).unwrap_or(delay);
        }

        // applied after jitter
        if delay > self.max_delay {
            delay = self.max_delay;
        }

        delay
    }

    /// Run `op` until it succeeds or the attempt budget is spent
    ///
    /// Returns the last error once every attempt has failed.
    pub async fn run<F, Fut, T, E>(&self, target: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} write succeeded on attempt {}", target, attempt);
                    }
                    return Ok(value);
                },
                Err(e) if attempt >= max_attempts => {
                    warn!(
                        "{} write failed after {} attempts: {}",
                        target, max_attempts, e
                    );
                    return Err(e);
                },
                Err(e) => {
                    let delay = self.delay(attempt);
                    warn!(
                        "{} write attempt {}/{} failed: {}; retrying in {:?}",
                        target, attempt, max_attempts, e, delay
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                },
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_exponential_backoff() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(10),
            jitter: false,
        };

        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(400));
        assert_eq!(policy.delay(4), Duration::from_millis(800));
    }

    #[test]
    fn test_max_delay_limit() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(5),
            jitter: false,
        };
        assert_eq!(policy.delay(10), Duration::from_secs(5));
        assert_eq!(policy.delay(u32::MAX), Duration::from_secs(5));
    }

    #[test]
    fn test_jitter_stays_within_quarter() {
        let policy = RetryPolicy {
            initial_delay: Duration::from_millis(1000),
            jitter: true,
            ..RetryPolicy::default()
        };
        for _ in 0..50 {
            let delay = policy.delay(1);
            assert!(delay >= Duration::from_millis(750) && delay <= Duration::from_millis(1250));
        }

        let capped = RetryPolicy {
            initial_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(10),
            jitter: true,
            ..RetryPolicy::default()
        };
        for _ in 0..200 {
            let delay = capped.delay(3);
            assert!(delay <= Duration::from_secs(10));
            assert!(delay >= Duration::from_millis(7500));
        }
    }

    #[test]
    fn test_jitter_keeps_sub_millisecond_delays() {
        let policy = RetryPolicy {
            initial_delay: Duration::from_micros(800),
            jitter: true,
            ..RetryPolicy::default()
        };
        for _ in 0..50 {
            let delay = policy.delay(1);
            assert!(delay >= Duration::from_micros(600));
            assert!(delay <= Duration::from_micros(1000));
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_failures_within_budget() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(3);

        let result = policy
            .run("test", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(format!("failure {}", n))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_returns_last_error_when_exhausted() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(3);

        let result: Result<(), String> = policy
            .run("test", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Err(format!("failure {}", n))
            })
            .await;

        assert_eq!(result.unwrap_err(), "failure 3");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let calls = AtomicU32::new(0);
        let result: Result<(), &str> = RetryPolicy::immediate(0)
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("nope")
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
