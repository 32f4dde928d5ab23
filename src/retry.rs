//! Bounded retry with exponential backoff
//!
//! [`retry`] keeps calling an async operation until it succeeds, fails with
//! an error that retrying cannot fix, or runs out of attempts.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::error::DiscoveryError;

/// Default number of attempts for metadata and discovery calls.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

const INITIAL_BACKOFF: Duration = Duration::from_millis(1500);
const BACKOFF_MULTIPLIER: f64 = 1.5;
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Errors that know whether they are worth retrying.
pub trait Retryable: Display {
    fn is_retryable(&self) -> bool {
        true
    }
}

impl Retryable for DiscoveryError {
    fn is_retryable(&self) -> bool {
        DiscoveryError::is_retryable(self)
    }
}

/// Attempt limit and backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total tries, including the first one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: INITIAL_BACKOFF,
            multiplier: BACKOFF_MULTIPLIER,
            max_backoff: MAX_BACKOFF,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Policy that retries without sleeping. Used in tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::ZERO,
            multiplier: 1.0,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay before the retry that follows failed attempt `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(64) as i32;
        let millis = self.initial_backoff.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = millis.min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

fn contains_any(message: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| message.contains(keyword))
}

/// Run `operation` until it succeeds or the policy gives up.
///
/// An error that is not retryable, or whose message contains one of
/// `non_retryable` (case-sensitive), is returned right away. Otherwise the
/// operation is tried at most `policy.max_attempts` times and the last error
/// is returned unchanged.
pub async fn retry<T, E, F, Fut>(
    mut operation: F,
    policy: &RetryPolicy,
    non_retryable: &[&str],
) -> Result<T, E>
where
    E: Retryable,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let message = err.to_string();
                if !err.is_retryable() || contains_any(&message, non_retryable) {
                    tracing::debug!("Not retrying: {}", message);
                    return Err(err);
                }
                if attempt >= max_attempts {
                    tracing::warn!("Giving up after {} attempts: {}", attempt, message);
                    return Err(err);
                }
                let delay = policy.backoff(attempt);
                tracing::warn!(
                    "Attempt {}/{} failed: {}. Retrying in {}ms",
                    attempt,
                    max_attempts,
                    message,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct TestError(&'static str, bool);

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.0)
        }
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            self.1
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, TestError> = retry(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(7)
            },
            &RetryPolicy::immediate(10),
            &[],
        )
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = AtomicU32::new(0);
        let result: Result<&str, TestError> = retry(
            || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 3 {
                    Err(TestError("connection reset", true))
                } else {
                    Ok("done")
                }
            },
            &RetryPolicy::immediate(10),
            &[],
        )
        .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_exhausts_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), TestError> = retry(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError("connection reset", true))
            },
            &RetryPolicy::immediate(5),
            &["Project could not be retrieved"],
        )
        .await;
        assert_eq!(result.unwrap_err().0, "connection reset");
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_keyword_stops_after_one_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<(), TestError> = retry(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError("Private key json file not found: /k.json", true))
            },
            &RetryPolicy::immediate(10),
            &["Private key json file not found"],
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_keyword_match_is_case_sensitive() {
        let calls = AtomicU32::new(0);
        let _: Result<(), TestError> = retry(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError("private key json file not found", true))
            },
            &RetryPolicy::immediate(3),
            &["Private key json file not found"],
        )
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_error_not_retried() {
        let calls = AtomicU32::new(0);
        let _: Result<(), TestError> = retry(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError("bad json", false))
            },
            &RetryPolicy::immediate(10),
            &[],
        )
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_is_bounded_and_monotonic() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(1500));
        assert_eq!(policy.backoff(2), Duration::from_millis(2250));

        let mut previous = Duration::ZERO;
        for attempt in 1..=DEFAULT_MAX_ATTEMPTS * 4 {
            let delay = policy.backoff(attempt);
            assert!(delay >= previous);
            assert!(delay <= MAX_BACKOFF);
            previous = delay;
        }
    }
}
