//! Exponential backoff for remote calls

use crate::config::EngineConfig;
use crate::error::RemoteError;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.retry_base_delay_ms),
        )
    }

    /// Wait after failed attempt `attempt` (0-indexed): `base * 2^attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1000))
    }
}

/// Run `operation` until it succeeds or fails in a way retrying cannot fix.
///
/// Authentication, authorization and certificate failures return at once. Connection,
/// timeout, DNS and 5xx failures are retried; once attempts run out the last error is
/// reported as a network failure. Anything else returns unchanged after the first failure.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, RemoteError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RemoteError>>,
{
    let mut attempt = 0;
    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if err.is_fatal() || !err.is_retryable() {
            return Err(err);
        }

        if attempt + 1 >= policy.max_attempts {
            tracing::warn!(
                "{} failed after {} attempts: {}",
                operation_name,
                policy.max_attempts,
                err
            );
            return Err(RemoteError::Network {
                message: format!(
                    "{} failed after {} attempts ({})",
                    operation_name, policy.max_attempts, err
                ),
            });
        }

        let delay = policy.delay_for(attempt);
        tracing::warn!(
            "{} failed (attempt {}/{}), retrying in {:?}: {}",
            operation_name,
            attempt + 1,
            policy.max_attempts,
            delay,
            err
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1))
    }

    #[test]
    fn test_delay_doubles() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1000));
        assert_eq!(policy.delay_for(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(4000));
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = with_retry(&fast_policy(), "upload", || async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(RemoteError::Timeout {
                    message: "slow".into(),
                })
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_report_network_failure() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> = with_retry(&fast_policy(), "upload", || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(RemoteError::Server {
                status: 503,
                message: "unavailable".into(),
            })
        })
        .await;

        assert!(matches!(result, Err(RemoteError::Network { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_auth_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> = with_retry(&fast_policy(), "upload", || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(RemoteError::Unauthorized)
        })
        .await;

        assert_eq!(result.unwrap_err(), RemoteError::Unauthorized);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unclassified_errors_keep_original_message() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> = with_retry(&fast_policy(), "upload", || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(RemoteError::Api {
                status: 422,
                message: "unprocessable".into(),
            })
        })
        .await;

        assert_eq!(
            result.unwrap_err(),
            RemoteError::Api {
                status: 422,
                message: "unprocessable".into()
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
