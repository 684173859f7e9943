//! Bounded fixed-delay retry.
//!
//! Every directory round trip goes through [`RetryExecutor`]; nothing calls
//! the wire directly. The executor inspects the error classification to
//! decide retry/give-up; it never relies on a panic or a thrown value.

use std::time::Duration;
use tracing::debug;

use crate::error::{DirectoryError, DirectoryResult};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts (first try included).
    pub attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_millis(15_000),
        }
    }
}

/// Retry executor with a fixed delay and a bounded attempt count.
///
/// Wrapped operations must be idempotent: the executor assumes no state
/// survives between attempts.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    /// Create a new retry executor with the given configuration.
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Create a new retry executor with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(RetryConfig::default())
    }

    /// The configured attempt bound.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.config.attempts
    }

    /// Execute an operation, retrying retryable failures.
    ///
    /// An operation that keeps failing with a retryable error is invoked
    /// exactly `attempts` times; terminal errors are returned immediately.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> DirectoryResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = DirectoryResult<T>>,
    {
        let mut last_error: Option<DirectoryError> = None;

        for attempt in 1..=self.config.attempts {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if !e.is_retryable() || attempt == self.config.attempts {
                        return Err(e);
                    }

                    debug!(
                        attempt,
                        attempts = self.config.attempts,
                        delay_ms = self.config.delay.as_millis() as u64,
                        error = %e,
                        "Retrying after retryable directory error"
                    );

                    tokio::time::sleep(self.config.delay).await;
                    last_error = Some(e);
                }
            }
        }

        // Unreachable for attempts >= 1, but keep the error if we get here.
        Err(last_error.unwrap_or_else(|| DirectoryError::InvalidConfiguration {
            message: "retry executor ran zero attempts".to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fast_executor(attempts: u32) -> RetryExecutor {
        RetryExecutor::new(RetryConfig {
            attempts,
            delay: Duration::from_millis(1),
        })
    }

    #[tokio::test]
    async fn test_succeeds_first_try() {
        let executor = fast_executor(3);
        let call_count = AtomicUsize::new(0);

        let result = executor
            .execute(|| {
                call_count.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, DirectoryError>(42) }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let executor = fast_executor(3);
        let call_count = Arc::new(AtomicUsize::new(0));
        let counter = call_count.clone();

        let result = executor
            .execute(move || {
                let count = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if count < 2 {
                        Err(DirectoryError::bind("temporarily unavailable"))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_wire_failure_during_search_is_retried() {
        let executor = fast_executor(3);
        let call_count = Arc::new(AtomicUsize::new(0));
        let counter = call_count.clone();

        let result = executor
            .execute(move || {
                let count = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if count == 0 {
                        Err(DirectoryError::transport(
                            "member search failed: connection reset",
                        ))
                    } else {
                        Ok(vec!["cn=lehrer-1234567,cn=groups,ou=1234567,dc=schule-sh,dc=de"
                            .to_string()])
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap().len(), 1);
        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_always_failing_invoked_exactly_attempts_times() {
        let executor = fast_executor(3);
        let call_count = AtomicUsize::new(0);

        let result: DirectoryResult<()> = executor
            .execute(|| {
                call_count.fetch_add(1, Ordering::SeqCst);
                async { Err(DirectoryError::bind("still down")) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_terminal_error_not_retried() {
        let executor = fast_executor(3);
        let call_count = AtomicUsize::new(0);

        let result: DirectoryResult<()> = executor
            .execute(|| {
                call_count.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(DirectoryError::EmailDomain {
                        domain: "example.org".to_string(),
                    })
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_single_attempt_bound() {
        let executor = fast_executor(1);
        let call_count = AtomicUsize::new(0);

        let result: DirectoryResult<()> = executor
            .execute(|| {
                call_count.fetch_add(1, Ordering::SeqCst);
                async { Err(DirectoryError::bind("down")) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }
}
