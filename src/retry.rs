//! Retry with growing delay for remote API calls.

use crate::error::{RagError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

const MAX_DELAY: Duration = Duration::from_secs(10);

/// How many times to try a request and how long to wait in between.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero behaves like one.
    pub max_attempts: u32,
    /// Delay after the first failure; grows 1.5x per attempt, capped at 10s.
    pub initial_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_secs(1),
        }
    }

    /// Waits between attempts: `initial_delay`, then 1.5x the previous one,
    /// never more than 10s.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        std::iter::successors(Some(self.initial_delay.min(MAX_DELAY)), |delay| {
            Some(Duration::from_millis((delay.as_millis() as f64 * 1.5) as u64).min(MAX_DELAY))
        })
    }

    /// Run `op` until it succeeds, returns a non-retryable error, or the
    /// attempts run out. The last error is returned.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut delays = self.delays();
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts && e.is_retryable() => {
                    let delay = delays.next().unwrap_or(MAX_DELAY);
                    warn!(
                        request = what,
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        "request failed, retrying in {:?}",
                        delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl RagError {
    /// Transport failures, rate limits and server errors are worth another
    /// attempt; client errors, malformed responses and local errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            RagError::Http(_) => true,
            RagError::ApiStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = policy(3)
            .run("test", || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(RagError::Http("connection reset".to_string()))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = policy(2)
            .run("test", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RagError::ApiStatus {
                    status: 503,
                    message: "unavailable".to_string(),
                })
            })
            .await;

        assert!(matches!(result, Err(RagError::ApiStatus { status: 503, .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_parse_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = tokio_test::block_on(policy(5).run("test", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(RagError::LlmParse("bad json".to_string()))
        }));

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_client_errors_are_not_retried() {
        for status in [400, 401, 404] {
            let counter = AtomicU32::new(0);
            let calls = &counter;
            let result: Result<()> = tokio_test::block_on(policy(5).run("test", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RagError::ApiStatus {
                    status,
                    message: "invalid api key".to_string(),
                })
            }));

            assert!(result.is_err());
            assert_eq!(counter.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn test_retryable_statuses() {
        let status = |status| RagError::ApiStatus {
            status,
            message: String::new(),
        };
        assert!(status(429).is_retryable());
        assert!(status(500).is_retryable());
        assert!(status(503).is_retryable());
        assert!(!status(401).is_retryable());
        assert!(RagError::Http("timeout".to_string()).is_retryable());
        assert!(!RagError::LlmApi("No choices in response".to_string()).is_retryable());
    }

    #[test]
    fn test_delay_grows_and_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 20,
            initial_delay: Duration::from_secs(4),
        };
        let delays = policy.delays().take(4).collect::<Vec<_>>();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(4),
                Duration::from_secs(6),
                Duration::from_secs(9),
                Duration::from_secs(10),
            ]
        );
    }
}
