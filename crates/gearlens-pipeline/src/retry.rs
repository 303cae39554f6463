//! Retry helper for oracle batches.
//!
//! An entirely empty batch from a recognition oracle usually means transient
//! rate limiting, so those are retried a few times with a fixed delay. An
//! error degrades the batch to an empty result immediately; a failed batch
//! never fails the run.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::PipelineResult;

/// Configuration for the empty-batch retry loop.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
    /// Operation name for logging.
    pub operation_name: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_millis(500),
            operation_name: "oracle batch".to_string(),
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with the given operation name.
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            ..Default::default()
        }
    }

    /// Set the number of retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the delay between attempts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Run an oracle batch, retrying when it comes back empty.
///
/// Returns the first non-empty result, or an empty vec once retries are
/// exhausted. Errors are logged and degrade to empty without retrying.
pub async fn retry_non_empty<F, Fut, T>(config: &RetryConfig, operation: F) -> Vec<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = PipelineResult<Vec<T>>>,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(items) if !items.is_empty() => return items,
            Ok(_) if attempt < config.max_retries => {
                attempt += 1;
                debug!(
                    "{} returned empty, retry {} of {}",
                    config.operation_name, attempt, config.max_retries
                );
                tokio::time::sleep(config.delay).await;
            }
            Ok(_) => {
                debug!(
                    "{} still empty after {} retries",
                    config.operation_name, config.max_retries
                );
                return Vec::new();
            }
            Err(e) => {
                warn!("{} failed, degrading to empty: {}", config.operation_name, e);
                return Vec::new();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config() -> RetryConfig {
        RetryConfig::new("test").with_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn non_empty_returns_immediately() {
        let calls = AtomicU32::new(0);
        let result = retry_non_empty(&fast_config(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(vec![1, 2, 3]) }
        })
        .await;
        assert_eq!(result, vec![1, 2, 3]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_is_retried_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = retry_non_empty(&fast_config(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Ok(Vec::<u32>::new())
                } else {
                    Ok(vec![7])
                }
            }
        })
        .await;
        assert_eq!(result, vec![7]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn empty_exhausts_retries() {
        let calls = AtomicU32::new(0);
        let result: Vec<u32> = retry_non_empty(&fast_config(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(Vec::new()) }
        })
        .await;
        assert!(result.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn errors_do_not_retry() {
        let calls = AtomicU32::new(0);
        let result: Vec<u32> = retry_non_empty(&fast_config(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(PipelineError::oracle_failed("rate limited")) }
        })
        .await;
        assert!(result.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
