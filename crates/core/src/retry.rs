//! Retry with exponential backoff and jitter
//!
//! Used by the lister to ride out transient page-fetch failures. Policy
//! errors (read-only rejections, cancellation) are never retried.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};

use crate::config::RetryConfig;
use crate::error::{Error, Result};

/// Retry a fallible async operation with exponential backoff
///
/// # Example
/// ```ignore
/// let page = retry_with_backoff(
///     &config,
///     || async { store.list_objects_page(&request).await },
///     is_retryable_error,
/// ).await?;
/// ```
pub async fn retry_with_backoff<T, F, Fut, R>(
    config: &RetryConfig,
    mut operation: F,
    is_retryable: R,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
    R: Fn(&Error) -> bool,
{
    let mut jitter = StdRng::seed_from_u64(config.seed);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if attempt >= config.max_attempts || !is_retryable(&e) {
                    return Err(e);
                }

                let backoff = calculate_backoff(config, attempt, &mut jitter);
                tracing::debug!(
                    attempt = attempt,
                    backoff_ms = backoff.as_millis(),
                    error = %e,
                    "Retrying after transient error"
                );

                tokio::time::sleep(backoff).await;
            }
        }
    }
}

/// Calculate backoff duration with jitter
fn calculate_backoff(config: &RetryConfig, attempt: u32, jitter: &mut StdRng) -> Duration {
    // initial * 2^(attempt-1), capped
    let base_ms = config.initial_backoff_ms * (1u64 << (attempt - 1).min(10));
    let capped_ms = base_ms.min(config.max_backoff_ms);

    let extra_ms = if capped_ms == 0 {
        0
    } else {
        jitter.random_range(0..capped_ms)
    };
    Duration::from_millis(capped_ms + extra_ms)
}

/// HTTP statuses a store uses for overload and transient server faults
const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Check if an error is transient and worth another attempt
pub fn is_retryable_error(error: &Error) -> bool {
    match error {
        Error::Network(_) => true,
        Error::Service { status, .. } => RETRYABLE_STATUSES.contains(status),
        Error::Io(e) => matches!(
            e.kind(),
            std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::TimedOut
                | std::io::ErrorKind::Interrupted
        ),
        // Local policy decisions and configuration problems are final
        _ => false,
    }
}

/// Retry configuration builder
#[derive(Debug, Clone)]
pub struct RetryBuilder {
    config: RetryConfig,
}

impl RetryBuilder {
    pub fn new() -> Self {
        Self {
            config: RetryConfig::default(),
        }
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n.max(1);
        self
    }

    pub fn initial_backoff_ms(mut self, ms: u64) -> Self {
        self.config.initial_backoff_ms = ms;
        self
    }

    pub fn max_backoff_ms(mut self, ms: u64) -> Self {
        self.config.max_backoff_ms = ms;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn build(self) -> RetryConfig {
        self.config
    }
}

impl Default for RetryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryBuilder::new()
            .max_attempts(max_attempts)
            .initial_backoff_ms(1)
            .max_backoff_ms(10)
            .seed(7)
            .build()
    }

    #[test]
    fn test_calculate_backoff() {
        let config = RetryBuilder::new()
            .initial_backoff_ms(100)
            .max_backoff_ms(10_000)
            .build();
        let mut jitter = StdRng::seed_from_u64(42);

        let b1 = calculate_backoff(&config, 1, &mut jitter);
        assert!(b1.as_millis() >= 100 && b1.as_millis() < 200);

        let b2 = calculate_backoff(&config, 2, &mut jitter);
        assert!(b2.as_millis() >= 200 && b2.as_millis() < 400);

        let b3 = calculate_backoff(&config, 3, &mut jitter);
        assert!(b3.as_millis() >= 400 && b3.as_millis() < 800);
    }

    #[test]
    fn test_backoff_cap() {
        let config = RetryBuilder::new()
            .max_attempts(10)
            .initial_backoff_ms(1000)
            .max_backoff_ms(5000)
            .build();
        let mut jitter = StdRng::seed_from_u64(1);

        let b = calculate_backoff(&config, 10, &mut jitter);
        assert!(b.as_millis() < 10_000);
    }

    #[test]
    fn test_jitter_is_reproducible_per_seed() {
        let config = RetryBuilder::new()
            .initial_backoff_ms(1000)
            .max_backoff_ms(60_000)
            .build();
        let schedule = |seed: u64| {
            let mut jitter = StdRng::seed_from_u64(seed);
            (1..=6)
                .map(|attempt| calculate_backoff(&config, attempt, &mut jitter))
                .collect::<Vec<_>>()
        };

        assert_eq!(schedule(99), schedule(99));
        assert_ne!(schedule(99), schedule(100));
    }

    #[test]
    fn test_zero_backoff_has_no_jitter() {
        let config = RetryBuilder::new()
            .initial_backoff_ms(0)
            .max_backoff_ms(0)
            .build();
        let mut jitter = StdRng::seed_from_u64(5);
        assert_eq!(calculate_backoff(&config, 3, &mut jitter), Duration::ZERO);
    }

    #[test]
    fn test_is_retryable_error() {
        assert!(is_retryable_error(&Error::Network(
            "connection timeout".to_string()
        )));
        assert!(is_retryable_error(&Error::Service {
            status: 503,
            message: "list objects: SlowDown Please reduce your request rate".to_string()
        }));
        assert!(is_retryable_error(&Error::Service {
            status: 429,
            message: "list objects: TooManyRequests".to_string()
        }));
        assert!(!is_retryable_error(&Error::Auth("access denied".to_string())));
        assert!(!is_retryable_error(&Error::NotFound("key".to_string())));
        assert!(!is_retryable_error(&Error::ReadOnly {
            method: "PUT".to_string()
        }));
        assert!(!is_retryable_error(&Error::Cancelled));
    }

    #[test]
    fn test_status_decides_not_message_text() {
        // server text mentioning a 5xx code is not enough
        assert!(!is_retryable_error(&Error::Service {
            status: 400,
            message: "list objects: InvalidArgument max-keys 500 exceeds limit".to_string()
        }));
        assert!(!is_retryable_error(&Error::Storage(
            "503 Service Unavailable".to_string()
        )));
    }

    #[tokio::test]
    async fn test_retry_success_after_failure() {
        let config = fast_config(3);
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result = retry_with_backoff(
            &config,
            || {
                let cc = calls_clone.clone();
                async move {
                    if cc.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(Error::Network("timeout".to_string()))
                    } else {
                        Ok(42)
                    }
                }
            },
            is_retryable_error,
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausted() {
        let config = fast_config(2);
        let mut calls = 0;

        let result: Result<()> = retry_with_backoff(
            &config,
            || {
                calls += 1;
                async { Err(Error::Network("timeout".to_string())) }
            },
            is_retryable_error,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn test_retry_non_retryable() {
        let config = fast_config(3);
        let mut calls = 0;

        let result: Result<()> = retry_with_backoff(
            &config,
            || {
                calls += 1;
                async { Err(Error::NotFound("not found".to_string())) }
            },
            is_retryable_error,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
