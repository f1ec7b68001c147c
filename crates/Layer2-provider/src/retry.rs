//! Retry logic with exponential backoff

use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,

    /// Delay after the first failed attempt (milliseconds)
    pub initial_delay_ms: u64,

    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,

    /// Maximum delay between attempts (milliseconds)
    pub max_delay_ms: u64,

    /// Whether to add jitter to prevent thundering herd
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            backoff_multiplier: 2.0,
            max_delay_ms: 30000,
            jitter: false,
        }
    }
}

impl RetryConfig {
    /// Delay to wait after failed attempt `attempt` (1-indexed):
    /// `initial * multiplier^(attempt-1)`, capped at `max_delay_ms`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let base_delay = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);

        let capped_delay = base_delay.min(self.max_delay_ms as f64);

        let final_delay = if self.jitter {
            // 20% jitter (0.8 to 1.2)
            let jitter_factor = 0.8 + rand_jitter() * 0.4;
            (capped_delay * jitter_factor).min(self.max_delay_ms as f64)
        } else {
            capped_delay
        };

        Duration::from_millis(final_delay as u64)
    }
}

/// Simple pseudo-random jitter (0.0 to 1.0)
fn rand_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}

/// Error classification for retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClassification {
    /// Should retry (transient error)
    Retry,

    /// Should not retry (permanent error)
    NoRetry,

    /// Rate limited - use provided delay if available
    RateLimited { retry_after_ms: Option<u64> },
}

/// Trait for errors that can be classified for retry
pub trait RetryableError {
    fn classify(&self) -> RetryClassification;
}

/// The error that ended a retry loop, with the number of attempts made
#[derive(Debug, Clone, PartialEq)]
pub struct RetryFailure<E> {
    pub attempts: u32,
    pub error: E,
}

/// Execute an async operation with retry logic
///
/// The closure receives the 1-indexed attempt number.
pub async fn with_retry<T, E, F, Fut>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, RetryFailure<E>>
where
    E: RetryableError + std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(operation = operation_name, attempt, "Succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) => {
                let classification = e.classify();

                match classification {
                    RetryClassification::NoRetry => {
                        warn!(
                            operation = operation_name,
                            attempt,
                            error = %e,
                            "Non-retryable error"
                        );
                        return Err(RetryFailure { attempts: attempt, error: e });
                    }
                    RetryClassification::Retry | RetryClassification::RateLimited { .. } => {
                        if attempt >= max_attempts {
                            warn!(
                                operation = operation_name,
                                attempts = attempt,
                                error = %e,
                                "Retries exhausted"
                            );
                            return Err(RetryFailure { attempts: attempt, error: e });
                        }

                        let delay = match classification {
                            RetryClassification::RateLimited {
                                retry_after_ms: Some(ms),
                            } => Duration::from_millis(ms.min(config.max_delay_ms)),
                            _ => config.delay_for_attempt(attempt),
                        };

                        warn!(
                            operation = operation_name,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Attempt failed, retrying"
                        );

                        sleep(delay).await;
                        attempt += 1;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    #[derive(Debug)]
    struct TestError(bool);

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "test error (retryable: {})", self.0)
        }
    }

    impl RetryableError for TestError {
        fn classify(&self) -> RetryClassification {
            if self.0 {
                RetryClassification::Retry
            } else {
                RetryClassification::NoRetry
            }
        }
    }

    #[test]
    fn test_delay_calculation() {
        let config = RetryConfig {
            initial_delay_ms: 1000,
            backoff_multiplier: 2.0,
            max_delay_ms: 30000,
            jitter: false,
            ..Default::default()
        };

        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(2000));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(4000));
        assert_eq!(config.delay_for_attempt(10), Duration::from_millis(30000)); // capped
    }

    #[tokio::test(start_paused = true)]
    async fn test_fails_twice_then_succeeds() {
        let config = RetryConfig::default();
        let calls: Arc<Mutex<Vec<Instant>>> = Arc::new(Mutex::new(Vec::new()));

        let recorded = calls.clone();
        let result = with_retry(&config, "test", |attempt| {
            recorded.lock().unwrap().push(Instant::now());
            async move {
                if attempt < 3 {
                    Err(TestError(true))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        let first_gap = calls[1] - calls[0];
        let second_gap = calls[2] - calls[1];
        assert!(second_gap >= first_gap);
        assert_eq!(first_gap, Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_stops_immediately() {
        let config = RetryConfig::default();
        let mut calls = 0;

        let result: Result<(), _> = with_retry(&config, "test", |_| {
            calls += 1;
            async { Err(TestError(false)) }
        })
        .await;

        let failure = result.unwrap_err();
        assert_eq!(failure.attempts, 1);
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_max_attempts() {
        let config = RetryConfig {
            max_attempts: 4,
            ..Default::default()
        };

        let result: Result<(), _> =
            with_retry(&config, "test", |_| async { Err(TestError(true)) }).await;

        assert_eq!(result.unwrap_err().attempts, 4);
    }
}
