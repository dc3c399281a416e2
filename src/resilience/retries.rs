//! Retry logic.
//!
//! # Responsibilities
//! - Execute an async operation up to a fixed number of attempts
//! - Sleep with exponential backoff + jitter between attempts
//! - Hand the last error back once the attempts are exhausted

use std::future::Future;

use crate::config::RegistryConfig;
use crate::resilience::backoff::calculate_backoff;

/// Attempt budget and delays for one operation.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl From<&RegistryConfig> for RetryPolicy {
    fn from(config: &RegistryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }
}

/// Every attempt failed; carries the last error.
#[derive(Debug)]
pub struct RetriesExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// Run `op` until it succeeds or the policy's attempts are used up.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: RetryPolicy,
    what: &str,
    mut op: F,
) -> Result<T, RetriesExhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= policy.max_attempts => {
                tracing::error!(operation = %what, attempts = attempt, error = %e, "Giving up");
                return Err(RetriesExhausted {
                    attempts: attempt,
                    last_error: e,
                });
            }
            Err(e) => {
                let delay = calculate_backoff(attempt, policy.base_delay_ms, policy.max_delay_ms);
                tracing::warn!(operation = %what, attempt, delay = ?delay, error = %e, "Retrying");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay_ms: 1,
            max_delay_ms: 5,
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = Cell::new(0);
        let result: Result<u32, _> = retry_with_backoff(policy(5), "test", || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n < 3 {
                    Err("boom")
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn reports_last_error_when_exhausted() {
        let calls = Cell::new(0);
        let result: Result<(), _> = retry_with_backoff(policy(2), "test", || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move { Err(format!("failure {}", n)) }
        })
        .await;

        let exhausted = result.unwrap_err();
        assert_eq!(exhausted.attempts, 2);
        assert_eq!(exhausted.last_error, "failure 2");
        assert_eq!(calls.get(), 2);
    }
}
