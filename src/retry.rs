//! Retry with exponential backoff for transient API errors.
//!
//! Only idempotent calls go through here: platform reads and language-model
//! completions. Writes (like, repost, reply) are attempted once so a timeout
//! cannot double-post.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::{LlmError, PlatformError};

/// Errors that know whether a retry may help.
pub trait Transient: std::fmt::Display {
    fn is_transient(&self) -> bool;

    /// Server-suggested delay, if any.
    fn retry_after(&self) -> Option<Duration>;
}

impl Transient for LlmError {
    fn is_transient(&self) -> bool {
        LlmError::is_transient(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        LlmError::retry_after(self)
    }
}

impl Transient for PlatformError {
    fn is_transient(&self) -> bool {
        PlatformError::is_transient(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        PlatformError::retry_after(self)
    }
}

/// Retry settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Longest server-suggested wait we are willing to sleep through. Longer
    /// rate-limit windows fail fast and the caller picks the work up next cycle.
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_wait: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

/// Calculate exponential backoff delay with 25% jitter, capped at `max_delay`.
///
/// Formula: `base_delay * 2^attempt`, then add uniform jitter in [-25%, +25%].
/// A hard floor of 100ms prevents degenerate tight-loop retries.
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let base_ms = policy.base_delay.as_millis() as u64;
    let exp_ms = base_ms.saturating_mul(2u64.saturating_pow(attempt));
    let capped_ms = exp_ms.min(policy.max_delay.as_millis() as u64);

    let jitter_range = capped_ms / 4; // 25%
    let jitter = if jitter_range > 0 {
        let offset = rand::thread_rng().gen_range(0..=jitter_range.saturating_mul(2));
        offset as i64 - jitter_range as i64
    } else {
        0
    };
    let delay_ms = (capped_ms as i64 + jitter).max(100) as u64;
    Duration::from_millis(delay_ms)
}

/// Run `op` until it succeeds, fails permanently, or retries run out.
///
/// Honors a server-suggested `retry_after` when it fits within `max_wait`.
pub async fn with_backoff<T, E, F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T, E>
where
    E: Transient,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.is_transient() || attempt >= policy.max_retries {
            return Err(err);
        }

        let delay = match err.retry_after() {
            Some(suggested) if suggested > policy.max_wait => {
                tracing::warn!(
                    operation = what,
                    suggested_secs = suggested.as_secs(),
                    "Rate limit window too long to wait out"
                );
                return Err(err);
            }
            Some(suggested) => suggested,
            None => backoff_delay(policy, attempt),
        };

        attempt += 1;
        tracing::warn!(
            operation = what,
            attempt,
            max_retries = policy.max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Retrying after transient error"
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            max_wait: Duration::from_millis(50),
        }
    }

    fn transient() -> PlatformError {
        PlatformError::RequestFailed {
            platform: "x".to_string(),
            reason: "503".to_string(),
        }
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(4),
            max_wait: Duration::from_secs(60),
        };
        let d0 = backoff_delay(&policy, 0);
        assert!(d0 >= Duration::from_millis(750) && d0 <= Duration::from_millis(1250));
        let d5 = backoff_delay(&policy, 5);
        assert!(d5 <= Duration::from_secs(5));
        assert!(backoff_delay(&RetryPolicy { base_delay: Duration::ZERO, ..policy }, 0) >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, PlatformError> = with_backoff(&fast(), "test", || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 { Err(transient()) } else { Ok(n) }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_fail_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), PlatformError> = with_backoff(&fast(), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(PlatformError::AuthFailed {
                platform: "x".to_string(),
            })
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<(), PlatformError> = with_backoff(&fast(), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(transient())
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn long_rate_limit_windows_fail_fast() {
        let calls = AtomicU32::new(0);
        let result: Result<(), LlmError> = with_backoff(&fast(), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(LlmError::RateLimited {
                provider: "p".to_string(),
                retry_after: Some(Duration::from_secs(900)),
            })
        })
        .await;
        assert!(matches!(result, Err(LlmError::RateLimited { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
