use std::future::Future;
use std::time::Duration;

use crate::error::{Result, RetrievalError};

/// Bounded retry with exponential backoff for transient upstream failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure. 0 disables retrying.
    pub attempts: u32,
    /// Delay before the first retry; doubles each attempt.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts,
            base_delay,
        }
    }

    /// A policy that never retries; useful in tests and for calls with their
    /// own fallback (reranking).
    pub fn none() -> Self {
        Self {
            attempts: 0,
            base_delay: Duration::ZERO,
        }
    }
}

/// Run `op`, retrying while it fails with a transient error and the attempt
/// budget lasts. `InvalidArgument`, `IndexNotFound`, and `UpstreamRejected`
/// surface immediately.
pub async fn with_retries<T, F, Fut>(service: &'static str, policy: RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = policy.base_delay;
    let mut remaining = policy.attempts;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && remaining > 0 => {
                tracing::warn!(
                    service,
                    remaining,
                    "transient upstream failure, retrying: {err}"
                );
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
                remaining -= 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn transient() -> RetrievalError {
        RetrievalError::unavailable("embedding", "connection refused")
    }

    #[tokio::test]
    async fn test_success_needs_single_attempt() {
        let calls = AtomicU32::new(0);
        let result = with_retries("embedding", RetryPolicy::new(3, Duration::ZERO), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, RetrievalError>(42) }
        })
        .await
        .unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_error_is_retried_until_budget_spent() {
        let calls = AtomicU32::new(0);
        let err = with_retries("embedding", RetryPolicy::new(2, Duration::ZERO), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<u32, _>(transient()) }
        })
        .await
        .unwrap_err();
        // 1 initial + 2 retries
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_recovers_mid_budget() {
        let calls = AtomicU32::new(0);
        let result = with_retries("embedding", RetryPolicy::new(3, Duration::ZERO), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(transient())
                } else {
                    Ok("ok")
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rejected_is_not_retried() {
        let calls = AtomicU32::new(0);
        let err = with_retries("reranker", RetryPolicy::new(5, Duration::ZERO), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<u32, _>(RetrievalError::rejected("reranker", "bad model")) }
        })
        .await
        .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, RetrievalError::UpstreamRejected { .. }));
    }

    #[tokio::test]
    async fn test_invalid_argument_is_not_retried() {
        let calls = AtomicU32::new(0);
        let _ = with_retries("store", RetryPolicy::new(5, Duration::ZERO), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<u32, _>(RetrievalError::InvalidArgument("empty".into())) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_none_policy_single_attempt() {
        let calls = AtomicU32::new(0);
        let _ = with_retries("reranker", RetryPolicy::none(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<u32, _>(transient()) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
