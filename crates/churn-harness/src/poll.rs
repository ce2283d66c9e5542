//! Bounded retry for eventually-consistent cluster state.
//!
//! Every step that depends on external convergence (a replacement pod
//! appearing, a daemon coming back up) goes through [`retry_until_success`]
//! rather than sleeping ad hoc. The action's declared failure signal is the
//! only thing treated as retryable; programming errors (panics) propagate
//! unchanged.

use crate::error::{HarnessError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Attempt budget for a retried action: up to `max_attempts` invocations
/// with a fixed `interval` sleep between them.
///
/// Worst-case wall-clock cost is `(max_attempts - 1) * interval` plus the
/// action runtime, so callers size budgets to the convergence they wait on.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of invocations (must be at least 1).
    pub max_attempts: u32,
    /// Fixed pause between consecutive attempts.
    pub interval: Duration,
}

impl RetryPolicy {
    /// Build a policy from an attempt count and interval.
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }
}

impl Default for RetryPolicy {
    /// The readiness-check reference budget: 10 attempts, 1 second apart.
    fn default() -> Self {
        Self::new(10, Duration::from_secs(1))
    }
}

/// Invoke `action` until it succeeds or the budget is exhausted.
///
/// Returns the first `Ok` value. After the final failed attempt, returns
/// [`HarnessError::RetryExhausted`] carrying the attempt count and the last
/// underlying error; intermediate failures are logged at debug level and
/// never silently swallowed past the budget.
pub async fn retry_until_success<T, F, Fut>(policy: RetryPolicy, mut action: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match action().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                tracing::debug!(
                    target: "churn.poll",
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "attempt failed"
                );

                if attempt >= policy.max_attempts {
                    return Err(HarnessError::RetryExhausted {
                        attempts: attempt,
                        last_error: Box::new(e),
                    });
                }
            }
        }

        sleep(policy.interval).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_succeeds_on_first_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result = retry_until_success(fast_policy(10), move || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(42u32)
            }
        })
        .await;

        assert_eq!(result.expect("first attempt should succeed"), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_succeeds_exactly_on_final_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result = retry_until_success(fast_policy(5), move || {
            let calls = calls_clone.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n == 5 {
                    Ok("converged")
                } else {
                    Err(HarnessError::InstanceNotFound {
                        node_ip: "172.18.0.3".to_string(),
                    })
                }
            }
        })
        .await;

        assert_eq!(result.expect("final attempt should succeed"), "converged");
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_attempt_count_and_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: Result<()> = retry_until_success(fast_policy(3), move || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(HarnessError::InstanceNotFound {
                    node_ip: "172.18.0.3".to_string(),
                })
            }
        })
        .await;

        let err = result.expect_err("budget must be exhausted");
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        match err {
            HarnessError::RetryExhausted {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 3);
                assert!(matches!(
                    *last_error,
                    HarnessError::InstanceNotFound { .. }
                ));
            }
            other => panic!("expected RetryExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_single_attempt_budget_does_not_sleep() {
        let started = std::time::Instant::now();

        let result: Result<()> = retry_until_success(
            RetryPolicy::new(1, Duration::from_secs(30)),
            || async {
                Err(HarnessError::InstanceNotFound {
                    node_ip: "10.0.0.1".to_string(),
                })
            },
        )
        .await;

        assert!(result.is_err());
        // One attempt means no inter-attempt sleep; the 30s interval must
        // not be paid.
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_zero_attempts_is_clamped_to_one() {
        let policy = RetryPolicy::new(0, Duration::from_secs(1));
        assert_eq!(policy.max_attempts, 1);
    }
}
