//! Bounded retry with a fixed backoff for flaky remote-driver calls.

use crate::config::TimingConfig;
use crate::{PilotError, Result};
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySpec {
    /// Total number of attempts allowed. The counter is checked before each attempt.
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetrySpec {
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    pub fn from_timing(timing: &TimingConfig) -> Self {
        Self::new(timing.max_retries, timing.retry_backoff())
    }
}

impl Default for RetrySpec {
    fn default() -> Self {
        Self::from_timing(&TimingConfig::default())
    }
}

/// Runs `op` until it succeeds, fails with a non-transient fault, or the
/// attempt ceiling is reached.
///
/// Transient faults (see [`PilotError::is_transient`]) are followed by a sleep
/// of `spec.backoff`; the ceiling check happens at the top of the loop, so a
/// ceiling of `N` executes `op` at most `N` times and then returns
/// [`PilotError::RetriesExhausted`] chained to the last fault.
pub async fn retrying<T, F, Fut>(spec: &RetrySpec, operation: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;
    let mut last_fault: Option<PilotError> = None;

    loop {
        if attempt >= spec.max_retries {
            return Err(PilotError::RetriesExhausted {
                operation: operation.to_string(),
                attempts: attempt,
                source: last_fault.map(Box::new),
            });
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() => {
                tracing::warn!(
                    operation,
                    attempt = attempt + 1,
                    max = spec.max_retries,
                    "Transient fault: {}",
                    e
                );
                tokio::time::sleep(spec.backoff).await;
                attempt += 1;
                last_fault = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn spec(max: u32) -> RetrySpec {
        RetrySpec::new(max, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let calls = AtomicU32::new(0);
        let result = retrying(&spec(2), "read", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, PilotError>(7)
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_then_success() {
        let calls = AtomicU32::new(0);
        let result = retrying(&spec(2), "click", || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(PilotError::ElementNotFound {
                    selector: "#go".into(),
                })
            } else {
                Ok("clicked")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "clicked");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exactly_ceiling_attempts() {
        for ceiling in 1..=5 {
            let calls = AtomicU32::new(0);
            let result: Result<()> = retrying(&spec(ceiling), "click", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(PilotError::Timeout("never ready".into()))
            })
            .await;

            match result {
                Err(PilotError::RetriesExhausted {
                    attempts, source, ..
                }) => {
                    assert_eq!(attempts, ceiling);
                    assert!(matches!(source.as_deref(), Some(PilotError::Timeout(_))));
                }
                other => panic!("expected RetriesExhausted, got {:?}", other),
            }
            assert_eq!(calls.load(Ordering::SeqCst), ceiling);
        }
    }

    #[tokio::test]
    async fn test_non_transient_propagates_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retrying(&spec(5), "upload", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(PilotError::Validation("bad input".into()))
        })
        .await;

        assert!(matches!(result, Err(PilotError::Validation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_ceiling_never_runs() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retrying(&spec(0), "noop", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await;

        assert!(matches!(
            result,
            Err(PilotError::RetriesExhausted { attempts: 0, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_backoff_between_attempts() {
        let calls = AtomicU32::new(0);
        let start = tokio::time::Instant::now();
        let spec = RetrySpec::new(3, Duration::from_secs(5));

        let result = retrying(&spec, "click", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(PilotError::StaleElement("node".into()))
            } else {
                Ok(())
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }
}
