use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::{Config, RETRY_BACKOFF_FACTOR};
use crate::error::{ErrorKind, Result};

/// Retry with exponential backoff. A rate-limit failure that declares `retry_after`
/// sleeps for that long instead of the current delay.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub backoff_factor: f64,
    pub retryable: HashSet<ErrorKind>,
}

impl RetryPolicy {
    /// Provider-call policy: collector, rate-limit and transport failures are retried.
    pub fn for_collectors(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            backoff_factor: RETRY_BACKOFF_FACTOR,
            retryable: [ErrorKind::Collector, ErrorKind::RateLimit, ErrorKind::Transport]
                .into_iter()
                .collect(),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::for_collectors(cfg.max_retries, cfg.retry_delay())
    }

    pub fn is_retryable(&self, kind: ErrorKind) -> bool {
        self.retryable.contains(&kind)
    }

    /// Runs `op` until it succeeds, fails with a non-retryable kind, or attempts run out.
    /// The last failure is returned unchanged.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut delay = self.delay;
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < max_attempts && self.is_retryable(e.kind()) => {
                    let pause = e.retry_after().map(Duration::from_secs).unwrap_or(delay);
                    warn!(
                        op = label,
                        attempt,
                        max_attempts,
                        retry_in_ms = pause.as_millis() as u64,
                        "retrying after error: {e}"
                    );
                    tokio::time::sleep(pause).await;
                    delay = delay.mul_f64(self.backoff_factor);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn policy() -> RetryPolicy {
        RetryPolicy::for_collectors(3, Duration::from_secs(1))
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_two_transient_failures() {
        let calls = &AtomicU32::new(0);
        let start = Instant::now();
        let result = policy()
            .run("test", move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(AppError::Collector(format!("boom {n}")))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1s then 2s
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn authentication_failure_is_not_retried() {
        let calls = &AtomicU32::new(0);
        let result: Result<()> = policy()
            .run("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AppError::Authentication("bad key".to_string()))
            })
            .await;

        assert!(matches!(result, Err(AppError::Authentication(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_returns_last_error() {
        let calls = &AtomicU32::new(0);
        let result: Result<()> = policy()
            .run("test", move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Err(AppError::Collector(format!("failure {n}")))
            })
            .await;

        match result {
            Err(AppError::Collector(msg)) => assert_eq!(msg, "failure 2"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_hint_overrides_delay() {
        let calls = &AtomicU32::new(0);
        let start = Instant::now();
        let result = policy()
            .run("test", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(AppError::RateLimit {
                        message: "slow down".to_string(),
                        retry_after: Some(7),
                    })
                } else {
                    Ok(())
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(start.elapsed(), Duration::from_secs(7));
    }
}
