use std::future::Future;
use std::time::Duration;

/// Exponential backoff: attempt `n` (0-based) waits `base_delay * 2^n`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self { max_retries, base_delay }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// retry budget is spent.
pub async fn with_retry<T, E, F, Fut>(
    policy: RetryPolicy,
    label: &str,
    is_retryable: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_retries && is_retryable(&e) => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    op = label,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[test]
    fn test_backoff_schedule() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_for(0), Duration::from_secs(1));
        assert_eq!(p.delay_for(1), Duration::from_secs(2));
        assert_eq!(p.delay_for(2), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_transient_failures_then_success_waits_one_then_two_seconds() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let mut seen = Vec::new();

        let result: Result<&str, String> = with_retry(
            RetryPolicy::default(),
            "test",
            |_| true,
            || {
                seen.push(start.elapsed());
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("429".to_string())
                    } else {
                        Ok("ok")
                    }
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(seen, vec![Duration::ZERO, Duration::from_secs(1), Duration::from_secs(3)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = with_retry(
            RetryPolicy::default(),
            "test",
            |e: &String| e != "fatal",
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("fatal".to_string()) }
            },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = with_retry(
            RetryPolicy::default(),
            "test",
            |_| true,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("503".to_string()) }
            },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
