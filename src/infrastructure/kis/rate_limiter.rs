use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Sliding-window limiter: no more than `max_requests` acquisitions in any
/// `window`-long interval.
///
/// Acquisition holds the lock while waiting, so callers are served one at a time
/// in arrival order.
pub struct SlidingWindowLimiter {
    max_requests: usize,
    window: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            timestamps: Mutex::new(VecDeque::with_capacity(max_requests.max(1))),
        }
    }

    pub async fn acquire(&self) {
        let mut timestamps = self.timestamps.lock().await;
        loop {
            let now = Instant::now();
            while let Some(front) = timestamps.front() {
                if now.duration_since(*front) >= self.window {
                    timestamps.pop_front();
                } else {
                    break;
                }
            }
            if timestamps.len() < self.max_requests {
                timestamps.push_back(now);
                return;
            }
            if let Some(oldest) = timestamps.front() {
                let wait = self.window.saturating_sub(now.duration_since(*oldest));
                tracing::debug!(wait_ms = wait.as_millis() as u64, "Rate limit reached, waiting");
                tokio::time::sleep(wait).await;
            }
        }
    }

    /// Acquisitions currently inside the window.
    pub async fn in_flight(&self) -> usize {
        let timestamps = self.timestamps.lock().await;
        let now = Instant::now();
        timestamps
            .iter()
            .filter(|t| now.duration_since(**t) < self.window)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_window_never_exceeds_quota() {
        let limiter = Arc::new(SlidingWindowLimiter::new(20, Duration::from_secs(1)));
        let start = Instant::now();

        let handles: Vec<_> = (0..1000)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    limiter.acquire().await;
                    Instant::now()
                })
            })
            .collect();

        let mut times = Vec::with_capacity(1000);
        for h in handles {
            times.push(h.await.unwrap());
        }
        times.sort();

        for (i, t) in times.iter().enumerate() {
            let in_window = times[i..]
                .iter()
                .take_while(|u| u.duration_since(*t) < Duration::from_secs(1))
                .count();
            assert!(in_window <= 20, "{in_window} acquisitions inside one window");
        }
        // 1000 / 20 per second: the last batch starts at 49 s.
        assert!(times[999].duration_since(start) >= Duration::from_secs(49));
    }

    #[tokio::test(start_paused = true)]
    async fn test_under_quota_does_not_wait() {
        let limiter = SlidingWindowLimiter::new(5, Duration::from_secs(1));
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire().await;
        }
        assert_eq!(Instant::now(), start);
        assert_eq!(limiter.in_flight().await, 5);
    }
}
