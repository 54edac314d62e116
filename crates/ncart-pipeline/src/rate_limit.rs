//! Submission pacing.
//!
//! A minimum interval between submissions, enforced by sleeping until
//! `last + interval`. Pacing only: the pipelines submit sequentially, so
//! nothing else contends for the limiter.

use std::time::Duration;

use tokio::time::{sleep_until, Instant};

/// Enforces a minimum interval between consecutive [`wait`](Self::wait)
/// returns.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    min_interval: Duration,
    last: Option<Instant>,
}

impl RateLimiter {
    /// Limiter allowing `rate` submissions per second. `0` disables pacing.
    pub fn per_second(rate: u32) -> Self {
        let min_interval = if rate == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(1) / rate
        };
        Self {
            min_interval,
            last: None,
        }
    }

    /// Limiter that never waits.
    pub fn unpaced() -> Self {
        Self::per_second(0)
    }

    /// Interval enforced between submissions.
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Sleep until the next submission is allowed. Returns the time slept.
    pub async fn wait(&mut self) -> Duration {
        let now = Instant::now();
        let waited = match self.last {
            Some(last) => {
                let due = last + self.min_interval;
                if due > now {
                    sleep_until(due).await;
                    due - now
                } else {
                    Duration::ZERO
                }
            }
            None => Duration::ZERO,
        };
        self.last = Some(Instant::now());
        waited
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_from_rate() {
        assert_eq!(RateLimiter::per_second(25).min_interval(), Duration::from_millis(40));
        assert_eq!(RateLimiter::per_second(1).min_interval(), Duration::from_secs(1));
        assert_eq!(RateLimiter::unpaced().min_interval(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn first_wait_is_immediate() {
        let mut limiter = RateLimiter::per_second(10);
        assert_eq!(limiter.wait().await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn consecutive_waits_are_spaced() {
        let mut limiter = RateLimiter::per_second(10);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.wait().await;
        }
        assert!(start.elapsed() >= Duration::from_millis(400));
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_time_counts_toward_interval() {
        let mut limiter = RateLimiter::per_second(10);
        limiter.wait().await;
        tokio::time::sleep(Duration::from_millis(70)).await;
        let waited = limiter.wait().await;
        assert_eq!(waited, Duration::from_millis(30));
    }

    #[tokio::test(start_paused = true)]
    async fn unpaced_never_sleeps() {
        let mut limiter = RateLimiter::unpaced();
        let start = Instant::now();
        for _ in 0..100 {
            assert_eq!(limiter.wait().await, Duration::ZERO);
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
