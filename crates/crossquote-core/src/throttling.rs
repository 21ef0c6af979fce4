use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::{Clock, DefaultClock};
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use tracing::debug;

use crate::provider_policy::{BackoffPolicy, ProviderPolicy};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Client-side quota for one keyed provider.
#[derive(Clone)]
pub struct ThrottlingQueue {
    limiter: Arc<DirectRateLimiter>,
    clock: DefaultClock,
    retry_backoff: BackoffPolicy,
}

impl ThrottlingQueue {
    pub fn new(quota_window: Duration, quota_limit: u32, retry_backoff: BackoffPolicy) -> Self {
        let clock = DefaultClock::default();
        let quota = quota_from_window(quota_window, quota_limit);
        Self {
            limiter: Arc::new(RateLimiter::direct_with_clock(quota, &clock)),
            clock,
            retry_backoff,
        }
    }

    pub fn from_policy(policy: &ProviderPolicy) -> Self {
        Self::new(
            policy.quota_window,
            policy.quota_limit,
            policy.retry_backoff.clone(),
        )
    }

    /// Takes one cell of budget, or returns how long until one frees up.
    pub fn acquire(&self) -> Result<(), Duration> {
        self.limiter
            .check()
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }

    /// Retries [`acquire`](Self::acquire) with backoff sleeps. Gives up after
    /// `max_retries` and returns the last wait the limiter asked for.
    pub async fn acquire_with_backoff(&self) -> Result<(), Duration> {
        let mut retry_count = 0;
        loop {
            let wait = match self.acquire() {
                Ok(()) => return Ok(()),
                Err(wait) => wait,
            };
            let Some(delay) = self.retry_delay(retry_count) else {
                return Err(wait);
            };
            debug!(retry_count, delay_ms = delay.as_millis() as u64, "quota exhausted, backing off");
            tokio::time::sleep(delay).await;
            retry_count += 1;
        }
    }

    pub fn retry_delay(&self, retry_count: u32) -> Option<Duration> {
        if retry_count >= self.retry_backoff.max_retries {
            return None;
        }

        let scale = self.retry_backoff.multiplier.powf(f64::from(retry_count));
        let seconds = self.retry_backoff.initial_delay.as_secs_f64() * scale;
        let capped_seconds = seconds.min(self.retry_backoff.max_delay.as_secs_f64());
        Some(Duration::from_secs_f64(capped_seconds))
    }
}

fn quota_from_window(quota_window: Duration, quota_limit: u32) -> Quota {
    let burst = NonZeroU32::new(quota_limit).unwrap_or(NonZeroU32::MIN);
    let per_cell = quota_window
        .checked_div(burst.get())
        .unwrap_or(quota_window)
        .max(Duration::from_millis(1));

    Quota::with_period(per_cell)
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backoff(max_retries: u32) -> BackoffPolicy {
        BackoffPolicy {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(25),
            multiplier: 2.0,
            max_retries,
        }
    }

    #[test]
    fn refuses_once_burst_is_spent() {
        let queue = ThrottlingQueue::new(Duration::from_secs(60), 2, backoff(1));

        assert!(queue.acquire().is_ok());
        assert!(queue.acquire().is_ok());

        let wait = queue.acquire().expect_err("third call is over quota");
        assert!(wait > Duration::from_secs(1));
        assert!(wait <= Duration::from_secs(30));
    }

    #[test]
    fn retry_backoff_is_exponential_and_capped() {
        let queue = ThrottlingQueue::new(Duration::from_secs(60), 1, backoff(3));

        assert_eq!(queue.retry_delay(0), Some(Duration::from_millis(10)));
        assert_eq!(queue.retry_delay(1), Some(Duration::from_millis(20)));
        assert_eq!(queue.retry_delay(2), Some(Duration::from_millis(25)));
        assert_eq!(queue.retry_delay(3), None);
    }

    #[tokio::test]
    async fn backoff_gives_up_when_window_is_long() {
        let queue = ThrottlingQueue::new(Duration::from_secs(3_600), 1, backoff(2));
        queue.acquire().expect("first call fits");

        let wait = queue.acquire_with_backoff().await.expect_err("no budget for an hour");

        assert!(wait > Duration::from_secs(60));
    }
}
