//! Token-bucket rate limiting for outbound sends.
//!
//! The bucket holds at most `tokens_per_interval` tokens and refills
//! continuously at `tokens_per_interval / interval_ms`. It starts full, so a
//! burst of up to capacity goes out immediately.

use crate::config::DeliveryConfig;
use crate::error::RateLimitError;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::trace;

/// Tolerance for float rounding when comparing token counts.
const EPSILON: f64 = 1e-9;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// A shared token bucket.
///
/// Waiters are served in arrival order: an async gate admits one acquirer at
/// a time to the bucket, and `tokio::sync::Mutex` queues lockers fairly.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: u32,
    refill_per_ms: f64,
    bucket: Mutex<Bucket>,
    gate: tokio::sync::Mutex<()>,
}

impl RateLimiter {
    /// Creates a full bucket of `tokens_per_interval` tokens.
    #[must_use]
    pub fn new(tokens_per_interval: u32, interval: Duration) -> Self {
        let interval_ms = interval.as_secs_f64() * 1000.0;
        let refill_per_ms = if interval_ms > 0.0 {
            f64::from(tokens_per_interval) / interval_ms
        } else {
            f64::INFINITY
        };

        Self {
            capacity: tokens_per_interval,
            refill_per_ms,
            bucket: Mutex::new(Bucket {
                tokens: f64::from(tokens_per_interval),
                last_refill: Instant::now(),
            }),
            gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Creates a limiter from delivery settings.
    #[must_use]
    pub fn from_config(config: &DeliveryConfig) -> Self {
        Self::new(
            config.tokens_per_interval,
            Duration::from_millis(config.interval_ms),
        )
    }

    /// Waits until `n` tokens are available, then takes them.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError::ExceedsCapacity`] if `n` is larger than the
    /// bucket could ever hold.
    pub async fn acquire(&self, n: u32) -> Result<(), RateLimitError> {
        if n > self.capacity {
            return Err(RateLimitError::ExceedsCapacity {
                requested: n,
                capacity: self.capacity,
            });
        }
        if n == 0 {
            return Ok(());
        }

        let _turn = self.gate.lock().await;
        loop {
            let wait = match self.take(n) {
                Ok(()) => return Ok(()),
                Err(wait) => wait,
            };
            trace!(
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                "waiting for rate limit tokens"
            );
            sleep(wait).await;
        }
    }

    /// Takes `n` tokens if they are available right now.
    ///
    /// Returns false without waiting if tokens are short or other callers
    /// are already queued.
    #[must_use]
    pub fn try_acquire(&self, n: u32) -> bool {
        if n > self.capacity {
            return false;
        }
        let Ok(_turn) = self.gate.try_lock() else {
            return false;
        };
        self.take(n).is_ok()
    }

    /// Returns the tokens currently in the bucket.
    #[must_use]
    pub fn available(&self) -> f64 {
        let mut bucket = self.bucket.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut bucket);
        bucket.tokens
    }

    /// Returns the bucket capacity.
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Deducts `n` tokens, or returns how long until they will exist.
    fn take(&self, n: u32) -> Result<(), Duration> {
        let mut bucket = self.bucket.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut bucket);

        let needed = f64::from(n);
        if bucket.tokens + EPSILON >= needed {
            bucket.tokens = (bucket.tokens - needed).max(0.0);
            return Ok(());
        }

        let deficit_ms = (needed - bucket.tokens) / self.refill_per_ms;
        Err(Duration::try_from_secs_f64(deficit_ms / 1000.0).unwrap_or(Duration::MAX))
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed_ms = now.duration_since(bucket.last_refill).as_secs_f64() * 1000.0;
        let capacity = f64::from(self.capacity);
        bucket.tokens = (bucket.tokens + elapsed_ms * self.refill_per_ms).min(capacity);
        bucket.last_refill = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn starts_full_and_allows_burst() {
        let limiter = RateLimiter::new(5, Duration::from_secs(1));
        let start = Instant::now();

        for _ in 0..5 {
            limiter.acquire(1).await.unwrap();
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(!limiter.try_acquire(1));
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_refill() {
        let limiter = RateLimiter::new(5, Duration::from_secs(1));
        for _ in 0..5 {
            limiter.acquire(1).await.unwrap();
        }

        let start = Instant::now();
        limiter.acquire(1).await.unwrap();

        // One token every 200ms.
        assert!(start.elapsed() >= Duration::from_millis(199));
        assert!(start.elapsed() < Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn refill_is_capped_at_capacity() {
        let limiter = RateLimiter::new(5, Duration::from_secs(1));
        limiter.acquire(3).await.unwrap();

        tokio::time::advance(Duration::from_secs(60)).await;

        assert!((limiter.available() - 5.0).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn very_slow_refill_keeps_waiting() {
        let limiter = RateLimiter::new(1, Duration::from_millis(u64::MAX));
        limiter.acquire(1).await.unwrap();

        let waited = tokio::time::timeout(Duration::from_secs(3600), limiter.acquire(1)).await;
        assert!(waited.is_err());
        assert!(!limiter.try_acquire(1));
    }

    #[tokio::test]
    async fn rejects_requests_larger_than_capacity() {
        let limiter = RateLimiter::new(5, Duration::from_secs(1));
        let err = limiter.acquire(6).await.unwrap_err();
        assert_eq!(
            err,
            RateLimitError::ExceedsCapacity {
                requested: 6,
                capacity: 5
            }
        );
        assert!(!limiter.try_acquire(6));
    }

    #[tokio::test(start_paused = true)]
    async fn sustained_rate_is_bounded() {
        let limiter = Arc::new(RateLimiter::new(5, Duration::from_secs(1)));
        let start = Instant::now();

        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move { limiter.acquire(1).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        // 5 from the initial burst, 15 more at 5 per second.
        assert!(start.elapsed() >= Duration::from_millis(2_990));
    }

    #[tokio::test(start_paused = true)]
    async fn waiters_are_served_in_arrival_order() {
        let limiter = Arc::new(RateLimiter::new(1, Duration::from_secs(1)));
        limiter.acquire(1).await.unwrap();

        let order = Arc::new(Mutex::new(Vec::new()));
        let mut tasks = Vec::new();
        for i in 0..4 {
            let limiter = Arc::clone(&limiter);
            let order = Arc::clone(&order);
            tasks.push(tokio::spawn(async move {
                limiter.acquire(1).await.unwrap();
                order.lock().unwrap().push(i);
            }));
            // Let each waiter queue before spawning the next.
            tokio::task::yield_now().await;
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }
}
