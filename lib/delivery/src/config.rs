//! Delivery tuning.

use serde::Deserialize;
use std::time::Duration;

/// Limits applied to outbound delivery.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeliveryConfig {
    /// Tokens refilled per interval; also the bucket capacity.
    #[serde(default = "default_tokens_per_interval")]
    pub tokens_per_interval: u32,

    /// Refill interval in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Maximum attempts in flight at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Maximum items waiting to be attempted.
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    /// Minimum spacing between attempts to the same destination.
    #[serde(default = "default_min_recipient_interval_ms")]
    pub min_recipient_interval_ms: u64,

    /// Retries after the first failed attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff unit; the n-th retry waits `n * backoff_base_ms`.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

fn default_tokens_per_interval() -> u32 {
    5
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_concurrency() -> usize {
    3
}

fn default_max_queue_size() -> usize {
    5000
}

fn default_min_recipient_interval_ms() -> u64 {
    3000
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    2000
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            tokens_per_interval: default_tokens_per_interval(),
            interval_ms: default_interval_ms(),
            concurrency: default_concurrency(),
            max_queue_size: default_max_queue_size(),
            min_recipient_interval_ms: default_min_recipient_interval_ms(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

impl DeliveryConfig {
    /// Minimum spacing between attempts to one destination.
    #[must_use]
    pub fn min_recipient_interval(&self) -> Duration {
        Duration::from_millis(self.min_recipient_interval_ms)
    }

    /// Delay before retry number `retry` (1-based).
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        Duration::from_millis(self.backoff_base_ms.saturating_mul(u64::from(retry)))
    }
}
