//! Outbound delivery for satu.
//!
//! This crate provides:
//!
//! - **Rate limiting**: a token bucket shared by every outbound attempt
//! - **Delivery queue**: bounded, paced, concurrency-limited sends with retry
//! - **Metrics**: counters and gauges describing the session
//!
//! The queue sends through a [`MessageSender`], which the session manager
//! implements over its live connection.

pub mod config;
pub mod error;
pub mod metrics;
pub mod queue;
pub mod rate_limit;
pub mod sender;

pub use config::DeliveryConfig;
pub use error::{DeliveryError, RateLimitError, SendError};
pub use metrics::{MetricsCollector, SessionMetrics};
pub use queue::{DeliveryHandle, DeliveryQueue, DeliveryReceipt};
pub use rate_limit::RateLimiter;
pub use sender::MessageSender;
