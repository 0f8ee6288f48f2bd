//! Session metrics.

use satu_core::ConnectionStatus;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// A point-in-time view of the session counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionMetrics {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub errors: u64,
    pub last_error: Option<String>,
    pub avg_response_time_ms: f64,
    pub queue_size: usize,
    pub status: ConnectionStatus,
    pub uptime_ms: u64,
}

/// Counters and gauges shared by the queue and the session manager.
///
/// Counters only ever increase. Gauges hold the latest value reported.
#[derive(Debug)]
pub struct MetricsCollector {
    started: Instant,
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    errors: AtomicU64,
    total_response_us: AtomicU64,
    queue_size: AtomicUsize,
    status: Mutex<ConnectionStatus>,
    last_error: Mutex<Option<String>>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    /// Creates a collector; uptime counts from now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            total_response_us: AtomicU64::new(0),
            queue_size: AtomicUsize::new(0),
            status: Mutex::new(ConnectionStatus::default()),
            last_error: Mutex::new(None),
        }
    }

    /// Records a successful send and how long it took.
    pub fn record_sent(&self, latency: Duration) {
        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        self.total_response_us.fetch_add(micros, Ordering::Relaxed);
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an inbound message.
    pub fn record_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failure and remembers its message.
    pub fn record_error(&self, message: impl Into<String>) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(message.into());
    }

    /// Sets the number of items waiting in the delivery queue.
    pub fn set_queue_size(&self, size: usize) {
        self.queue_size.store(size, Ordering::Relaxed);
    }

    /// Sets the current connection status.
    pub fn set_status(&self, status: ConnectionStatus) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = status;
    }

    /// Returns a consistent-enough copy of every metric.
    #[must_use]
    pub fn snapshot(&self) -> SessionMetrics {
        let messages_sent = self.messages_sent.load(Ordering::Relaxed);
        let total_us = self.total_response_us.load(Ordering::Relaxed);
        let avg_response_time_ms = if messages_sent == 0 {
            0.0
        } else {
            total_us as f64 / 1000.0 / messages_sent as f64
        };

        SessionMetrics {
            messages_sent,
            messages_received: self.messages_received.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            last_error: self
                .last_error
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            avg_response_time_ms,
            queue_size: self.queue_size.load(Ordering::Relaxed),
            status: *self.status.lock().unwrap_or_else(PoisonError::into_inner),
            uptime_ms: u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }
}
