//! The outbound delivery queue.
//!
//! Every submitted item goes through the same gates before each attempt:
//!
//! 1. a concurrency slot (at most `concurrency` attempts in flight),
//! 2. per-destination pacing (`min_recipient_interval_ms` between attempts
//!    to the same destination),
//! 3. one token from the shared [`RateLimiter`].
//!
//! A failed attempt is retried at the tail of the queue after a linear
//! backoff until `max_retries` is used up. First attempts start in
//! submission order; retries may overtake or fall behind other items.
//!
//! The queue lives in memory only. Items still waiting when the process
//! exits are lost.

use crate::config::DeliveryConfig;
use crate::error::{DeliveryError, SendError};
use crate::metrics::MetricsCollector;
use crate::rate_limit::RateLimiter;
use crate::sender::MessageSender;
use satu_core::{DeliveryId, Payload};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::time::{Instant, sleep, sleep_until};
use tracing::{debug, error, warn};

type Outcome = Result<DeliveryReceipt, DeliveryError>;

/// Proof of a successful delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub id: DeliveryId,
    pub destination: String,
    /// Attempts made, including the successful one.
    pub attempts: u32,
    /// Duration of the successful send call.
    pub latency: Duration,
}

/// Resolves to the terminal outcome of a submitted item.
///
/// Dropping the handle does not cancel the delivery.
#[derive(Debug)]
pub struct DeliveryHandle {
    id: DeliveryId,
    rx: oneshot::Receiver<Outcome>,
}

impl DeliveryHandle {
    /// The id assigned at submission.
    #[must_use]
    pub fn id(&self) -> DeliveryId {
        self.id
    }
}

impl Future for DeliveryHandle {
    type Output = Outcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.get_mut().rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            // The queue dropped the item without answering.
            Poll::Ready(Err(_)) => Poll::Ready(Err(DeliveryError::Closed)),
            Poll::Pending => Poll::Pending,
        }
    }
}

struct QueueItem {
    id: DeliveryId,
    destination: String,
    payload: Payload,
    retry_count: u32,
    responder: oneshot::Sender<Outcome>,
}

impl QueueItem {
    fn resolve(self, outcome: Outcome) {
        // The submitter may have stopped listening.
        let _ = self.responder.send(outcome);
    }
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<QueueItem>,
    in_flight: usize,
    awaiting_retry: usize,
    closed: bool,
}

impl QueueState {
    fn waiting(&self) -> usize {
        self.pending.len() + self.awaiting_retry
    }
}

/// Pacing state for one destination.
#[derive(Default)]
struct DestinationSlot {
    /// Held across check, wait and stamp.
    turn: tokio::sync::Mutex<()>,
    last_attempt: Mutex<Option<Instant>>,
}

impl DestinationSlot {
    fn stamp(&self, at: Instant) {
        let mut last = self
            .last_attempt
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *last = Some(last.map_or(at, |prev| prev.max(at)));
    }

    fn ready_at(&self, interval: Duration) -> Option<Instant> {
        self.last_attempt
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .map(|prev| prev + interval)
    }
}

struct Inner {
    config: DeliveryConfig,
    sender: Arc<dyn MessageSender>,
    limiter: Arc<RateLimiter>,
    metrics: Arc<MetricsCollector>,
    state: Mutex<QueueState>,
    destinations: Mutex<HashMap<String, Arc<DestinationSlot>>>,
    closed_tx: watch::Sender<bool>,
}

/// A bounded, rate-limited outbound queue.
///
/// Cloning shares the queue.
#[derive(Clone)]
pub struct DeliveryQueue {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for DeliveryQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryQueue")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl DeliveryQueue {
    /// Creates a queue with its own rate limiter.
    ///
    /// A `concurrency` of zero is treated as one.
    #[must_use]
    pub fn new(
        config: DeliveryConfig,
        sender: Arc<dyn MessageSender>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::from_config(&config));
        Self::with_limiter(config, sender, limiter, metrics)
    }

    /// Creates a queue drawing tokens from a shared limiter.
    #[must_use]
    pub fn with_limiter(
        mut config: DeliveryConfig,
        sender: Arc<dyn MessageSender>,
        limiter: Arc<RateLimiter>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        config.concurrency = config.concurrency.max(1);
        let (closed_tx, _) = watch::channel(false);

        Self {
            inner: Arc::new(Inner {
                config,
                sender,
                limiter,
                metrics,
                state: Mutex::new(QueueState::default()),
                destinations: Mutex::new(HashMap::new()),
                closed_tx,
            }),
        }
    }

    /// Accepts an item for delivery without waiting for it.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::QueueFull`] if `max_queue_size` items are
    /// already waiting, or [`DeliveryError::Closed`] after [`Self::close`].
    pub fn submit(
        &self,
        destination: impl Into<String>,
        payload: Payload,
    ) -> Result<DeliveryHandle, DeliveryError> {
        let (responder, rx) = oneshot::channel();
        let id = DeliveryId::new();
        let destination = destination.into();

        {
            let mut state = self.inner.lock_state();
            if state.closed {
                return Err(DeliveryError::Closed);
            }
            let capacity = self.inner.config.max_queue_size;
            if state.waiting() >= capacity {
                warn!(%destination, capacity, "delivery queue full, rejecting message");
                return Err(DeliveryError::QueueFull { capacity });
            }

            debug!(%id, %destination, "message queued");
            state.pending.push_back(QueueItem {
                id,
                destination,
                payload,
                retry_count: 0,
                responder,
            });
            self.inner.metrics.set_queue_size(state.waiting());
        }

        self.inner.pump();
        Ok(DeliveryHandle { id, rx })
    }

    /// Submits an item and waits for its terminal outcome.
    ///
    /// # Errors
    ///
    /// Returns the submission error, or the terminal delivery failure.
    pub async fn enqueue(
        &self,
        destination: impl Into<String>,
        payload: Payload,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        self.submit(destination, payload)?.await
    }

    /// Stops accepting items and fails everything still waiting.
    ///
    /// Attempts already in flight run to completion. Their retries, if any,
    /// fail with [`DeliveryError::Closed`].
    pub fn close(&self) {
        let drained: Vec<QueueItem> = {
            let mut state = self.inner.lock_state();
            if state.closed {
                return;
            }
            state.closed = true;
            let drained = state.pending.drain(..).collect();
            self.inner.metrics.set_queue_size(state.waiting());
            drained
        };

        self.inner.closed_tx.send_replace(true);
        debug!(dropped = drained.len(), "delivery queue closed");
        for item in drained {
            item.resolve(Err(DeliveryError::Closed));
        }
    }

    /// Items waiting to be attempted, including those waiting out a backoff.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock_state().waiting()
    }

    /// Returns true if nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attempts currently in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.lock_state().in_flight
    }

    /// Returns true once [`Self::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.lock_state().closed
    }

    /// The rate limiter gating attempts.
    #[must_use]
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.inner.limiter
    }

    /// The settings this queue runs with.
    #[must_use]
    pub fn config(&self) -> &DeliveryConfig {
        &self.inner.config
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn destination_slot(&self, destination: &str) -> Arc<DestinationSlot> {
        let mut destinations = self
            .destinations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(destinations.entry(destination.to_string()).or_default())
    }

    /// Starts waiting items while concurrency slots are free.
    fn pump(self: &Arc<Self>) {
        loop {
            let item = {
                let mut state = self.lock_state();
                if state.in_flight >= self.config.concurrency {
                    return;
                }
                let Some(item) = state.pending.pop_front() else {
                    return;
                };
                state.in_flight += 1;
                self.metrics.set_queue_size(state.waiting());
                item
            };

            let inner = Arc::clone(self);
            tokio::spawn(async move { inner.run(item).await });
        }
    }

    async fn run(self: Arc<Self>, mut item: QueueItem) {
        let attempt = item.retry_count + 1;
        let outcome = self.attempt(&item).await;

        let retry = match outcome {
            Ok(latency) => {
                debug!(id = %item.id, destination = %item.destination, attempt, "message sent");
                self.metrics.record_sent(latency);
                let receipt = DeliveryReceipt {
                    id: item.id,
                    destination: item.destination.clone(),
                    attempts: attempt,
                    latency,
                };
                item.resolve(Ok(receipt));
                None
            }
            Err(send_error) => {
                self.metrics.record_error(send_error.to_string());
                if item.retry_count < self.config.max_retries {
                    item.retry_count += 1;
                    let backoff = self.config.backoff(item.retry_count);
                    warn!(
                        id = %item.id,
                        destination = %item.destination,
                        attempt,
                        backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                        error = %send_error,
                        "send failed, retrying"
                    );
                    Some((item, backoff))
                } else {
                    error!(
                        id = %item.id,
                        destination = %item.destination,
                        attempts = attempt,
                        error = %send_error,
                        "send failed, giving up"
                    );
                    item.resolve(Err(DeliveryError::RetriesExhausted {
                        attempts: attempt,
                        last_error: send_error,
                    }));
                    None
                }
            }
        };

        {
            let mut state = self.lock_state();
            state.in_flight -= 1;
            if retry.is_some() {
                state.awaiting_retry += 1;
            }
            self.metrics.set_queue_size(state.waiting());
        }

        if let Some((item, backoff)) = retry {
            let inner = Arc::clone(&self);
            tokio::spawn(async move { inner.requeue_after(item, backoff).await });
        }

        self.pump();
    }

    /// Paces, takes a token, and sends once. Returns the send duration.
    async fn attempt(&self, item: &QueueItem) -> Result<Duration, SendError> {
        let slot = self.destination_slot(&item.destination);
        let interval = self.config.min_recipient_interval();

        {
            let _turn = slot.turn.lock().await;
            // The previous attempt may refresh its stamp while we sleep.
            while let Some(ready) = slot.ready_at(interval) {
                if ready <= Instant::now() {
                    break;
                }
                debug!(destination = %item.destination, "pacing send to destination");
                sleep_until(ready).await;
            }

            self.limiter
                .acquire(1)
                .await
                .map_err(|e| SendError::Failed {
                    reason: e.to_string(),
                })?;
            slot.stamp(Instant::now());
        }

        debug!(
            id = %item.id,
            destination = %item.destination,
            attempt = item.retry_count + 1,
            "sending message"
        );
        let started = Instant::now();
        let result = self.sender.send(&item.destination, &item.payload).await;
        let latency = started.elapsed();
        slot.stamp(Instant::now());

        result.map(|()| latency)
    }

    /// Completes once the queue is closed.
    async fn closed(&self) {
        let mut closed_rx = self.closed_tx.subscribe();
        loop {
            if *closed_rx.borrow_and_update() {
                return;
            }
            if closed_rx.changed().await.is_err() {
                return;
            }
        }
    }

    async fn requeue_after(self: Arc<Self>, item: QueueItem, backoff: Duration) {
        tokio::select! {
            () = sleep(backoff) => {}
            () = self.closed() => {}
        }

        let rejected = {
            let mut state = self.lock_state();
            state.awaiting_retry -= 1;
            let rejected = if state.closed {
                Some(item)
            } else {
                state.pending.push_back(item);
                None
            };
            self.metrics.set_queue_size(state.waiting());
            rejected
        };

        match rejected {
            Some(item) => item.resolve(Err(DeliveryError::Closed)),
            None => self.pump(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    /// Records every attempt and fails the first `failures` of them.
    #[derive(Default)]
    struct RecordingSender {
        attempts: Mutex<Vec<(String, Instant)>>,
        failures: AtomicU32,
        fail_always: bool,
        delay: Duration,
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    impl RecordingSender {
        fn failing_first(n: u32) -> Self {
            Self {
                failures: AtomicU32::new(n),
                ..Self::default()
            }
        }

        fn attempts(&self) -> Vec<(String, Instant)> {
            self.attempts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessageSender for RecordingSender {
        async fn send(&self, destination: &str, _payload: &Payload) -> Result<(), SendError> {
            self.attempts
                .lock()
                .unwrap()
                .push((destination.to_string(), Instant::now()));

            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(active, Ordering::SeqCst);
            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }
            self.active.fetch_sub(1, Ordering::SeqCst);

            if self.fail_always {
                return Err(SendError::Failed {
                    reason: "connection reset".to_string(),
                });
            }
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(SendError::Failed {
                    reason: format!("transient {remaining}"),
                });
            }
            Ok(())
        }
    }

    /// Never completes a send.
    struct StuckSender {
        gate: Semaphore,
    }

    #[async_trait]
    impl MessageSender for StuckSender {
        async fn send(&self, _destination: &str, _payload: &Payload) -> Result<(), SendError> {
            let _permit = self.gate.acquire().await;
            Ok(())
        }
    }

    fn queue_with(
        config: DeliveryConfig,
        sender: Arc<dyn MessageSender>,
    ) -> (DeliveryQueue, Arc<MetricsCollector>) {
        let metrics = Arc::new(MetricsCollector::new());
        (DeliveryQueue::new(config, sender, Arc::clone(&metrics)), metrics)
    }

    #[tokio::test(start_paused = true)]
    async fn delivers_and_records_metrics() {
        let sender = Arc::new(RecordingSender::default());
        let (queue, metrics) = queue_with(DeliveryConfig::default(), sender.clone());

        let receipt = queue
            .enqueue("628111@s.whatsapp.net", Payload::text("hi"))
            .await
            .unwrap();

        assert_eq!(receipt.attempts, 1);
        assert_eq!(receipt.destination, "628111@s.whatsapp.net");
        assert_eq!(sender.attempts().len(), 1);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.messages_sent, 1);
        assert_eq!(snapshot.errors, 0);
        assert_eq!(snapshot.queue_size, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn overflow_fails_fast_without_growing() {
        let sender = Arc::new(StuckSender {
            gate: Semaphore::new(0),
        });
        let config = DeliveryConfig {
            concurrency: 1,
            max_queue_size: 2,
            ..DeliveryConfig::default()
        };
        let (queue, metrics) = queue_with(config, sender);

        // One in flight, two waiting.
        let _a = queue.submit("a", Payload::text("1")).unwrap();
        let _b = queue.submit("b", Payload::text("2")).unwrap();
        let _c = queue.submit("c", Payload::text("3")).unwrap();
        assert_eq!(queue.len(), 2);

        let err = queue.submit("d", Payload::text("4")).unwrap_err();
        assert_eq!(err, DeliveryError::QueueFull { capacity: 2 });
        assert_eq!(queue.len(), 2);
        assert_eq!(metrics.snapshot().queue_size, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn same_destination_attempts_are_spaced() {
        let sender = Arc::new(RecordingSender::default());
        let (queue, _) = queue_with(DeliveryConfig::default(), sender.clone());
        let start = Instant::now();

        let handles: Vec<_> = (0..10)
            .map(|i| {
                queue
                    .submit("628111@s.whatsapp.net", Payload::text(format!("m{i}")))
                    .unwrap()
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let attempts = sender.attempts();
        assert_eq!(attempts.len(), 10);
        for pair in attempts.windows(2) {
            assert!(pair[1].1.duration_since(pair[0].1) >= Duration::from_millis(3000));
        }
        assert!(start.elapsed() >= Duration::from_millis(27_000));
    }

    #[tokio::test(start_paused = true)]
    async fn distinct_destinations_are_not_paced() {
        let sender = Arc::new(RecordingSender::default());
        let (queue, _) = queue_with(DeliveryConfig::default(), sender.clone());
        let start = Instant::now();

        let handles: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .map(|d| queue.submit(d, Payload::text("x")).unwrap())
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn aggregate_rate_is_bounded_by_bucket() {
        let sender = Arc::new(RecordingSender::default());
        let config = DeliveryConfig {
            concurrency: 20,
            min_recipient_interval_ms: 0,
            ..DeliveryConfig::default()
        };
        let (queue, _) = queue_with(config, sender.clone());
        let start = Instant::now();

        let handles: Vec<_> = (0..20)
            .map(|i| queue.submit(format!("dest-{i}"), Payload::text("x")).unwrap())
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        // A burst of 5, then 15 more at 5 per second.
        assert!(start.elapsed() >= Duration::from_millis(2_990));

        // No one-second window holds more than capacity + rate sends.
        let attempts = sender.attempts();
        for (_, at) in &attempts {
            let in_window = attempts
                .iter()
                .filter(|(_, other)| *other >= *at && other.duration_since(*at) < Duration::from_secs(1))
                .count();
            assert!(in_window <= 10, "{in_window} sends within one second");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_then_succeeds() {
        let sender = Arc::new(RecordingSender::failing_first(2));
        let (queue, metrics) = queue_with(DeliveryConfig::default(), sender.clone());

        let receipt = queue.enqueue("a", Payload::text("x")).await.unwrap();

        assert_eq!(receipt.attempts, 3);
        assert_eq!(sender.attempts().len(), 3);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.errors, 2);
        assert_eq!(snapshot.messages_sent, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_reports_last_error_and_stops() {
        let sender = Arc::new(RecordingSender {
            fail_always: true,
            ..RecordingSender::default()
        });
        let (queue, metrics) = queue_with(DeliveryConfig::default(), sender.clone());
        let start = Instant::now();

        let err = queue.enqueue("a", Payload::text("x")).await.unwrap_err();

        assert_eq!(
            err,
            DeliveryError::RetriesExhausted {
                attempts: 4,
                last_error: SendError::Failed {
                    reason: "connection reset".to_string()
                },
            }
        );
        // Backoffs of 2s, 4s and 6s.
        assert!(start.elapsed() >= Duration::from_secs(12));
        assert_eq!(metrics.snapshot().errors, 4);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(sender.attempts().len(), 4);
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_is_bounded() {
        let sender = Arc::new(RecordingSender {
            delay: Duration::from_millis(500),
            ..RecordingSender::default()
        });
        let config = DeliveryConfig {
            concurrency: 2,
            ..DeliveryConfig::default()
        };
        let (queue, _) = queue_with(config, sender.clone());

        let handles: Vec<_> = (0..5)
            .map(|i| queue.submit(format!("dest-{i}"), Payload::text("x")).unwrap())
            .collect();
        assert_eq!(queue.in_flight(), 2);
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(sender.max_active.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn first_attempts_start_in_submission_order() {
        let sender = Arc::new(RecordingSender::default());
        let config = DeliveryConfig {
            concurrency: 1,
            ..DeliveryConfig::default()
        };
        let (queue, _) = queue_with(config, sender.clone());

        let handles: Vec<_> = ["a", "b", "c", "d"]
            .into_iter()
            .map(|d| queue.submit(d, Payload::text("x")).unwrap())
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let order: Vec<String> = sender.attempts().into_iter().map(|(d, _)| d).collect();
        assert_eq!(order, vec!["a", "b", "c", "d"]);
    }

    #[tokio::test(start_paused = true)]
    async fn close_fails_waiting_items_and_rejects_new_ones() {
        let sender = Arc::new(StuckSender {
            gate: Semaphore::new(0),
        });
        let config = DeliveryConfig {
            concurrency: 1,
            ..DeliveryConfig::default()
        };
        let (queue, metrics) = queue_with(config, sender);

        let _in_flight = queue.submit("a", Payload::text("1")).unwrap();
        let waiting = queue.submit("b", Payload::text("2")).unwrap();

        queue.close();

        assert_eq!(waiting.await, Err(DeliveryError::Closed));
        assert_eq!(
            queue.submit("c", Payload::text("3")).unwrap_err(),
            DeliveryError::Closed
        );
        assert!(queue.is_closed());
        assert_eq!(metrics.snapshot().queue_size, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn close_cancels_pending_retry() {
        let sender = Arc::new(RecordingSender {
            fail_always: true,
            ..RecordingSender::default()
        });
        let (queue, _) = queue_with(DeliveryConfig::default(), sender.clone());

        let handle = queue.submit("a", Payload::text("x")).unwrap();
        // Let the first attempt fail and enter its backoff.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(queue.len(), 1);

        queue.close();

        assert_eq!(handle.await, Err(DeliveryError::Closed));
        assert_eq!(sender.attempts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_backoff_waits_until_closed() {
        let sender = Arc::new(RecordingSender {
            fail_always: true,
            ..RecordingSender::default()
        });
        let config = DeliveryConfig {
            backoff_base_ms: u64::MAX,
            ..DeliveryConfig::default()
        };
        let (queue, metrics) = queue_with(config, sender.clone());

        let handle = queue.submit("a", Payload::text("x")).unwrap();
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(sender.attempts().len(), 1);
        assert_eq!(metrics.snapshot().queue_size, 1);

        queue.close();
        assert_eq!(handle.await, Err(DeliveryError::Closed));
    }
}
