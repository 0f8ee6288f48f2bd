//! The surface given to command handlers.

use crate::error::SessionError;
use rootcause::Report;
use satu_core::{ConnectionStatus, Payload};
use satu_delivery::{DeliveryQueue, DeliveryReceipt, MetricsCollector, SessionMetrics};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// A cheap, cloneable view of a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    queue: DeliveryQueue,
    status: watch::Receiver<ConnectionStatus>,
    metrics: Arc<MetricsCollector>,
}

impl SessionHandle {
    pub(crate) fn new(
        queue: DeliveryQueue,
        status: watch::Receiver<ConnectionStatus>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            queue,
            status,
            metrics,
        }
    }

    /// Queues a message and waits for its terminal outcome.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotReady`] unless the session is connected,
    /// or [`SessionError::Delivery`] if the queue rejects or gives up on the
    /// message.
    pub async fn send_message(
        &self,
        destination: &str,
        payload: Payload,
    ) -> Result<DeliveryReceipt, Report<SessionError>> {
        let status = self.status();
        if !status.is_connected() {
            return Err(SessionError::NotReady { status }.into());
        }

        debug!(destination, "queueing outbound message");
        let receipt = self
            .queue
            .enqueue(destination, payload)
            .await
            .map_err(SessionError::Delivery)?;
        Ok(receipt)
    }

    /// The current connection status.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// A snapshot of the session metrics.
    #[must_use]
    pub fn metrics(&self) -> SessionMetrics {
        self.metrics.snapshot()
    }
}
