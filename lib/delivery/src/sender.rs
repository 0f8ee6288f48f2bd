//! The outbound send seam.

use crate::error::SendError;
use async_trait::async_trait;
use satu_core::Payload;

/// Performs one send attempt.
///
/// The queue decides when to call this and what to do on failure; an
/// implementation only reports whether this single attempt worked.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Sends `payload` to `destination`.
    ///
    /// # Errors
    ///
    /// Returns an error if the attempt failed.
    async fn send(&self, destination: &str, payload: &Payload) -> Result<(), SendError>;
}
