//! Collaborators the session hands work to.

use crate::handle::SessionHandle;
use crate::transport::InboundMessage;
use async_trait::async_trait;
use tracing::info;

/// Handles inbound messages, e.g. by running commands.
///
/// Each message is dispatched on its own task, so a slow handler never
/// holds up the connection's event stream.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Handles one message. Failures are the dispatcher's to report.
    async fn dispatch(&self, session: SessionHandle, message: InboundMessage);
}

/// Shows an authentication challenge to the operator.
pub trait ChallengeRenderer: Send + Sync {
    fn render(&self, challenge: &str);
}

/// Writes the challenge to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogChallengeRenderer;

impl ChallengeRenderer for LogChallengeRenderer {
    fn render(&self, challenge: &str) {
        info!(%challenge, "scan the challenge code to connect");
    }
}
