//! Connection status of the transport session.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The connection lifecycle state.
///
/// Exactly one value holds at a time; the session manager drives every
/// transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// No connection; the initial state.
    #[default]
    Disconnected,
    /// A connection attempt is running.
    Connecting,
    /// The handshake completed and sends are accepted.
    Connected,
    /// No valid credentials; an authentication challenge is waiting to be
    /// scanned by the operator.
    AwaitingScan,
}

impl ConnectionStatus {
    /// Returns the snake_case name of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::AwaitingScan => "awaiting_scan",
        }
    }

    /// Returns true if outbound sends may be accepted.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
