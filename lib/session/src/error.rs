//! Error types for the session layer.

use satu_core::ConnectionStatus;
use satu_delivery::DeliveryError;
use std::fmt;

/// Errors reported by a transport while opening a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The connection could not be established.
    ConnectFailed { reason: String },
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectFailed { reason } => write!(f, "transport connect failed: {reason}"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Errors from session operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Sends are only accepted while connected.
    NotReady { status: ConnectionStatus },
    /// Loading or saving credentials failed.
    CredentialStorage { reason: String },
    /// The transport could not connect.
    Transport { reason: String },
    /// The delivery queue rejected or failed the message.
    Delivery(DeliveryError),
    /// The session has been shut down.
    ShutDown,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReady { status } => write!(f, "session is not ready (status: {status})"),
            Self::CredentialStorage { reason } => {
                write!(f, "credential storage failed: {reason}")
            }
            Self::Transport { reason } => write!(f, "transport error: {reason}"),
            Self::Delivery(e) => write!(f, "delivery failed: {e}"),
            Self::ShutDown => write!(f, "session has been shut down"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Delivery(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DeliveryError> for SessionError {
    fn from(e: DeliveryError) -> Self {
        Self::Delivery(e)
    }
}
