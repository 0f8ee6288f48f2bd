//! The transport seam.
//!
//! A transport owns the wire protocol and handshake. The session manager
//! only asks it for a connection, sends through the returned [`Link`], and
//! reacts to the [`TransportEvent`]s it emits.

use crate::error::TransportError;
use async_trait::async_trait;
use satu_core::Payload;
use satu_credential_store::AuthState;
use satu_delivery::SendError;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Opens connections to the messaging service.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fresh credentials for a session that has never authenticated.
    fn initial_credentials(&self) -> Payload;

    /// Opens a connection with the given auth state.
    ///
    /// Events for the connection, including its eventual close, arrive on
    /// [`Connection::events`].
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    async fn connect(&self, auth: AuthState) -> Result<Connection, TransportError>;
}

/// The sending side of an open connection.
#[async_trait]
pub trait Link: Send + Sync {
    /// Sends one message.
    ///
    /// # Errors
    ///
    /// Returns an error if this attempt failed.
    async fn send(&self, destination: &str, payload: &Payload) -> Result<(), SendError>;

    /// Closes the connection. Closing twice is harmless.
    async fn close(&self);
}

/// An open connection.
pub struct Connection {
    pub link: Arc<dyn Link>,
    pub events: mpsc::Receiver<TransportEvent>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

/// Something the transport reports.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connection(ConnectionUpdate),
    Message(InboundMessage),
    /// The session credentials changed and should be persisted.
    CredentialsUpdated(Payload),
}

/// Connection lifecycle updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionUpdate {
    Connecting,
    /// No valid credentials; the operator must scan this code.
    Challenge(String),
    Open,
    Closed(CloseReason),
}

/// Why a connection closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The remote ended the session; the credentials are no longer valid.
    LoggedOut,
    /// Anything else. Worth reconnecting.
    Other { code: Option<u16>, message: String },
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoggedOut => write!(f, "logged out"),
            Self::Other {
                code: Some(code),
                message,
            } => write!(f, "{message} (code {code})"),
            Self::Other {
                code: None,
                message,
            } => f.write_str(message),
        }
    }
}

/// A message received from the service.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Service-assigned message id.
    pub id: String,
    /// The chat the message belongs to; replies go here.
    pub chat: String,
    /// The author, when the chat is a group.
    pub sender: Option<String>,
    /// True for messages this account sent itself.
    pub from_me: bool,
    /// True for messages arriving in real time, false for history sync.
    pub live: bool,
    pub payload: Payload,
}

impl InboundMessage {
    /// The text body, if this is a text message.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.payload.as_text()
    }
}
