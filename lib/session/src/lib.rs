//! Session management for satu.
//!
//! This crate provides:
//!
//! - **Transport seam**: the traits and events a messaging transport
//!   implements
//! - **Session manager**: the connection state machine, reconnection and
//!   credential rotation
//! - **Session handle**: the send/status surface given to command handlers
//! - **Configuration**: `SatuConfig`, loaded from the environment

pub mod config;
pub mod dispatch;
pub mod error;
pub mod handle;
pub mod manager;
pub mod transport;

pub use config::{ReconnectConfig, SatuConfig};
pub use dispatch::{ChallengeRenderer, Dispatcher, LogChallengeRenderer};
pub use error::{SessionError, TransportError};
pub use handle::SessionHandle;
pub use manager::{SessionManager, SessionParts};
pub use transport::{
    CloseReason, Connection, ConnectionUpdate, InboundMessage, Link, Transport, TransportEvent,
};
