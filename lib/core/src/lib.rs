//! Core domain types and utilities for satu.
//!
//! This crate provides the types shared by the credential store, the
//! delivery queue and the session manager: opaque payloads, credential keys,
//! connection status, strongly-typed ids and the `Result` alias.

pub mod error;
pub mod id;
pub mod key;
pub mod payload;
pub mod status;

pub use error::Result;
pub use id::{ConnectionId, DeliveryId};
pub use key::{CredentialKey, SESSION_CREDENTIALS_ID};
pub use payload::{Buffer, Payload, PayloadError, buffer};
pub use status::ConnectionStatus;
