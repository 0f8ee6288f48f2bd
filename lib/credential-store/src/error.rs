//! Error types for the credential store.

use std::fmt;

/// Errors from credential storage operations.
///
/// A failed read or write is never papered over: a session whose
/// credentials cannot be loaded or saved must not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// Connecting to the database failed.
    ConnectionFailed { reason: String },
    /// Running schema migrations failed.
    MigrationFailed { reason: String },
    /// A storage operation failed.
    StorageFailed { id: String, reason: String },
    /// A stored record could not be decoded.
    InvalidFormat { id: String, reason: String },
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed { reason } => {
                write!(f, "credential database connection failed: {reason}")
            }
            Self::MigrationFailed { reason } => {
                write!(f, "credential migration failed: {reason}")
            }
            Self::StorageFailed { id, reason } => {
                write!(f, "credential storage failed for '{id}': {reason}")
            }
            Self::InvalidFormat { id, reason } => {
                write!(f, "invalid credential format for '{id}': {reason}")
            }
        }
    }
}

impl std::error::Error for CredentialError {}
