//! The credential store contract.

use crate::error::CredentialError;
use async_trait::async_trait;
use satu_core::{CredentialKey, Payload, Result};

/// Durable key-value storage for opaque credential payloads.
///
/// Implementations must not cache: every read goes to storage so that a
/// restarted process never sees stale credentials. Each call is atomic for
/// its single key.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Reads the payload stored under `key`.
    ///
    /// Returns `Ok(None)` when nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails or the stored record cannot be
    /// decoded.
    async fn read(&self, key: &CredentialKey) -> Result<Option<Payload>, CredentialError>;

    /// Inserts or updates the payload stored under `key`.
    ///
    /// The creation time of an existing record is preserved.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    async fn write(
        &self,
        key: &CredentialKey,
        payload: &Payload,
    ) -> Result<(), CredentialError>;

    /// Deletes the record stored under `key`. Deleting a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    async fn remove(&self, key: &CredentialKey) -> Result<(), CredentialError>;
}
