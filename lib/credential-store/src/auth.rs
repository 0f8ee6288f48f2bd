//! Authentication state handed to the transport at connect time.

use crate::error::CredentialError;
use crate::keys::CredentialKeyStore;
use crate::store::CredentialStore;
use satu_core::{CredentialKey, Payload, Result};
use std::sync::Arc;
use tracing::{info, instrument};

/// Session credentials plus access to key material.
#[derive(Debug, Clone)]
pub struct AuthState {
    /// The session credentials, restored or freshly generated.
    pub credentials: Payload,
    /// Key-material access for the transport.
    pub keys: CredentialKeyStore,
    /// True when `credentials` came from storage.
    pub restored: bool,
}

impl AuthState {
    /// Loads the session credentials, falling back to `init` when none are
    /// stored.
    ///
    /// Fresh credentials are not persisted here; the transport reports them
    /// through a credentials update once they are worth keeping.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored credentials cannot be read.
    #[instrument(skip_all)]
    pub async fn load(
        store: Arc<dyn CredentialStore>,
        init: impl FnOnce() -> Payload,
    ) -> Result<Self, CredentialError> {
        let stored = store.read(&CredentialKey::session()).await?;
        let restored = stored.is_some();
        let credentials = stored.unwrap_or_else(init);

        info!(restored, "loaded session credentials");

        Ok(Self {
            credentials,
            keys: CredentialKeyStore::new(store),
            restored,
        })
    }

    /// Persists session credentials under `creds.json`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn save_credentials(
        store: &dyn CredentialStore,
        credentials: &Payload,
    ) -> Result<(), CredentialError> {
        store.write(&CredentialKey::session(), credentials).await
    }

    /// Deletes the session credentials so the next connect starts fresh.
    ///
    /// Key material is left in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn clear_session(store: &dyn CredentialStore) -> Result<(), CredentialError> {
        store.remove(&CredentialKey::session()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::SqliteCredentialStore;

    async fn store() -> Arc<dyn CredentialStore> {
        Arc::new(SqliteCredentialStore::in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn load_falls_back_to_init_without_persisting() {
        let store = store().await;

        let state = AuthState::load(store.clone(), || Payload::text("fresh"))
            .await
            .unwrap();
        assert!(!state.restored);
        assert_eq!(state.credentials, Payload::text("fresh"));

        let stored = store.read(&CredentialKey::session()).await.unwrap();
        assert!(stored.is_none());
    }

    #[tokio::test]
    async fn load_prefers_stored_credentials() {
        let store = store().await;
        AuthState::save_credentials(store.as_ref(), &Payload::text("saved"))
            .await
            .unwrap();

        let state = AuthState::load(store, || Payload::text("fresh"))
            .await
            .unwrap();
        assert!(state.restored);
        assert_eq!(state.credentials, Payload::text("saved"));
    }

    #[tokio::test]
    async fn clear_session_keeps_key_material() {
        let store = store().await;
        let material = CredentialKey::key_material("pre-key", "1");
        AuthState::save_credentials(store.as_ref(), &Payload::text("saved"))
            .await
            .unwrap();
        store.write(&material, &Payload::text("k")).await.unwrap();

        AuthState::clear_session(store.as_ref()).await.unwrap();

        assert!(store.read(&CredentialKey::session()).await.unwrap().is_none());
        assert!(store.read(&material).await.unwrap().is_some());
    }
}
