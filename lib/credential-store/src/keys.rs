//! Category/id access to auxiliary key material.

use crate::error::CredentialError;
use crate::store::CredentialStore;
use futures::future::try_join_all;
use rootcause::Report;
use satu_core::{CredentialKey, Payload};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// A batch of key-material mutations: `category -> id -> value`.
///
/// `Some` writes the value, `None` removes the record.
pub type KeyUpdates = HashMap<String, HashMap<String, Option<Payload>>>;

/// Key-material view over a [`CredentialStore`].
///
/// Records are stored under [`CredentialKey::key_material`]. The store is
/// shared with the session credentials, so this type never touches
/// `creds.json`.
#[derive(Clone)]
pub struct CredentialKeyStore {
    store: Arc<dyn CredentialStore>,
}

impl std::fmt::Debug for CredentialKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialKeyStore").finish_non_exhaustive()
    }
}

impl CredentialKeyStore {
    /// Creates a key store backed by `store`.
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Reads every id of `category` concurrently.
    ///
    /// Ids with no stored record map to `None`.
    ///
    /// # Errors
    ///
    /// Returns the first storage error encountered.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn get(
        &self,
        category: &str,
        ids: &[String],
    ) -> Result<HashMap<String, Option<Payload>>, Report<CredentialError>> {
        let reads = ids.iter().map(|id| {
            let key = CredentialKey::key_material(category, id);
            async move {
                let value = self.store.read(&key).await?;
                Ok::<_, Report<CredentialError>>((id.clone(), value))
            }
        });

        let found = try_join_all(reads).await?;
        Ok(found.into_iter().collect())
    }

    /// Applies a batch of writes and removals concurrently.
    ///
    /// # Errors
    ///
    /// Returns the first storage error encountered. Mutations already
    /// applied are not rolled back.
    #[instrument(skip(self, updates))]
    pub async fn set(&self, updates: KeyUpdates) -> Result<(), Report<CredentialError>> {
        let mutations = updates.into_iter().flat_map(|(category, items)| {
            items.into_iter().map(move |(id, value)| {
                let key = CredentialKey::key_material(&category, &id);
                async move {
                    match value {
                        Some(payload) => self.store.write(&key, &payload).await,
                        None => self.store.remove(&key).await,
                    }
                }
            })
        });

        let applied = try_join_all(mutations).await?;
        debug!(count = applied.len(), "key material updated");
        Ok(())
    }
}
