//! Storage keys for persisted credential records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage id of the session credentials record.
pub const SESSION_CREDENTIALS_ID: &str = "creds.json";

/// The key a credential record is stored under.
///
/// There is exactly one session credentials record. Everything else is
/// auxiliary key material owned by the transport, addressed as
/// `{category}-{id}.json`. Categories may themselves contain dashes, so keys
/// are never parsed back into their parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialKey(String);

impl CredentialKey {
    /// The singleton session credentials key.
    #[must_use]
    pub fn session() -> Self {
        Self(SESSION_CREDENTIALS_ID.to_string())
    }

    /// Key for one item of auxiliary key material.
    #[must_use]
    pub fn key_material(category: &str, id: &str) -> Self {
        Self(format!("{category}-{id}.json"))
    }

    /// Wraps a raw storage id, e.g. one read back from the table.
    #[must_use]
    pub fn from_raw(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the storage id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for the session credentials key.
    #[must_use]
    pub fn is_session(&self) -> bool {
        self.0 == SESSION_CREDENTIALS_ID
    }
}

impl fmt::Display for CredentialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
