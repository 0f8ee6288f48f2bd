//! Durable credential storage for satu.
//!
//! This crate provides:
//!
//! - **Credential store**: the `CredentialStore` trait and its SQLite
//!   implementation, one row per credential id
//! - **Key store**: category/id access to the transport's auxiliary key
//!   material
//! - **Auth state**: loading the session credentials at connect time

pub mod auth;
pub mod error;
pub mod keys;
pub mod sqlite;
pub mod store;

pub use auth::AuthState;
pub use error::CredentialError;
pub use keys::{CredentialKeyStore, KeyUpdates};
pub use sqlite::{CredentialRecord, SqliteCredentialStore};
pub use store::CredentialStore;
