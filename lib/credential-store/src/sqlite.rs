//! SQLite-backed credential store.

use crate::error::CredentialError;
use crate::store::CredentialStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rootcause::Report;
use satu_core::{CredentialKey, Payload};
use serde::Serialize;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use tracing::{debug, instrument};

/// A stored credential record, as seen by diagnostic tooling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CredentialRecord {
    /// Storage key.
    pub key: CredentialKey,
    /// Decoded payload.
    pub payload: Payload,
    /// Length of the encoded payload in bytes.
    pub encoded_len: usize,
    /// When the record was first written.
    pub created_at: DateTime<Utc>,
    /// When the record was last written.
    pub updated_at: DateTime<Utc>,
}

/// Row type for credential queries.
#[derive(FromRow)]
struct CredentialRow {
    id: String,
    data: String,
    created_at: i64,
    updated_at: i64,
}

impl CredentialRow {
    fn decode_payload(&self) -> Result<Payload, CredentialError> {
        Payload::decode(&self.data).map_err(|e| CredentialError::InvalidFormat {
            id: self.id.clone(),
            reason: e.to_string(),
        })
    }

    fn try_into_record(self) -> Result<CredentialRecord, CredentialError> {
        let payload = self.decode_payload()?;
        let created_at = timestamp(&self.id, self.created_at)?;
        let updated_at = timestamp(&self.id, self.updated_at)?;

        Ok(CredentialRecord {
            encoded_len: self.data.len(),
            key: CredentialKey::from_raw(self.id),
            payload,
            created_at,
            updated_at,
        })
    }
}

fn timestamp(id: &str, millis: i64) -> Result<DateTime<Utc>, CredentialError> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| CredentialError::InvalidFormat {
        id: id.to_string(),
        reason: format!("timestamp out of range: {millis}"),
    })
}

fn storage_failed(key: &CredentialKey, e: sqlx::Error) -> CredentialError {
    CredentialError::StorageFailed {
        id: key.to_string(),
        reason: e.to_string(),
    }
}

/// Credential store over a SQLite pool.
#[derive(Debug, Clone)]
pub struct SqliteCredentialStore {
    pool: SqlitePool,
}

impl SqliteCredentialStore {
    /// Wraps an existing pool. Call [`Self::migrate`] before first use.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens a pool for `database_url` and runs migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or a migration fails.
    pub async fn connect(database_url: &str) -> Result<Self, Report<CredentialError>> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| CredentialError::ConnectionFailed {
                reason: e.to_string(),
            })?;

        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Opens a migrated in-memory store.
    ///
    /// The pool holds a single connection that is never recycled, since
    /// every SQLite in-memory connection is its own database.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or a migration fails.
    pub async fn in_memory() -> Result<Self, Report<CredentialError>> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| CredentialError::ConnectionFailed {
                reason: e.to_string(),
            })?;

        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Runs the embedded schema migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails.
    pub async fn migrate(&self) -> Result<(), Report<CredentialError>> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| CredentialError::MigrationFailed {
                reason: e.to_string(),
            })?;
        Ok(())
    }

    /// Returns the underlying pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes the pool, waiting for open connections to finish.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Finds the full record stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails or the record cannot be decoded.
    pub async fn find(
        &self,
        key: &CredentialKey,
    ) -> Result<Option<CredentialRecord>, Report<CredentialError>> {
        let row: Option<CredentialRow> = sqlx::query_as(
            r#"
            SELECT id, data, created_at, updated_at
            FROM credentials
            WHERE id = ?1
            "#,
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage_failed(key, e))?;

        match row {
            Some(r) => Ok(Some(r.try_into_record()?)),
            None => Ok(None),
        }
    }

    /// Lists all records, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails or any record cannot be decoded.
    pub async fn list(&self) -> Result<Vec<CredentialRecord>, Report<CredentialError>> {
        let rows: Vec<CredentialRow> = sqlx::query_as(
            r#"
            SELECT id, data, created_at, updated_at
            FROM credentials
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CredentialError::StorageFailed {
            id: "*".to_string(),
            reason: e.to_string(),
        })?;

        let records = rows
            .into_iter()
            .map(CredentialRow::try_into_record)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Returns the most recently created record.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails or the record cannot be decoded.
    pub async fn latest(&self) -> Result<Option<CredentialRecord>, Report<CredentialError>> {
        let row: Option<CredentialRow> = sqlx::query_as(
            r#"
            SELECT id, data, created_at, updated_at
            FROM credentials
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CredentialError::StorageFailed {
            id: "*".to_string(),
            reason: e.to_string(),
        })?;

        match row {
            Some(r) => Ok(Some(r.try_into_record()?)),
            None => Ok(None),
        }
    }

    /// Counts stored records.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn count(&self) -> Result<u64, Report<CredentialError>> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM credentials")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| CredentialError::StorageFailed {
                id: "*".to_string(),
                reason: e.to_string(),
            })?;
        Ok(u64::try_from(total).unwrap_or_default())
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    #[instrument(skip(self), fields(id = %key))]
    async fn read(&self, key: &CredentialKey) -> Result<Option<Payload>, Report<CredentialError>> {
        let row: Option<CredentialRow> = sqlx::query_as(
            r#"
            SELECT id, data, created_at, updated_at
            FROM credentials
            WHERE id = ?1
            "#,
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage_failed(key, e))?;

        match row {
            Some(r) => Ok(Some(r.decode_payload()?)),
            None => {
                debug!("credential not found");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, payload), fields(id = %key))]
    async fn write(
        &self,
        key: &CredentialKey,
        payload: &Payload,
    ) -> Result<(), Report<CredentialError>> {
        let data = payload
            .encode()
            .map_err(|e| CredentialError::InvalidFormat {
                id: key.to_string(),
                reason: e.to_string(),
            })?;
        let now = Utc::now().timestamp_millis();

        sqlx::query(
            r#"
            INSERT INTO credentials (id, data, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?3)
            ON CONFLICT (id)
            DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at
            "#,
        )
        .bind(key.as_str())
        .bind(&data)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| storage_failed(key, e))?;

        debug!(bytes = data.len(), "credential written");
        Ok(())
    }

    #[instrument(skip(self), fields(id = %key))]
    async fn remove(&self, key: &CredentialKey) -> Result<(), Report<CredentialError>> {
        let result = sqlx::query(
            r#"
            DELETE FROM credentials
            WHERE id = ?1
            "#,
        )
        .bind(key.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| storage_failed(key, e))?;

        debug!(removed = result.rows_affected(), "credential removed");
        Ok(())
    }
}
