//! Prints what the credential store holds.
//!
//! Usage: `satu-inspect [CONFIG_FILE]`. Configuration comes from the file,
//! if given, and `SATU_` environment variables.

use rootcause::Report;
use satu_credential_store::{CredentialRecord, SqliteCredentialStore};
use satu_session::SatuConfig;
use std::fmt;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug)]
enum InspectError {
    Config { reason: String },
    Store { reason: String },
    Render { reason: String },
}

impl fmt::Display for InspectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { reason } => write!(f, "failed to load configuration: {reason}"),
            Self::Store { reason } => write!(f, "credential store error: {reason}"),
            Self::Render { reason } => write!(f, "failed to render record: {reason}"),
        }
    }
}

impl std::error::Error for InspectError {}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "inspection failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Report<InspectError>> {
    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = SatuConfig::load(path.as_deref()).map_err(|e| InspectError::Config {
        reason: e.to_string(),
    })?;
    tracing::info!(database_url = %config.database_url, "loaded configuration");

    let store = SqliteCredentialStore::connect(&config.database_url)
        .await
        .map_err(store_error)?;

    let result = report(&store).await;
    store.close().await;
    result
}

async fn report(store: &SqliteCredentialStore) -> Result<(), Report<InspectError>> {
    let records = store.list().await.map_err(store_error)?;
    for record in &records {
        tracing::info!(
            id = %record.key,
            created_at = %record.created_at,
            updated_at = %record.updated_at,
            bytes = record.encoded_len,
            "credential record"
        );
    }

    match store.latest().await.map_err(store_error)? {
        Some(latest) => {
            tracing::info!(id = %latest.key, "latest record");
            println!("{}", render(&latest)?);
        }
        None => tracing::info!("no credential records stored"),
    }

    let total = store.count().await.map_err(store_error)?;
    tracing::info!(total, "credential records in store");
    Ok(())
}

fn render(record: &CredentialRecord) -> Result<String, InspectError> {
    serde_json::to_string_pretty(record).map_err(|e| InspectError::Render {
        reason: e.to_string(),
    })
}

fn store_error(e: impl fmt::Display) -> InspectError {
    InspectError::Store {
        reason: e.to_string(),
    }
}
