use crate::types::TableIdentity;
use thiserror::Error;

/// Failures raised by a destination store connection
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("destination unavailable: {0}")]
    Unavailable(String),

    #[error("rejected by destination: {0}")]
    Rejected(String),
}

/// Errors surfaced by a load pass.
///
/// Only `SourceLoad` and `Config` abort a pass; the catalog and write variants are
/// contained at the table where they occur and end up in the summary.
#[derive(Error, Debug)]
pub enum MeltError {
    #[error("catalog unavailable for table {table}: {source}")]
    CatalogUnavailable { table: String, source: StoreError },

    #[error("catalog query failed for table {table}: {source}")]
    CatalogQuery { table: String, source: StoreError },

    #[error("bulk load into {table} failed: {source}")]
    Write { table: TableIdentity, source: StoreError },

    #[error("failed to load source document {location}: {reason}")]
    SourceLoad { location: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, MeltError>;
