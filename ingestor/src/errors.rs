use thiserror::Error;

/// Failure of the durable telemetry table.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to open database: {0}")]
    Open(#[source] sqlx::Error),

    #[error("database migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("failed to append record: {0}")]
    Append(#[source] sqlx::Error),

    #[error("failed to read records: {0}")]
    Read(#[source] sqlx::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Subscribe to {filter} failed: {reason}")]
    Subscribe { filter: String, reason: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
