//! Error types for ft-store.

use thiserror::Error;

use ft_core::ShipmentId;

/// Errors that can occur when reading or writing durable state.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A write that requires an existing shipment row found none.
    #[error("shipment {0} not found")]
    MissingShipment(ShipmentId),

    /// A stored value could not be decoded back into its Rust type.
    #[error("corrupt stored value: {0}")]
    Corrupt(String),

    /// A blocking storage task panicked or was cancelled.
    #[error("storage task failed: {0}")]
    Task(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;
