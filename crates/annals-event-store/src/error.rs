//! Start-up errors of the store binary.

use annals_core::error::StoreError;
use thiserror::Error;

/// Errors raised while configuring and connecting the store.
#[derive(Debug, Error)]
pub enum SetupError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database connection or pool error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The store answered, but not successfully.
    #[error(transparent)]
    Store(#[from] StoreError),
}
