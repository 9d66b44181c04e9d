// Obscura — Top-level error types
//
// Aggregates errors from config, store and vault into a single enum for the
// application boundary.

use thiserror::Error;

/// Top-level error type for all Obscura operations.
#[derive(Debug, Error)]
pub enum ObscuraError {
    #[error("Config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("{0}")]
    Vault(#[from] crate::vault::VaultError),

    #[error("Hashing error: {0}")]
    Hash(#[from] crate::credentials::HashError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ObscuraError>;
