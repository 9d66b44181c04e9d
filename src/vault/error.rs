// Obscura — Vault error taxonomy
//
// Every failure that leaves the vault service is one of these five kinds.
// Transports map the kind, never the message text.

use thiserror::Error;

use crate::credentials::CredentialsError;
use crate::store::StoreError;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VaultError {
    /// Credentials did not resolve to an account, or the record belongs to
    /// another account.
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage failure: {0}")]
    StorageFailure(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl VaultError {
    /// Stable machine-readable name of the kind.
    pub fn code(&self) -> &'static str {
        match self {
            VaultError::Unauthorized => "UNAUTHORIZED",
            VaultError::Conflict(_) => "CONFLICT",
            VaultError::NotFound(_) => "NOT_FOUND",
            VaultError::StorageFailure(_) => "STORAGE_FAILURE",
            VaultError::InvalidInput(_) => "INVALID_INPUT",
        }
    }

    /// Any store error that has no more specific meaning at the call site.
    pub(crate) fn storage(err: StoreError) -> Self {
        match err {
            StoreError::DeadlineExceeded => VaultError::StorageFailure("deadline exceeded".into()),
            other => VaultError::StorageFailure(other.to_string()),
        }
    }
}

impl From<CredentialsError> for VaultError {
    fn from(err: CredentialsError) -> Self {
        VaultError::InvalidInput(err.to_string())
    }
}
