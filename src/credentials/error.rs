// Obscura — Credentials error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("Invalid Argon2 parameters: {0}")]
    Params(String),

    #[error("Password hashing failed: {0}")]
    Hash(String),

    #[error("Stored password hash is malformed: {0}")]
    Malformed(String),
}

/// Rejections produced while decoding a credential string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialsError {
    #[error("credentials must have the form address:password")]
    Malformed,

    #[error("address must not be empty")]
    EmptyAddress,

    #[error("password must not be empty")]
    EmptyPassword,
}
