// Obscura — Credential string parsing
//
// Clients authenticate every vault call with `address:password`, optionally
// prefixed with `Bearer `. The first colon splits the two halves; anything
// after it, colons included, belongs to the password.

use std::fmt;

use zeroize::Zeroizing;

use super::CredentialsError;

const BEARER_PREFIX: &str = "Bearer ";

/// A decoded (address, password) pair. The password is zeroized on drop and
/// never shown by `Debug`.
#[derive(Clone)]
pub struct Credentials {
    address: String,
    password: Zeroizing<String>,
}

impl Credentials {
    /// Build credentials from separate fields. Both must be non-empty.
    pub fn new(
        address: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, CredentialsError> {
        let address = address.into();
        let password = Zeroizing::new(password.into());

        if address.is_empty() {
            return Err(CredentialsError::EmptyAddress);
        }
        if password.is_empty() {
            return Err(CredentialsError::EmptyPassword);
        }

        Ok(Self { address, password })
    }

    /// Parse `address:password` or `Bearer address:password`.
    pub fn parse(raw: &str) -> Result<Self, CredentialsError> {
        let raw = raw.strip_prefix(BEARER_PREFIX).unwrap_or(raw);
        let (address, password) = raw.split_once(':').ok_or(CredentialsError::Malformed)?;
        Self::new(address, password)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("address", &self.address)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
