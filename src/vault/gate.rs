// Obscura — Authorization Gate
//
// Turns an (address, password) pair into a verified account id. Runs fresh
// on every vault call; nothing is cached between calls.

use std::fmt;
use std::sync::Arc;

use crate::credentials::Credentials;
use crate::deadline::Deadline;
use crate::store::AccountStore;

use super::VaultError;

/// A positive account id that passed credential verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccountId(i64);

impl AccountId {
    /// `None` for ids that can never belong to a stored account.
    pub fn new(raw: i64) -> Option<Self> {
        (raw > 0).then_some(Self(raw))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub struct AuthorizationGate {
    accounts: Arc<dyn AccountStore>,
}

impl AuthorizationGate {
    pub fn new(accounts: Arc<dyn AccountStore>) -> Self {
        Self { accounts }
    }

    /// Resolve credentials to an account id.
    ///
    /// Unknown address and wrong password are both `Unauthorized`; a failing
    /// store call is `StorageFailure`.
    pub fn authorize(&self, credentials: &Credentials, deadline: &Deadline) -> Result<AccountId, VaultError> {
        let resolved = self
            .accounts
            .resolve_id(credentials.address(), credentials.password(), deadline)
            .map_err(VaultError::storage)?;

        resolved.and_then(AccountId::new).ok_or(VaultError::Unauthorized)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
