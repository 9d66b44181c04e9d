// Obscura — Vault Module
//
// The credential-gated workflow: every key operation re-verifies the
// caller's address and password before touching storage.

mod error;
mod gate;
mod service;

pub use error::VaultError;
pub use gate::{AccountId, AuthorizationGate};
pub use service::VaultService;
