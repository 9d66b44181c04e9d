// Obscura — Store Module
//
// SQLite persistence for accounts and their client-encrypted key records.
// Both stores share one connection pool and take a deadline on every call.

mod accounts;
mod db;
mod error;
mod keys;
mod models;

pub use accounts::{AccountStore, SqliteAccountStore};
pub use db::Database;
pub use error::StoreError;
pub use keys::{KeyStore, SqliteKeyStore};
pub use models::{Account, DeleteOutcome, KeyPayload, KeyRecord};
