// Obscura — Account Store
//
// Durable table of accounts keyed by a unique address. Passwords are stored
// as Argon2id hashes; lookups fetch the hash by address and verify it in
// Rust, outside the connection lock.
//
// `resolve_id` collapses every mismatch (unknown address, wrong password)
// into `None`, so callers cannot tell which half was wrong.

use std::sync::Arc;

use rusqlite::{params, OptionalExtension};

use crate::credentials::SecretHasher;
use crate::deadline::Deadline;

use super::db::Database;
use super::error::{violated_constraint, Constraint};
use super::models::{now_timestamp, Account};
use super::StoreError;

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over account persistence.
pub trait AccountStore: Send + Sync {
    /// Register a new account. Fails with `Conflict` if the address is taken.
    fn create(&self, address: &str, password: &str, deadline: &Deadline) -> Result<Account, StoreError>;

    /// Return the account id iff both address and password match.
    fn resolve_id(&self, address: &str, password: &str, deadline: &Deadline) -> Result<Option<i64>, StoreError>;

    /// Boolean form of `resolve_id`.
    fn exists(&self, address: &str, password: &str, deadline: &Deadline) -> Result<bool, StoreError> {
        Ok(self.resolve_id(address, password, deadline)?.is_some())
    }

    /// Replace the password of account `id`. Succeeds even if no row matches.
    fn update_password(&self, id: i64, new_password: &str, deadline: &Deadline) -> Result<(), StoreError>;

    /// Delete account `id`. Returns true iff a row was removed.
    fn delete(&self, id: i64, deadline: &Deadline) -> Result<bool, StoreError>;
}

// ─── SQLite Implementation ──────────────────────────────────────────────────

/// Argon2 work is skipped once the caller has given up.
fn check_deadline(deadline: &Deadline) -> Result<(), StoreError> {
    if deadline.is_expired() {
        return Err(StoreError::DeadlineExceeded);
    }
    Ok(())
}

pub struct SqliteAccountStore {
    db: Arc<Database>,
    hasher: Arc<dyn SecretHasher>,
}

impl SqliteAccountStore {
    pub fn new(db: Arc<Database>, hasher: Arc<dyn SecretHasher>) -> Self {
        Self { db, hasher }
    }
}

impl AccountStore for SqliteAccountStore {
    fn create(&self, address: &str, password: &str, deadline: &Deadline) -> Result<Account, StoreError> {
        check_deadline(deadline)?;
        let password_hash = self.hasher.hash(password)?;
        let (now, now_text) = now_timestamp();

        let id = self.db.with_conn(deadline, |conn| {
            let mut stmt = conn.prepare_cached(
                "INSERT INTO accounts (address, password_hash, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)",
            )?;
            match stmt.execute(params![address, password_hash, now_text]) {
                Ok(_) => Ok(conn.last_insert_rowid()),
                Err(e) if violated_constraint(&e) == Some(Constraint::Unique) => {
                    Err(StoreError::Conflict(address.to_string()))
                }
                Err(e) => Err(e.into()),
            }
        })?;

        tracing::info!(account_id = id, "Account created");

        Ok(Account {
            id,
            address: address.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    fn resolve_id(&self, address: &str, password: &str, deadline: &Deadline) -> Result<Option<i64>, StoreError> {
        let row: Option<(i64, String)> = self.db.with_conn(deadline, |conn| {
            let mut stmt =
                conn.prepare_cached("SELECT id, password_hash FROM accounts WHERE address = ?1")?;
            Ok(stmt
                .query_row(params![address], |row| Ok((row.get(0)?, row.get(1)?)))
                .optional()?)
        })?;

        check_deadline(deadline)?;
        let stored_hash = row.as_ref().map(|(_, hash)| hash.as_str());
        if self.hasher.verify(password, stored_hash)? {
            Ok(row.map(|(id, _)| id))
        } else {
            Ok(None)
        }
    }

    fn update_password(&self, id: i64, new_password: &str, deadline: &Deadline) -> Result<(), StoreError> {
        check_deadline(deadline)?;
        let password_hash = self.hasher.hash(new_password)?;
        let (_, now_text) = now_timestamp();

        let affected = self.db.with_conn(deadline, |conn| {
            let mut stmt = conn.prepare_cached(
                "UPDATE accounts SET password_hash = ?2, updated_at = ?3 WHERE id = ?1",
            )?;
            Ok(stmt.execute(params![id, password_hash, now_text])?)
        })?;

        tracing::debug!(account_id = id, affected, "Password update applied");
        Ok(())
    }

    fn delete(&self, id: i64, deadline: &Deadline) -> Result<bool, StoreError> {
        let affected = self.db.with_conn(deadline, |conn| {
            let mut stmt = conn.prepare_cached("DELETE FROM accounts WHERE id = ?1")?;
            match stmt.execute(params![id]) {
                Ok(n) => Ok(n),
                Err(e) if violated_constraint(&e) == Some(Constraint::ForeignKey) => Err(
                    StoreError::ForeignKey(format!("account {} still owns key records", id)),
                ),
                Err(e) => Err(e.into()),
            }
        })?;

        if affected == 1 {
            tracing::info!(account_id = id, "Account deleted");
        }

        Ok(affected == 1)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
