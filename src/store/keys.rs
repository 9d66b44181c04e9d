// Obscura — Key Vault Store
//
// Encrypted records scoped to an owning account. Every statement that touches
// a record names the owner in its predicate, so a record can never be read,
// inserted for, or removed by any account other than the one that owns it,
// even when an account is deleted between authorization and the statement.

use std::sync::Arc;

use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use crate::deadline::Deadline;

use super::db::Database;
use super::error::{violated_constraint, Constraint};
use super::models::{now_timestamp, parse_timestamp, DeleteOutcome, KeyPayload, KeyRecord};
use super::StoreError;

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over key record persistence.
pub trait KeyStore: Send + Sync {
    /// Store a new record for `account_id`. Fails with `MissingOwner` if the
    /// account does not exist when the statement runs.
    fn add(&self, account_id: i64, payload: &KeyPayload, deadline: &Deadline) -> Result<KeyRecord, StoreError>;

    /// All records of `account_id`, newest first.
    fn list(&self, account_id: i64, deadline: &Deadline) -> Result<Vec<KeyRecord>, StoreError>;

    /// Delete `record_id` only if it belongs to `account_id`.
    fn delete(&self, record_id: &Uuid, account_id: i64, deadline: &Deadline) -> Result<DeleteOutcome, StoreError>;
}

// ─── SQLite Implementation ──────────────────────────────────────────────────

pub struct SqliteKeyStore {
    db: Arc<Database>,
}

impl SqliteKeyStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl KeyStore for SqliteKeyStore {
    fn add(&self, account_id: i64, payload: &KeyPayload, deadline: &Deadline) -> Result<KeyRecord, StoreError> {
        let id = Uuid::new_v4();
        let (now, now_text) = now_timestamp();

        let address = self.db.with_conn(deadline, |conn| {
            let mut stmt = conn.prepare_cached(
                "INSERT INTO key_records (id, account_id, address, encrypted_key, key_iv,
                                          encrypted_data, data_iv, created_at)
                 SELECT ?1, id, address, ?3, ?4, ?5, ?6, ?7 FROM accounts WHERE id = ?2
                 RETURNING address",
            )?;
            let inserted = stmt
                .query_row(
                    params![
                        id.to_string(),
                        account_id,
                        payload.encrypted_key,
                        payload.key_iv,
                        payload.encrypted_data,
                        payload.data_iv,
                        now_text,
                    ],
                    |row| row.get::<_, String>(0),
                )
                .optional();

            match inserted {
                Ok(Some(address)) => Ok(address),
                Ok(None) => Err(StoreError::MissingOwner(account_id)),
                Err(e) if violated_constraint(&e) == Some(Constraint::ForeignKey) => {
                    Err(StoreError::MissingOwner(account_id))
                }
                Err(e) => Err(e.into()),
            }
        })?;

        tracing::info!(record_id = %id, account_id, "Key record stored");

        Ok(KeyRecord {
            id,
            account_id,
            address,
            payload: payload.clone(),
            created_at: now,
        })
    }

    fn list(&self, account_id: i64, deadline: &Deadline) -> Result<Vec<KeyRecord>, StoreError> {
        let records = self.db.with_conn(deadline, |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, account_id, address, encrypted_key, key_iv, encrypted_data,
                        data_iv, created_at
                 FROM key_records
                 WHERE account_id = ?1
                 ORDER BY created_at DESC, rowid DESC",
            )?;
            let rows = stmt.query_map(params![account_id], row_to_record)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })?;

        tracing::debug!(account_id, count = records.len(), "Key records listed");
        Ok(records)
    }

    fn delete(&self, record_id: &Uuid, account_id: i64, deadline: &Deadline) -> Result<DeleteOutcome, StoreError> {
        let id_text = record_id.to_string();

        let outcome = self.db.with_conn(deadline, |conn| {
            let mut stmt =
                conn.prepare_cached("DELETE FROM key_records WHERE id = ?1 AND account_id = ?2")?;
            if stmt.execute(params![id_text, account_id])? == 1 {
                return Ok(DeleteOutcome::Deleted);
            }

            let mut lookup =
                conn.prepare_cached("SELECT EXISTS(SELECT 1 FROM key_records WHERE id = ?1)")?;
            let exists: bool = lookup.query_row(params![id_text], |row| row.get(0))?;
            Ok(if exists {
                DeleteOutcome::NotOwned
            } else {
                DeleteOutcome::Missing
            })
        })?;

        match outcome {
            DeleteOutcome::Deleted => tracing::info!(record_id = %record_id, account_id, "Key record deleted"),
            DeleteOutcome::NotOwned => {
                tracing::warn!(record_id = %record_id, account_id, "Delete refused: record owned by another account")
            }
            DeleteOutcome::Missing => tracing::debug!(record_id = %record_id, "Delete of unknown record"),
        }

        Ok(outcome)
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<KeyRecord> {
    let id_text: String = row.get(0)?;
    let id = Uuid::parse_str(&id_text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let created_at: String = row.get(7)?;

    Ok(KeyRecord {
        id,
        account_id: row.get(1)?,
        address: row.get(2)?,
        payload: KeyPayload {
            encrypted_key: row.get(3)?,
            key_iv: row.get(4)?,
            encrypted_data: row.get(5)?,
            data_iv: row.get(6)?,
        },
        created_at: parse_timestamp(7, &created_at)?,
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
