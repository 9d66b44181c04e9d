// Obscura — Row models
//
// Key material is opaque to the server: the four byte fields of a record are
// stored and returned exactly as the client sent them. `Debug` shows only
// their lengths.

use std::fmt;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A registered account. The password hash never leaves the store.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Account {
    pub id: i64,
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Client-encrypted material submitted for storage.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPayload {
    pub encrypted_key: Vec<u8>,
    pub key_iv: Vec<u8>,
    pub encrypted_data: Vec<u8>,
    pub data_iv: Vec<u8>,
}

impl fmt::Debug for KeyPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPayload")
            .field("encrypted_key", &ByteLen(&self.encrypted_key))
            .field("key_iv", &ByteLen(&self.key_iv))
            .field("encrypted_data", &ByteLen(&self.encrypted_data))
            .field("data_iv", &ByteLen(&self.data_iv))
            .finish()
    }
}

/// A stored record, owned by exactly one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRecord {
    pub id: Uuid,
    pub account_id: i64,
    /// Copy of the owner's address at insert time.
    pub address: String,
    pub payload: KeyPayload,
    pub created_at: DateTime<Utc>,
}

/// Result of an ownership-scoped delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The record existed under the given account and is gone.
    Deleted,
    /// The record exists but belongs to another account. Nothing changed.
    NotOwned,
    /// No record has this id.
    Missing,
}

struct ByteLen<'a>(&'a [u8]);

impl fmt::Debug for ByteLen<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} bytes>", self.0.len())
    }
}

// ─── Timestamps ──────────────────────────────────────────────────────────────

/// Current time as fixed-width RFC 3339 (microseconds, `Z`), so text order
/// matches chronological order in SQL. The returned instant is truncated to
/// the stored precision so it equals what a later read parses back.
pub(crate) fn now_timestamp() -> (DateTime<Utc>, String) {
    let now = Utc::now().trunc_subsecs(6);
    let text = now.to_rfc3339_opts(SecondsFormat::Micros, true);
    (now, text)
}

pub(crate) fn parse_timestamp(idx: usize, text: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> KeyPayload {
        KeyPayload {
            encrypted_key: b"wrapped-key-material".to_vec(),
            key_iv: vec![1; 12],
            encrypted_data: b"ciphertext".to_vec(),
            data_iv: vec![2; 12],
        }
    }

    #[test]
    fn test_payload_debug_shows_lengths_only() {
        let debug = format!("{:?}", payload());
        assert!(debug.contains("<20 bytes>"));
        assert!(debug.contains("<12 bytes>"));
        assert!(!debug.contains("ciphertext"));
    }

    #[test]
    fn test_record_debug_hides_payload_bytes() {
        let record = KeyRecord {
            id: Uuid::new_v4(),
            account_id: 7,
            address: "0xabc".to_string(),
            payload: payload(),
            created_at: Utc::now(),
        };
        let debug = format!("{:?}", record);
        assert!(debug.contains("0xabc"));
        assert!(!debug.contains("wrapped-key-material"));
    }

    #[test]
    fn test_timestamps_sort_lexically() {
        let (_, first) = now_timestamp();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let (_, second) = now_timestamp();
        assert!(first < second);
        assert_eq!(first.len(), second.len());
        assert!(first.ends_with('Z'));
    }

    #[test]
    fn test_parse_timestamp_roundtrip_and_error() {
        let (now, text) = now_timestamp();
        assert_eq!(parse_timestamp(0, &text).unwrap(), now);
        assert!(parse_timestamp(3, "yesterday").is_err());
    }
}
