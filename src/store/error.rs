// Obscura — Store error types

use thiserror::Error;

use crate::credentials::HashError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Address already registered: {0}")]
    Conflict(String),

    #[error("Foreign key constraint failed: {0}")]
    ForeignKey(String),

    #[error("Account {0} no longer exists")]
    MissingOwner(i64),

    #[error("Deadline exceeded before the store call completed")]
    DeadlineExceeded,

    #[error("Password hashing error: {0}")]
    Hashing(#[from] HashError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which integrity constraint a failed statement tripped, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Constraint {
    Unique,
    ForeignKey,
}

pub(crate) fn violated_constraint(err: &rusqlite::Error) -> Option<Constraint> {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => match e.extended_code {
            rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                Some(Constraint::Unique)
            }
            rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Some(Constraint::ForeignKey),
            _ => None,
        },
        _ => None,
    }
}

/// True when SQLite gave up because of the progress handler or a lock wait
/// outlasting `busy_timeout`.
pub(crate) fn is_deadline_abort(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(
                e.code,
                rusqlite::ErrorCode::OperationInterrupted | rusqlite::ErrorCode::DatabaseBusy
            )
    )
}
