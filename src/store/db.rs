// Obscura — SQLite Connection Pool
//
// A fixed set of rusqlite connections, each behind its own mutex, shared by
// every request. Each connection keeps its own prepared-statement cache.
// Foreign keys are enabled per connection (SQLite defaults them off).
//
// Every checkout is bounded by the caller's deadline: waiting for a free
// connection, waiting on SQLite locks, and executing the statement itself.

use std::ops::Deref;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use rusqlite::Connection;

use crate::deadline::Deadline;

use super::error::is_deadline_abort;
use super::StoreError;

/// SQLite VM instructions between deadline checks.
const PROGRESS_OPS: i32 = 1_000;

/// Prepared statements kept per connection.
const STATEMENT_CACHE_CAPACITY: usize = 32;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS accounts (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        address         TEXT NOT NULL UNIQUE,
        password_hash   TEXT NOT NULL,
        created_at      TEXT NOT NULL,
        updated_at      TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS key_records (
        id              TEXT PRIMARY KEY,
        account_id      INTEGER NOT NULL REFERENCES accounts(id),
        address         TEXT NOT NULL,
        encrypted_key   BLOB NOT NULL,
        key_iv          BLOB NOT NULL,
        encrypted_data  BLOB NOT NULL,
        data_iv         BLOB NOT NULL,
        created_at      TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_key_records_account
        ON key_records(account_id, created_at);
";

/// Pool of SQLite connections to one database.
pub struct Database {
    conns: Vec<Mutex<Connection>>,
    next: AtomicUsize,
    /// Configured ceiling for SQLite lock waits.
    busy_timeout: Duration,
    /// Held while scanning for an idle connection and while signalling a
    /// release, so a waiter cannot miss a wakeup.
    waiters: Mutex<()>,
    released: Condvar,
}

/// A checked-out connection. Returning it wakes one waiting checkout.
pub struct PooledConn<'a> {
    guard: Option<MutexGuard<'a, Connection>>,
    pool: &'a Database,
}

impl Deref for PooledConn<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        match &self.guard {
            Some(guard) => guard,
            None => unreachable!("connection guard is only taken on drop"),
        }
    }
}

impl Drop for PooledConn<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let _waiters = self.pool.waiters.lock();
        self.pool.released.notify_one();
    }
}

impl Database {
    /// Open (or create) the database file at `path` with `pool_size`
    /// connections, then run migrations.
    pub fn open(path: &Path, pool_size: usize, busy_timeout: Duration) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut conns = Vec::with_capacity(pool_size.max(1));
        for _ in 0..pool_size.max(1) {
            let conn = Connection::open(path)?;
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
            Self::configure(&conn, busy_timeout)?;
            conns.push(Mutex::new(conn));
        }

        let db = Self::from_conns(conns, busy_timeout);
        db.run_migrations()?;

        tracing::debug!(path = %path.display(), pool_size = db.pool_size(), "Database opened");
        Ok(db)
    }

    /// Open a single-connection in-memory database (for testing only).
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let busy_timeout = Duration::from_secs(5);
        let conn = Connection::open_in_memory()?;
        Self::configure(&conn, busy_timeout)?;
        let db = Self::from_conns(vec![Mutex::new(conn)], busy_timeout);
        db.run_migrations()?;
        Ok(db)
    }

    fn from_conns(conns: Vec<Mutex<Connection>>, busy_timeout: Duration) -> Self {
        Self {
            conns,
            next: AtomicUsize::new(0),
            busy_timeout,
            waiters: Mutex::new(()),
            released: Condvar::new(),
        }
    }

    pub fn pool_size(&self) -> usize {
        self.conns.len()
    }

    /// Lock one connection directly, bypassing deadlines (tests only).
    #[cfg(test)]
    pub fn conn(&self) -> PooledConn<'_> {
        PooledConn {
            guard: Some(self.conns[0].lock()),
            pool: self,
        }
    }

    /// Run `f` on a pooled connection, bounded by `deadline`.
    ///
    /// A statement still running when the deadline passes is interrupted;
    /// SQLite rolls that statement back, so no partial write survives.
    pub fn with_conn<T, F>(&self, deadline: &Deadline, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self.checkout(deadline)?;
        let remaining = deadline.remaining().ok_or(StoreError::DeadlineExceeded)?;
        conn.busy_timeout(remaining.min(self.busy_timeout))?;

        let cutoff = deadline.instant();
        conn.progress_handler(PROGRESS_OPS, Some(move || Instant::now() >= cutoff));
        let result = f(&conn);
        conn.progress_handler(0, None::<fn() -> bool>);

        result.map_err(|err| match err {
            StoreError::Database(ref e) if is_deadline_abort(e) => StoreError::DeadlineExceeded,
            other => other,
        })
    }

    /// Take an idle connection, waiting until the deadline for any of them
    /// to be returned.
    fn checkout(&self, deadline: &Deadline) -> Result<PooledConn<'_>, StoreError> {
        if let Some(guard) = self.try_checkout() {
            return Ok(self.pooled(guard));
        }

        let mut waiters = self.waiters.lock();
        loop {
            if let Some(guard) = self.try_checkout() {
                return Ok(self.pooled(guard));
            }
            if self.released.wait_until(&mut waiters, deadline.instant()).timed_out() {
                return self
                    .try_checkout()
                    .map(|guard| self.pooled(guard))
                    .ok_or(StoreError::DeadlineExceeded);
            }
        }
    }

    fn try_checkout(&self) -> Option<MutexGuard<'_, Connection>> {
        let n = self.conns.len();
        let start = self.next.fetch_add(1, Ordering::Relaxed) % n;
        (0..n).find_map(|offset| self.conns[(start + offset) % n].try_lock())
    }

    fn pooled<'a>(&'a self, guard: MutexGuard<'a, Connection>) -> PooledConn<'a> {
        PooledConn {
            guard: Some(guard),
            pool: self,
        }
    }

    fn configure(conn: &Connection, busy_timeout: Duration) -> Result<(), StoreError> {
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.busy_timeout(busy_timeout)?;
        conn.set_prepared_statement_cache_capacity(STATEMENT_CACHE_CAPACITY);
        Ok(())
    }

    /// Create tables and indexes if missing. Idempotent.
    fn run_migrations(&self) -> Result<(), StoreError> {
        self.conns[0].lock().execute_batch(SCHEMA)?;
        tracing::debug!("Database migrations completed successfully");
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
