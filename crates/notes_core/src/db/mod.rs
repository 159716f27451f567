//! Shared database handle and SQLite connection bootstrap.
//!
//! # Responsibility
//! - Wrap one configured SQLite connection in a cloneable, thread-safe handle.
//! - Apply connection pragmas before any repository touches the store.
//!
//! # Invariants
//! - A `Database` is live for as long as any clone of it exists.
//! - The inner connection lock is only held for the span of one operation.
//!
//! # See also
//! - `crate::repo::note_repo` for the schema the repository declares.

use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rusqlite::Connection;

mod config;
mod open;

pub use config::DbConfig;
pub use open::{open_db, open_db_in_memory, open_with_config};

pub type DbResult<T> = Result<T, DbError>;

/// Storage-level failure raised below the repository boundary.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("{0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Persisted row cannot be decoded into the domain model.
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
    #[error("invalid database config: {0}")]
    InvalidConfig(String),
}

/// Cloneable handle to one logical notes database.
#[derive(Clone)]
pub struct Database {
    name: Arc<str>,
    busy_timeout: Duration,
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Wraps an already-open connection supplied by the caller.
    ///
    /// No pragmas are applied; the caller owns the connection setup. The
    /// busy timeout is assumed to be rusqlite's default (the `DbConfig`
    /// default) and is restored to it after a deadline-bounded call.
    pub fn from_connection(conn: Connection) -> Self {
        let name = conn
            .path()
            .filter(|path| !path.is_empty())
            .unwrap_or(":memory:")
            .to_string();
        Self::with_name(name, DbConfig::default().busy_timeout(), conn)
    }

    pub(crate) fn with_name(
        name: impl Into<String>,
        busy_timeout: Duration,
        conn: Connection,
    ) -> Self {
        Self {
            name: Arc::from(name.into()),
            busy_timeout,
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Logical database name: the file path, or `:memory:`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Longest wait on a locked store when the caller sets no deadline.
    pub fn busy_timeout(&self) -> Duration {
        self.busy_timeout
    }

    /// Acquires the connection for one operation.
    ///
    /// A poisoned lock is recovered; each statement is atomic in SQLite.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Debug for Database {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("busy_timeout", &self.busy_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::Database;
    use rusqlite::Connection;

    #[test]
    fn from_connection_names_in_memory_store() {
        let db = Database::from_connection(Connection::open_in_memory().unwrap());
        assert_eq!(db.name(), ":memory:");
    }

    #[test]
    fn clones_share_one_connection() {
        let db = Database::from_connection(Connection::open_in_memory().unwrap());
        let clone = db.clone();
        db.lock()
            .execute_batch("CREATE TABLE shared_marker (x INTEGER);")
            .unwrap();
        let exists: i64 = clone
            .lock()
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE name = 'shared_marker');",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(exists, 1);
    }
}
