//! Repository error taxonomy.
//!
//! Backend failures are translated here into kinds callers can match on;
//! anything untranslatable stays available through `source()`.

use crate::db::DbError;
use rusqlite::ErrorCode;

pub type RepoResult<T> = Result<T, RepoError>;

/// Error returned by every `NoteRepository` operation.
///
/// Match on the variant, never on the rendered message.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("note title must not be blank")]
    BlankTitle,
    /// Another note already owns this title.
    #[error("note title `{title}` already exists")]
    DuplicateTitle { title: String },
    /// Sentinel for lookups that matched nothing.
    #[error("note not found")]
    NotFound,
    #[error("invalid note id `{value}`")]
    InvalidId {
        value: String,
        #[source]
        source: uuid::Error,
    },
    /// Connectivity, query or decoding failure in the store. May be transient.
    #[error("storage error: {0}")]
    Storage(#[from] DbError),
    #[error("operation cancelled")]
    Cancelled,
    #[error("operation deadline exceeded")]
    Timeout,
    /// Required schema or unique index could not be established.
    #[error("failed to initialize note storage: {0}")]
    Initialization(#[source] DbError),
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(DbError::Sqlite(value))
    }
}

impl RepoError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Whether retrying the same call later may succeed.
    ///
    /// Only lock contention and I/O failures qualify.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Storage(DbError::Sqlite(err)) => matches!(
                err.sqlite_error_code(),
                Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::SystemIoFailure)
            ),
            _ => false,
        }
    }

    /// Stable metadata-only code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BlankTitle => "blank_title",
            Self::DuplicateTitle { .. } => "duplicate_title",
            Self::NotFound => "not_found",
            Self::InvalidId { .. } => "invalid_id",
            Self::Storage(_) => "storage",
            Self::Cancelled => "cancelled",
            Self::Timeout => "timeout",
            Self::Initialization(_) => "initialization",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RepoError;
    use crate::db::DbError;
    use rusqlite::ffi;
    use std::error::Error;

    fn sqlite_failure(code: i32) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(ffi::Error::new(code), None)
    }

    #[test]
    fn not_found_is_matched_by_kind() {
        let err = RepoError::NotFound;
        assert!(err.is_not_found());
        assert!(!RepoError::Cancelled.is_not_found());
    }

    #[test]
    fn busy_store_is_retryable_but_constraint_is_not() {
        assert!(RepoError::from(sqlite_failure(ffi::SQLITE_BUSY)).is_retryable());
        assert!(!RepoError::from(sqlite_failure(ffi::SQLITE_CONSTRAINT)).is_retryable());
        assert!(!RepoError::Timeout.is_retryable());
    }

    #[test]
    fn storage_error_keeps_original_cause() {
        let err = RepoError::from(sqlite_failure(ffi::SQLITE_IOERR));
        let source = err.source().expect("storage error should expose its cause");
        assert!(source.downcast_ref::<DbError>().is_some());
    }

    #[test]
    fn invalid_id_exposes_parse_error() {
        let source = uuid::Uuid::parse_str("nope").unwrap_err();
        let err = RepoError::InvalidId {
            value: "nope".to_string(),
            source,
        };
        assert_eq!(err.code(), "invalid_id");
        assert!(err.source().is_some());
        assert!(err.to_string().contains("nope"));
    }
}
