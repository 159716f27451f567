//! Persistence core for notes.
//! This crate owns the note collection and its title-uniqueness invariant.

pub mod context;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;

pub use context::{CancellationToken, Context};
pub use db::{open_db, open_db_in_memory, open_with_config, Database, DbConfig, DbError};
pub use logging::{init_logging, logging_status, LogLevel, LoggingError};
pub use model::note::{Note, NoteId};
pub use repo::error::{RepoError, RepoResult};
pub use repo::note_repo::{normalize_list_limit, NoteRepository, SqliteNoteRepository};
