//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure connection pragmas before handing out a `Database`.
//!
//! # Invariants
//! - Returned handles have the configured busy timeout applied.
//! - Schema is not touched here; repositories declare their own.

use super::{Database, DbConfig, DbResult};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::Instant;

/// Opens a SQLite database file with default settings.
///
/// # Side effects
/// - Creates the file when missing.
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Database> {
    open_with_config(&DbConfig::file(path.as_ref()))
}

/// Opens a private in-memory database with default settings.
pub fn open_db_in_memory() -> DbResult<Database> {
    open_with_config(&DbConfig::in_memory())
}

/// Opens the database described by `config`.
pub fn open_with_config(config: &DbConfig) -> DbResult<Database> {
    let started_at = Instant::now();
    let mode = if config.path.is_some() { "file" } else { "memory" };
    info!("event=db_open module=db status=start mode={mode}");

    let opened = match config.path.as_deref() {
        Some(path) => Connection::open(path),
        None => Connection::open_in_memory(),
    };
    let conn = match opened {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    if let Err(err) = conn.busy_timeout(config.busy_timeout()) {
        error!(
            "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_bootstrap_failed error={}",
            started_at.elapsed().as_millis(),
            err
        );
        return Err(err.into());
    }

    let name = match config.path.as_deref() {
        Some(path) => path.display().to_string(),
        None => ":memory:".to_string(),
    };
    info!(
        "event=db_open module=db status=ok mode={mode} duration_ms={}",
        started_at.elapsed().as_millis()
    );
    Ok(Database::with_name(name, config.busy_timeout(), conn))
}
