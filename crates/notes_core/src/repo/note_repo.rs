//! Note repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Create, fetch and list notes over the shared `Database` handle.
//! - Declare the `notes` collection and its unique title index on startup.
//! - Translate store failures into `RepoError` kinds.
//!
//! # Invariants
//! - Title uniqueness is enforced by the `notes_title_unique` index only;
//!   writes never pre-check for an existing title.
//! - Listing order is `created_at DESC, id DESC`, a total order.
//! - Every call honors its `Context` before and while the store runs.

use crate::context::Context;
use crate::db::{Database, DbError};
use crate::model::note::{normalize_title, now_millis, Note, NoteId};
use crate::repo::error::{RepoError, RepoResult};
use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{ffi, params, params_from_iter, Connection, ErrorCode, Row};
use std::time::{Duration, Instant};

const NOTE_SELECT_SQL: &str = "SELECT
    id,
    title,
    content,
    created_at,
    updated_at
FROM notes";

const NOTES_SCHEMA_SQL: &str = "CREATE TABLE IF NOT EXISTS notes (
    id TEXT PRIMARY KEY NOT NULL,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS notes_title_unique ON notes (title);
CREATE INDEX IF NOT EXISTS notes_created_at_id ON notes (created_at DESC, id DESC);";

const TITLE_INDEX: &str = "notes_title_unique";
const LIST_DEFAULT_LIMIT: i64 = 20;
/// VM instructions between cancellation checks.
const PROGRESS_CHECK_OPS: i32 = 1_000;

/// Repository interface for note persistence.
pub trait NoteRepository: Send + Sync {
    /// Persists a new note and returns it as stored.
    fn create(&self, ctx: &Context, title: &str, content: &str) -> RepoResult<Note>;
    /// Fetches one note by its external id string.
    fn by_id(&self, ctx: &Context, id: &str) -> RepoResult<Note>;
    /// Lists notes newest first, optionally filtered by title substring.
    ///
    /// `limit <= 0` uses the default page size (20); any positive `limit`
    /// is honored as given. `offset < 0` is treated as 0.
    fn list(&self, ctx: &Context, search: &str, limit: i64, offset: i64) -> RepoResult<Vec<Note>>;
    /// Counts notes matching the same filter as `list`.
    fn count(&self, ctx: &Context, search: &str) -> RepoResult<u64>;
}

/// SQLite-backed note repository. Clones share the same handle.
#[derive(Debug, Clone)]
pub struct SqliteNoteRepository {
    db: Database,
}

impl SqliteNoteRepository {
    /// Binds the repository to `db`, declaring the `notes` schema.
    ///
    /// Idempotent for an already-initialized store.
    ///
    /// # Errors
    /// - `RepoError::Initialization` when the table or unique title index
    ///   cannot be created (e.g. existing rows already share a title), or
    ///   when an index with the expected name is not unique.
    pub fn try_new(db: Database) -> RepoResult<Self> {
        let started_at = Instant::now();
        let result = ensure_notes_schema(&db).map_err(RepoError::Initialization);
        log_outcome("notes_schema_ensure", started_at, &result);
        result?;
        Ok(Self { db })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Runs `op` on the shared connection under `ctx`.
    ///
    /// While `op` runs, the store polls `ctx` and aborts the running
    /// statement once it is cancelled or past its deadline. Waiting on a
    /// locked store is bounded by the time left until the deadline.
    fn with_conn<T>(
        &self,
        ctx: &Context,
        op: impl FnOnce(&Connection) -> RepoResult<T>,
    ) -> RepoResult<T> {
        ctx.check()?;
        let conn = self.db.lock();
        ctx.check()?;

        let configured_wait = self.db.busy_timeout();
        let bounded_wait = busy_wait_within_deadline(configured_wait, ctx);
        if bounded_wait != configured_wait {
            conn.busy_timeout(bounded_wait)?;
        }
        conn.progress_handler(PROGRESS_CHECK_OPS, Some(ctx.interrupt_check()));
        let result = op(&conn);
        conn.progress_handler(0, None::<fn() -> bool>);
        let restored = if bounded_wait != configured_wait {
            conn.busy_timeout(configured_wait)
        } else {
            Ok(())
        };

        let result = result.map_err(|err| match err {
            RepoError::Storage(DbError::Sqlite(source)) if is_interrupted(&source) => {
                ctx.interruption()
            }
            RepoError::Storage(DbError::Sqlite(source))
                if is_busy(&source) && (ctx.is_expired() || ctx.is_cancelled()) =>
            {
                ctx.interruption()
            }
            other => other,
        })?;
        restored?;
        Ok(result)
    }
}

impl NoteRepository for SqliteNoteRepository {
    fn create(&self, ctx: &Context, title: &str, content: &str) -> RepoResult<Note> {
        let started_at = Instant::now();
        let result = normalize_title(title)
            .ok_or(RepoError::BlankTitle)
            .and_then(|title| {
                self.with_conn(ctx, |conn| {
                    let now = now_millis();
                    let note = Note {
                        id: NoteId::generate(),
                        title: title.to_string(),
                        content: content.to_string(),
                        created_at: now,
                        updated_at: now,
                    };
                    insert_note(conn, &note)?;
                    Ok(note)
                })
            });
        log_outcome("note_create", started_at, &result);
        result
    }

    fn by_id(&self, ctx: &Context, id: &str) -> RepoResult<Note> {
        let started_at = Instant::now();
        let result = NoteId::parse(id)
            .map_err(|source| RepoError::InvalidId {
                value: id.to_string(),
                source,
            })
            .and_then(|id| self.with_conn(ctx, |conn| get_note(conn, id)));
        log_outcome("note_get", started_at, &result);
        result
    }

    fn list(&self, ctx: &Context, search: &str, limit: i64, offset: i64) -> RepoResult<Vec<Note>> {
        let started_at = Instant::now();
        let limit = normalize_list_limit(limit);
        let offset = offset.max(0);
        let pattern = title_search_pattern(search);

        let result = self.with_conn(ctx, |conn| {
            let mut sql = String::from(NOTE_SELECT_SQL);
            let mut bind_values: Vec<Value> = Vec::new();
            push_title_filter(&mut sql, &mut bind_values, pattern.as_deref());

            sql.push_str(" ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?;");
            bind_values.push(Value::Integer(limit));
            bind_values.push(Value::Integer(offset));

            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(bind_values))?;
            let mut notes = Vec::new();
            while let Some(row) = rows.next()? {
                notes.push(parse_note_row(row)?);
            }
            Ok(notes)
        });

        match &result {
            Ok(notes) => debug!(
                "event=note_list module=repo status=ok duration_ms={} limit={} offset={} filtered={} returned={}",
                started_at.elapsed().as_millis(),
                limit,
                offset,
                pattern.is_some(),
                notes.len()
            ),
            Err(_) => log_outcome("note_list", started_at, &result),
        }
        result
    }

    fn count(&self, ctx: &Context, search: &str) -> RepoResult<u64> {
        let started_at = Instant::now();
        let pattern = title_search_pattern(search);

        let result = self.with_conn(ctx, |conn| {
            let mut sql = String::from("SELECT COUNT(*) FROM notes");
            let mut bind_values: Vec<Value> = Vec::new();
            push_title_filter(&mut sql, &mut bind_values, pattern.as_deref());
            sql.push(';');

            let total: i64 =
                conn.query_row(&sql, params_from_iter(bind_values), |row| row.get(0))?;
            u64::try_from(total).map_err(|_| {
                RepoError::from(DbError::InvalidData(format!(
                    "negative note count `{total}`"
                )))
            })
        });
        log_outcome("note_count", started_at, &result);
        result
    }
}

/// Normalizes a requested page size: non-positive -> 20, otherwise as given.
pub fn normalize_list_limit(limit: i64) -> i64 {
    if limit <= 0 {
        LIST_DEFAULT_LIMIT
    } else {
        limit
    }
}

/// Busy wait allowed for one call: the configured timeout, cut short by
/// the context deadline. One extra millisecond makes sure the deadline has
/// passed by the time SQLite gives up.
fn busy_wait_within_deadline(configured: Duration, ctx: &Context) -> Duration {
    match ctx.deadline() {
        Some(deadline) => {
            let remaining = deadline.saturating_duration_since(Instant::now());
            configured.min(remaining + Duration::from_millis(1))
        }
        None => configured,
    }
}

fn ensure_notes_schema(db: &Database) -> Result<(), DbError> {
    let mut conn = db.lock();
    let tx = conn.transaction()?;
    tx.execute_batch(NOTES_SCHEMA_SQL)?;
    if !index_is_unique(&tx, "notes", TITLE_INDEX)? {
        return Err(DbError::InvalidData(format!(
            "index `{TITLE_INDEX}` exists but does not enforce uniqueness"
        )));
    }
    let columns = index_columns(&tx, TITLE_INDEX)?;
    if columns != ["title"] {
        return Err(DbError::InvalidData(format!(
            "index `{TITLE_INDEX}` covers {columns:?} instead of `title`"
        )));
    }
    tx.commit()?;
    Ok(())
}

fn index_is_unique(conn: &Connection, table: &str, index: &str) -> Result<bool, DbError> {
    let mut stmt = conn.prepare(&format!("PRAGMA index_list({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get("name")?;
        if name == index {
            let unique: i64 = row.get("unique")?;
            return Ok(unique == 1);
        }
    }
    Ok(false)
}

fn index_columns(conn: &Connection, index: &str) -> Result<Vec<String>, DbError> {
    let mut stmt = conn.prepare(&format!("PRAGMA index_info({index});"))?;
    let mut rows = stmt.query([])?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next()? {
        columns.push(row.get::<_, Option<String>>("name")?.unwrap_or_default());
    }
    Ok(columns)
}

fn insert_note(conn: &Connection, note: &Note) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO notes (
            id,
            title,
            content,
            created_at,
            updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5);",
        params![
            note.id.to_string(),
            note.title.as_str(),
            note.content.as_str(),
            note.created_at.timestamp_millis(),
            note.updated_at.timestamp_millis(),
        ],
    )
    .map_err(|err| {
        if is_unique_violation(&err) {
            RepoError::DuplicateTitle {
                title: note.title.clone(),
            }
        } else {
            err.into()
        }
    })?;
    Ok(())
}

fn get_note(conn: &Connection, id: NoteId) -> RepoResult<Note> {
    let mut stmt = conn.prepare(&format!("{NOTE_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return parse_note_row(row);
    }

    Err(RepoError::NotFound)
}

fn parse_note_row(row: &Row<'_>) -> RepoResult<Note> {
    let id_text: String = row.get("id")?;
    let id = NoteId::parse(&id_text).map_err(|_| {
        DbError::InvalidData(format!("invalid note id `{id_text}` in notes.id"))
    })?;

    let created_at = parse_millis(row.get("created_at")?, "created_at")?;
    let updated_at = parse_millis(row.get("updated_at")?, "updated_at")?;
    if updated_at < created_at {
        return Err(DbError::InvalidData(format!(
            "note {id} has updated_at earlier than created_at"
        ))
        .into());
    }

    Ok(Note {
        id,
        title: row.get("title")?,
        content: row.get("content")?,
        created_at,
        updated_at,
    })
}

fn parse_millis(value: i64, column: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::from_timestamp_millis(value).ok_or_else(|| {
        DbError::InvalidData(format!("timestamp `{value}` out of range in notes.{column}"))
    })
}

/// `LIKE` pattern for a case-insensitive title substring match.
///
/// Returns `None` for a blank term, meaning no filter.
fn title_search_pattern(search: &str) -> Option<String> {
    let trimmed = search.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(format!("%{}%", escape_like_pattern(trimmed)))
}

fn escape_like_pattern(value: &str) -> String {
    value
        .replace('\\', r"\\")
        .replace('%', r"\%")
        .replace('_', r"\_")
}

fn push_title_filter(sql: &mut String, bind_values: &mut Vec<Value>, pattern: Option<&str>) {
    if let Some(pattern) = pattern {
        sql.push_str(" WHERE title LIKE ? ESCAPE '\\'");
        bind_values.push(Value::Text(pattern.to_string()));
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    err.sqlite_error()
        .is_some_and(|err| err.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE)
}

fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

fn is_interrupted(err: &rusqlite::Error) -> bool {
    err.sqlite_error_code() == Some(ErrorCode::OperationInterrupted)
}

fn log_outcome<T>(event: &str, started_at: Instant, result: &RepoResult<T>) {
    match result {
        Ok(_) => debug!(
            "event={event} module=repo status=ok duration_ms={}",
            started_at.elapsed().as_millis()
        ),
        Err(err) => debug!(
            "event={event} module=repo status=error duration_ms={} error_code={}",
            started_at.elapsed().as_millis(),
            err.code()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        busy_wait_within_deadline, escape_like_pattern, normalize_list_limit,
        title_search_pattern, NoteRepository, SqliteNoteRepository,
    };
    use crate::context::{CancellationToken, Context};
    use crate::db::open_db_in_memory;
    use crate::repo::error::RepoError;
    use std::thread;
    use std::time::{Duration, Instant};

    const SLOW_QUERY_SQL: &str = "WITH RECURSIVE counter(x) AS (
        SELECT 1
        UNION ALL
        SELECT x + 1 FROM counter WHERE x < 1000000000
    )
    SELECT COUNT(*) FROM counter;";

    fn repo() -> SqliteNoteRepository {
        SqliteNoteRepository::try_new(open_db_in_memory().unwrap()).unwrap()
    }

    fn run_slow_query(repo: &SqliteNoteRepository, ctx: &Context) -> Result<i64, RepoError> {
        repo.with_conn(ctx, |conn| {
            Ok(conn.query_row(SLOW_QUERY_SQL, [], |row| row.get(0))?)
        })
    }

    #[test]
    fn list_limit_defaults_when_non_positive() {
        assert_eq!(normalize_list_limit(0), 20);
        assert_eq!(normalize_list_limit(-5), 20);
        assert_eq!(normalize_list_limit(7), 7);
        assert_eq!(normalize_list_limit(150), 150);
        assert_eq!(normalize_list_limit(10_000), 10_000);
    }

    #[test]
    fn busy_wait_is_bounded_by_deadline() {
        let configured = Duration::from_secs(5);
        assert_eq!(
            busy_wait_within_deadline(configured, &Context::background()),
            configured
        );

        let near = Context::with_timeout(Duration::from_millis(100));
        let bounded = busy_wait_within_deadline(configured, &near);
        assert!(bounded <= Duration::from_millis(101));

        let elapsed = Context::with_deadline(Instant::now());
        assert_eq!(
            busy_wait_within_deadline(configured, &elapsed),
            Duration::from_millis(1)
        );
    }

    #[test]
    fn search_pattern_escapes_like_wildcards() {
        assert_eq!(escape_like_pattern(r"50%_off\"), r"50\%\_off\\");
        assert_eq!(title_search_pattern("  "), None);
        assert_eq!(title_search_pattern(" Note ").as_deref(), Some("%Note%"));
    }

    #[test]
    fn running_statement_is_aborted_at_deadline() {
        let repo = repo();
        let ctx = Context::with_timeout(Duration::from_millis(50));
        let err = run_slow_query(&repo, &ctx).unwrap_err();
        assert!(matches!(err, RepoError::Timeout), "unexpected error: {err}");

        // Handler is removed afterwards; the connection stays usable.
        let count = repo.count(&Context::background(), "").unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn running_statement_is_aborted_on_cancel() {
        let repo = repo();
        let token = CancellationToken::new();
        let ctx = Context::background().with_cancellation(token.clone());

        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            token.cancel();
        });
        let err = run_slow_query(&repo, &ctx).unwrap_err();
        canceller.join().unwrap();

        assert!(matches!(err, RepoError::Cancelled), "unexpected error: {err}");
    }

    #[test]
    fn repository_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync + Clone>() {}
        assert_send_sync::<SqliteNoteRepository>();
    }

    #[test]
    fn create_rejects_blank_title_before_touching_store() {
        let repo = repo();
        let err = repo
            .create(&Context::background(), "   ", "body")
            .unwrap_err();
        assert!(matches!(err, RepoError::BlankTitle));
        assert_eq!(repo.count(&Context::background(), "").unwrap(), 0);
    }
}
