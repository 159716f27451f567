#![allow(dead_code)]

use notes_core::{open_with_config, Database, DbConfig, Note, SqliteNoteRepository};
use std::path::PathBuf;
use tempfile::TempDir;
use uuid::Uuid;

/// One throwaway on-disk store per test, removed on drop.
pub struct TestStore {
    pub db: Database,
    /// Store file, `None` for in-memory configs.
    pub path: Option<PathBuf>,
    pub repo: SqliteNoteRepository,
    _dir: TempDir,
}

impl TestStore {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir
            .path()
            .join(format!("notes_test_{}.db", Uuid::now_v7().simple()));
        Self::with_config(dir, DbConfig::file(path))
    }

    pub fn with_config(dir: TempDir, config: DbConfig) -> Self {
        let db = open_with_config(&config).unwrap();
        let repo = SqliteNoteRepository::try_new(db.clone()).unwrap();
        Self {
            db,
            path: config.path,
            repo,
            _dir: dir,
        }
    }
}

pub fn titles(notes: &[Note]) -> Vec<&str> {
    notes.iter().map(|note| note.title.as_str()).collect()
}
