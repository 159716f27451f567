//! Domain model for persisted notes.
//!
//! # Invariants
//! - Every note is identified by a stable, never-reused `NoteId`.
//! - `created_at <= updated_at` for every note read back from storage.

pub mod note;
