//! Note domain model.
//!
//! # Responsibility
//! - Define the note record returned by repository reads and writes.
//! - Own the external string form of note identifiers.
//!
//! # Invariants
//! - `title` is trimmed and non-empty once persisted.
//! - Timestamps carry millisecond precision, matching storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Stable note identifier.
///
/// Backed by a UUIDv7, so identifiers sort roughly by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(Uuid);

impl NoteId {
    /// Allocates a fresh identifier.
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    /// Parses the external (hyphenated or simple hex) representation.
    pub fn parse(value: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(value.trim()).map(Self)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Display for NoteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for NoteId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Uuid> for NoteId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

/// Persisted note record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    /// Unique across all notes (exact, case-sensitive match).
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Equals `created_at` until an update path exists.
    pub updated_at: DateTime<Utc>,
}

/// Normalizes a title for persistence; `None` when blank.
pub fn normalize_title(title: &str) -> Option<&str> {
    let trimmed = title.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Current time truncated to the millisecond precision used by storage.
pub(crate) fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::{normalize_title, now_millis, Note, NoteId};

    #[test]
    fn generated_ids_are_unique_and_not_nil() {
        let first = NoteId::generate();
        let second = NoteId::generate();
        assert_ne!(first, second);
        assert!(!first.is_nil());
    }

    #[test]
    fn id_display_round_trips_through_parse() {
        let id = NoteId::generate();
        let text = id.to_string();
        assert_eq!(text.len(), 36);
        assert_eq!(text.parse::<NoteId>().unwrap(), id);
        assert_eq!(NoteId::parse(&id.as_uuid().simple().to_string()).unwrap(), id);
    }

    #[test]
    fn parse_rejects_malformed_ids() {
        assert!(NoteId::parse("not-an-id").is_err());
        assert!(NoteId::parse("").is_err());
        assert!(NoteId::parse("65f1c0ffee").is_err());
    }

    #[test]
    fn normalize_title_trims_and_rejects_blank() {
        assert_eq!(normalize_title("  Groceries \n"), Some("Groceries"));
        assert_eq!(normalize_title(" \t "), None);
    }

    #[test]
    fn now_millis_has_no_sub_millisecond_part() {
        let now = now_millis();
        assert_eq!(now.timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn note_serializes_id_as_plain_string() {
        let now = now_millis();
        let note = Note {
            id: NoteId::generate(),
            title: "Title".to_string(),
            content: String::new(),
            created_at: now,
            updated_at: now,
        };
        let value = serde_json::to_value(&note).unwrap();
        assert_eq!(value["id"], serde_json::json!(note.id.to_string()));
        let back: Note = serde_json::from_value(value).unwrap();
        assert_eq!(back, note);
    }
}
