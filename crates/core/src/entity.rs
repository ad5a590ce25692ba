//! Named catalog entities (authors, circles, events, tags) and the rules that
//! decide when two names refer to the same entity.
//!
//! Identity is the trimmed name, compared case-sensitively. Filtering is
//! case-insensitive, but that lives in [`crate::filter`] and never affects
//! which row a name resolves to.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum length (in characters) of an author, circle, or event name.
pub const MAX_ENTITY_NAME_LEN: usize = 200;

/// Maximum length (in characters) of a tag name.
pub const MAX_TAG_NAME_LEN: usize = 100;

/// Number of insert/re-read cycles attempted by get-or-create before giving up.
pub const MAX_RESOLVE_ATTEMPTS: u32 = 3;

// ---------------------------------------------------------------------------
// Entity kinds
// ---------------------------------------------------------------------------

/// The kinds of shared, name-keyed entities a work can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Author,
    Circle,
    Event,
    Tag,
}

impl EntityKind {
    /// All kinds, in the order list endpoints are usually rendered.
    pub const ALL: [EntityKind; 4] = [Self::Author, Self::Circle, Self::Event, Self::Tag];

    /// Backing table name.
    pub fn table(self) -> &'static str {
        match self {
            Self::Author => "authors",
            Self::Circle => "circles",
            Self::Event => "events",
            Self::Tag => "tags",
        }
    }

    /// Human-readable singular label, used in errors and logs.
    pub fn label(self) -> &'static str {
        match self {
            Self::Author => "Author",
            Self::Circle => "Circle",
            Self::Event => "Event",
            Self::Tag => "Tag",
        }
    }

    pub fn max_name_len(self) -> usize {
        match self {
            Self::Tag => MAX_TAG_NAME_LEN,
            _ => MAX_ENTITY_NAME_LEN,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Name normalization
// ---------------------------------------------------------------------------

/// Normalize a raw entity name: trim surrounding whitespace.
///
/// Returns `None` when nothing is left, meaning "no reference of this kind".
pub fn normalize_name(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Normalize and length-check an optional entity name from a payload field.
///
/// Absent and blank names both yield `Ok(None)`.
pub fn validate_name(
    kind: EntityKind,
    field: &str,
    raw: Option<&str>,
) -> Result<Option<String>, CoreError> {
    let Some(name) = raw.and_then(normalize_name) else {
        return Ok(None);
    };

    let len = name.chars().count();
    if len > kind.max_name_len() {
        return Err(CoreError::validation(
            field,
            format!(
                "{kind} name must be at most {} characters, got {len}",
                kind.max_name_len()
            ),
        ));
    }

    Ok(Some(name.to_string()))
}
