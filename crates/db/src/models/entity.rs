//! Rows of the name-keyed entity tables (`authors`, `circles`, `events`, `tags`).

use serde::Serialize;
use sqlx::FromRow;
use doujinshelf_core::types::DbId;

/// Reference to a named entity, as embedded in a work.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct EntityRef {
    pub id: DbId,
    pub name: String,
}

/// A named entity together with the number of works referencing it.
/// `work_count` is computed on every read, never stored.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct EntityWithCount {
    pub id: DbId,
    pub name: String,
    pub work_count: i64,
}
