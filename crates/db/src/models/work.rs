//! Work aggregate models.
//!
//! A [`Work`] is assembled from one `works` row joined with its author,
//! circle and event names, plus its `work_tags` and `work_extras` rows.

use chrono::NaiveDate;
use doujinshelf_core::extra::ExtraAttributes;
use doujinshelf_core::filter::Filterable;
use doujinshelf_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use super::entity::EntityRef;

// ---------------------------------------------------------------------------
// Entity structs (database rows)
// ---------------------------------------------------------------------------

/// A `works` row joined with the names of its referenced entities.
#[derive(Debug, Clone, FromRow)]
pub struct WorkRow {
    pub id: DbId,
    pub title: String,
    pub author_id: Option<DbId>,
    pub author_name: Option<String>,
    pub circle_id: Option<DbId>,
    pub circle_name: Option<String>,
    pub purchase_event_id: Option<DbId>,
    pub purchase_event_name: Option<String>,
    pub is_r18: bool,
    pub summary: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub price: Option<f64>,
    pub cover_image_path: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// One row of the tag list of a work, in `position` order.
#[derive(Debug, Clone, FromRow)]
pub struct WorkTagName {
    pub work_id: DbId,
    pub name: String,
}

/// One `work_extras` row.
#[derive(Debug, Clone, FromRow)]
pub struct WorkExtra {
    pub work_id: DbId,
    pub key: String,
    pub value: String,
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// A work with its relations resolved for display.
#[derive(Debug, Clone, Serialize)]
pub struct Work {
    pub id: DbId,
    pub title: String,
    pub author: Option<EntityRef>,
    pub circle: Option<EntityRef>,
    pub purchase_event: Option<EntityRef>,
    pub is_r18: bool,
    pub summary: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub price: Option<f64>,
    /// Tag names in the order they were submitted.
    pub tags: Vec<String>,
    pub extra: ExtraAttributes,
    /// Opaque cover reference. Exposed to clients as a URL by the API layer.
    #[serde(skip)]
    pub cover_image_path: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Work {
    pub(crate) fn from_parts(row: WorkRow, tags: Vec<String>, extra: ExtraAttributes) -> Self {
        Self {
            id: row.id,
            title: row.title,
            author: entity_ref(row.author_id, row.author_name),
            circle: entity_ref(row.circle_id, row.circle_name),
            purchase_event: entity_ref(row.purchase_event_id, row.purchase_event_name),
            is_r18: row.is_r18,
            summary: row.summary,
            purchase_date: row.purchase_date,
            price: row.price,
            tags,
            extra,
            cover_image_path: row.cover_image_path,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn entity_ref(id: Option<DbId>, name: Option<String>) -> Option<EntityRef> {
    match (id, name) {
        (Some(id), Some(name)) => Some(EntityRef { id, name }),
        _ => None,
    }
}

impl Filterable for Work {
    fn title(&self) -> &str {
        &self.title
    }
    fn author_name(&self) -> Option<&str> {
        self.author.as_ref().map(|a| a.name.as_str())
    }
    fn circle_name(&self) -> Option<&str> {
        self.circle.as_ref().map(|c| c.name.as_str())
    }
    fn event_name(&self) -> Option<&str> {
        self.purchase_event.as_ref().map(|e| e.name.as_str())
    }
    fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }
    fn tag_names(&self) -> &[String] {
        &self.tags
    }
    fn extra(&self) -> &ExtraAttributes {
        &self.extra
    }
    fn price(&self) -> Option<f64> {
        self.price
    }
    fn purchase_date(&self) -> Option<NaiveDate> {
        self.purchase_date
    }
    fn is_r18(&self) -> bool {
        self.is_r18
    }
}

/// Result of a successful update.
#[derive(Debug, Clone)]
pub struct UpdatedWork {
    pub work: Work,
    /// Cover reference replaced by this update, if any. The caller may
    /// discard the blob once the update is committed.
    pub superseded_cover: Option<String>,
}

/// What remains of a work after it was deleted.
#[derive(Debug, Clone)]
pub struct DeletedWork {
    pub id: DbId,
    pub cover_image_path: Option<String>,
}
