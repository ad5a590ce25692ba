//! Repository for the name-keyed entity tables: `authors`, `circles`,
//! `events` and `tags`.
//!
//! Provides get-or-create resolution by name and per-entity work counts.

use std::collections::HashMap;

use doujinshelf_core::entity::{normalize_name, EntityKind, MAX_RESOLVE_ATTEMPTS};
use doujinshelf_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::entity::{EntityRef, EntityWithCount};

/// Provides resolution and aggregate queries for named entities.
pub struct EntityRepo;

impl EntityRepo {
    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    /// Resolve a name to an existing entity, creating it when absent.
    ///
    /// Blank names resolve to `None` without touching the database. The
    /// insert uses `ON CONFLICT DO NOTHING`; when a concurrent writer won the
    /// race the row is re-read instead, so two callers resolving the same new
    /// name always end up with the same entity. Existing rows are never
    /// modified.
    ///
    /// Runs on `conn` so callers can resolve inside their own transaction.
    /// Names must already have passed
    /// [`validate_name`](doujinshelf_core::entity::validate_name).
    pub(crate) async fn resolve(
        conn: &mut PgConnection,
        kind: EntityKind,
        raw_name: Option<&str>,
    ) -> Result<Option<EntityRef>, sqlx::Error> {
        let Some(name) = raw_name.and_then(normalize_name) else {
            return Ok(None);
        };

        let insert = format!(
            "INSERT INTO {} (name) VALUES ($1) \
             ON CONFLICT (name) DO NOTHING \
             RETURNING id, name",
            kind.table()
        );

        for attempt in 1..=MAX_RESOLVE_ATTEMPTS {
            let created = sqlx::query_as::<_, EntityRef>(&insert)
                .bind(name)
                .fetch_optional(&mut *conn)
                .await?;
            if let Some(entity) = created {
                tracing::debug!(kind = %kind, id = entity.id, name, "Entity created");
                return Ok(Some(entity));
            }

            // Lost the insert race: the winner's row is visible now.
            if let Some(entity) = Self::find_by_name_on(&mut *conn, kind, name).await? {
                return Ok(Some(entity));
            }

            tracing::warn!(kind = %kind, name, attempt, "Entity vanished after conflict, retrying");
        }

        Err(sqlx::Error::Protocol(format!(
            "could not resolve {kind} '{name}' after {MAX_RESOLVE_ATTEMPTS} attempts"
        )))
    }

    /// Resolve validated tag names, returning them de-duplicated in
    /// first-seen order.
    ///
    /// Rows are inserted in sorted name order. Every transaction then takes
    /// the uniqueness locks of new tags in the same order, so two writers
    /// listing the same new tags in different orders cannot deadlock.
    pub(crate) async fn resolve_tags(
        conn: &mut PgConnection,
        names: &[String],
    ) -> Result<Vec<EntityRef>, sqlx::Error> {
        let mut sorted: Vec<&str> = names.iter().filter_map(|n| normalize_name(n)).collect();
        sorted.sort_unstable();
        sorted.dedup();

        let mut resolved = HashMap::with_capacity(sorted.len());
        for name in sorted {
            if let Some(tag) = Self::resolve(&mut *conn, EntityKind::Tag, Some(name)).await? {
                resolved.insert(name, tag);
            }
        }

        // `remove` drops later duplicates.
        Ok(names
            .iter()
            .filter_map(|n| normalize_name(n))
            .filter_map(|n| resolved.remove(n))
            .collect())
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    /// Find an entity by its normalized name. Never creates anything.
    pub async fn find_by_name(
        pool: &PgPool,
        kind: EntityKind,
        raw_name: &str,
    ) -> Result<Option<EntityRef>, sqlx::Error> {
        let Some(name) = normalize_name(raw_name) else {
            return Ok(None);
        };
        let mut conn = pool.acquire().await?;
        Self::find_by_name_on(&mut conn, kind, name).await
    }

    async fn find_by_name_on(
        conn: &mut PgConnection,
        kind: EntityKind,
        name: &str,
    ) -> Result<Option<EntityRef>, sqlx::Error> {
        let query = format!("SELECT id, name FROM {} WHERE name = $1", kind.table());
        sqlx::query_as::<_, EntityRef>(&query)
            .bind(name)
            .fetch_optional(conn)
            .await
    }

    // -----------------------------------------------------------------------
    // Work counts
    // -----------------------------------------------------------------------

    /// Number of works referencing each entity of `kind`, keyed by entity id.
    /// Entities without works are included with a count of zero.
    pub async fn work_counts(
        pool: &PgPool,
        kind: EntityKind,
    ) -> Result<HashMap<DbId, i64>, sqlx::Error> {
        let query = format!(
            "SELECT e.id, COUNT({}) FROM {} GROUP BY e.id",
            count_target(kind),
            count_source(kind)
        );
        let rows = sqlx::query_as::<_, (DbId, i64)>(&query)
            .fetch_all(pool)
            .await?;
        Ok(rows.into_iter().collect())
    }

    /// All entities of `kind` with their work counts, ordered by name.
    pub async fn list_with_counts(
        pool: &PgPool,
        kind: EntityKind,
    ) -> Result<Vec<EntityWithCount>, sqlx::Error> {
        let query = format!(
            "SELECT e.id, e.name, COUNT({}) AS work_count \
             FROM {} \
             GROUP BY e.id, e.name \
             ORDER BY e.name, e.id",
            count_target(kind),
            count_source(kind)
        );
        sqlx::query_as::<_, EntityWithCount>(&query)
            .fetch_all(pool)
            .await
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Column on `works` holding the single reference for author/circle/event.
fn work_column(kind: EntityKind) -> Option<&'static str> {
    match kind {
        EntityKind::Author => Some("author_id"),
        EntityKind::Circle => Some("circle_id"),
        EntityKind::Event => Some("purchase_event_id"),
        EntityKind::Tag => None,
    }
}

/// `FROM` clause joining entity rows (aliased `e`) to the works that use them.
fn count_source(kind: EntityKind) -> String {
    match work_column(kind) {
        Some(column) => format!(
            "{} e LEFT JOIN works w ON w.{column} = e.id",
            kind.table()
        ),
        None => format!("{} e LEFT JOIN work_tags wt ON wt.tag_id = e.id", kind.table()),
    }
}

/// Expression counted per entity; NULL for entities without works.
fn count_target(kind: EntityKind) -> &'static str {
    match work_column(kind) {
        Some(_) => "w.id",
        None => "wt.work_id",
    }
}
