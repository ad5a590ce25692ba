//! Repository for the work aggregate: the `works` table plus its
//! `work_tags` and `work_extras` rows.
//!
//! Every write resolves referenced entities and writes all rows of the
//! aggregate inside one transaction, so readers never observe a partially
//! applied create, update or delete.

use std::collections::HashMap;

use chrono::NaiveDate;
use doujinshelf_core::entity::EntityKind;
use doujinshelf_core::extra::ExtraAttributes;
use doujinshelf_core::filter::{R18Filter, WorkFilter};
use doujinshelf_core::types::DbId;
use doujinshelf_core::work::WorkDraft;
use sqlx::{PgConnection, PgPool};

use crate::models::entity::EntityRef;
use crate::models::work::{DeletedWork, UpdatedWork, Work, WorkExtra, WorkRow, WorkTagName};
use crate::repositories::EntityRepo;

/// `SELECT ... FROM` prefix for work reads. `works` is aliased `w`.
const WORK_SELECT: &str = "\
    SELECT w.id, w.title, \
           w.author_id, a.name AS author_name, \
           w.circle_id, c.name AS circle_name, \
           w.purchase_event_id, e.name AS purchase_event_name, \
           w.is_r18, w.summary, w.purchase_date, w.price::float8 AS price, \
           w.cover_image_path, w.created_at, w.updated_at \
    FROM works w \
    LEFT JOIN authors a ON a.id = w.author_id \
    LEFT JOIN circles c ON c.id = w.circle_id \
    LEFT JOIN events e ON e.id = w.purchase_event_id";

/// Listing order: newest first.
const WORK_ORDER: &str = " ORDER BY w.id DESC";

/// Entities referenced by one work, resolved inside the write transaction.
struct ResolvedRefs {
    author: Option<EntityRef>,
    circle: Option<EntityRef>,
    event: Option<EntityRef>,
    tags: Vec<EntityRef>,
}

/// Provides create/read/update/delete and filtering for works.
pub struct WorkRepo;

impl WorkRepo {
    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Insert a new work with its tags and extra attributes.
    ///
    /// Unknown author/circle/event/tag names are created on the fly.
    pub async fn create(
        pool: &PgPool,
        draft: &WorkDraft,
        cover_image_path: Option<&str>,
    ) -> Result<Work, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let refs = Self::resolve_refs(&mut tx, draft).await?;

        let id: DbId = sqlx::query_scalar(
            "INSERT INTO works \
                (title, author_id, circle_id, purchase_event_id, is_r18, \
                 summary, purchase_date, price, cover_image_path) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8::numeric(10,2), $9) \
             RETURNING id",
        )
        .bind(&draft.title)
        .bind(refs.author.as_ref().map(|r| r.id))
        .bind(refs.circle.as_ref().map(|r| r.id))
        .bind(refs.event.as_ref().map(|r| r.id))
        .bind(draft.is_r18)
        .bind(&draft.summary)
        .bind(draft.purchase_date)
        .bind(draft.price)
        .bind(cover_image_path)
        .fetch_one(&mut *tx)
        .await?;

        Self::insert_tag_links(&mut tx, id, &refs.tags).await?;
        Self::insert_extras(&mut tx, id, &draft.extra).await?;

        let work = Self::load_one(&mut tx, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;

        tx.commit().await?;
        Ok(work)
    }

    /// Replace every field of an existing work.
    ///
    /// Tags and extra attributes are replaced wholesale, never merged. When
    /// `new_cover` is `None` the stored cover reference is kept.
    /// Returns `None` if no work with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        draft: &WorkDraft,
        new_cover: Option<&str>,
    ) -> Result<Option<UpdatedWork>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let existing: Option<Option<String>> =
            sqlx::query_scalar("SELECT cover_image_path FROM works WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(old_cover) = existing else {
            return Ok(None);
        };

        let refs = Self::resolve_refs(&mut tx, draft).await?;

        sqlx::query(
            "UPDATE works SET \
                title = $2, \
                author_id = $3, \
                circle_id = $4, \
                purchase_event_id = $5, \
                is_r18 = $6, \
                summary = $7, \
                purchase_date = $8, \
                price = $9::numeric(10,2), \
                cover_image_path = COALESCE($10, cover_image_path) \
             WHERE id = $1",
        )
        .bind(id)
        .bind(&draft.title)
        .bind(refs.author.as_ref().map(|r| r.id))
        .bind(refs.circle.as_ref().map(|r| r.id))
        .bind(refs.event.as_ref().map(|r| r.id))
        .bind(draft.is_r18)
        .bind(&draft.summary)
        .bind(draft.purchase_date)
        .bind(draft.price)
        .bind(new_cover)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM work_tags WHERE work_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        Self::insert_tag_links(&mut tx, id, &refs.tags).await?;

        sqlx::query("DELETE FROM work_extras WHERE work_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        Self::insert_extras(&mut tx, id, &draft.extra).await?;

        let work = Self::load_one(&mut tx, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;

        tx.commit().await?;

        let superseded_cover = match (new_cover, old_cover) {
            (Some(new), Some(old)) if new != old => Some(old),
            _ => None,
        };

        Ok(Some(UpdatedWork {
            work,
            superseded_cover,
        }))
    }

    /// Delete a work. Tag links and extra attributes cascade; referenced
    /// authors, circles, events and tags are left untouched.
    ///
    /// Returns `None` if no work with the given `id` exists.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<Option<DeletedWork>, sqlx::Error> {
        let deleted: Option<Option<String>> =
            sqlx::query_scalar("DELETE FROM works WHERE id = $1 RETURNING cover_image_path")
                .bind(id)
                .fetch_optional(pool)
                .await?;

        Ok(deleted.map(|cover_image_path| DeletedWork {
            id,
            cover_image_path,
        }))
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Find a work by its ID, with relations resolved.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Work>, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        Self::load_one(&mut conn, id).await
    }

    /// List all works, newest first.
    pub async fn list(pool: &PgPool) -> Result<Vec<Work>, sqlx::Error> {
        Self::list_filtered(pool, &WorkFilter::default()).await
    }

    /// List the works matching `filter`, newest first.
    ///
    /// Evaluates the criteria in SQL. The selection is the same as running
    /// [`doujinshelf_core::filter::filter_works`] over [`Self::list`].
    pub async fn list_filtered(
        pool: &PgPool,
        filter: &WorkFilter,
    ) -> Result<Vec<Work>, sqlx::Error> {
        let (where_clause, binds) = filter_clause(filter);
        let query = format!("{WORK_SELECT} {where_clause}{WORK_ORDER}");

        let mut q = sqlx::query_as::<_, WorkRow>(&query);
        // Bind dynamic parameters in placeholder order.
        for bind in binds {
            q = match bind {
                FilterBind::Text(v) => q.bind(v),
                FilterBind::Number(v) => q.bind(v),
                FilterBind::Date(v) => q.bind(v),
            };
        }

        let mut conn = pool.acquire().await?;
        let rows = q.fetch_all(&mut *conn).await?;
        Self::assemble(&mut conn, rows).await
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    /// Every writer resolves in the same order (author, circle, event, tags)
    /// so uniqueness locks on new entity rows are always taken in one order.
    async fn resolve_refs(
        conn: &mut PgConnection,
        draft: &WorkDraft,
    ) -> Result<ResolvedRefs, sqlx::Error> {
        Ok(ResolvedRefs {
            author: EntityRepo::resolve(&mut *conn, EntityKind::Author, draft.author_name.as_deref())
                .await?,
            circle: EntityRepo::resolve(&mut *conn, EntityKind::Circle, draft.circle_name.as_deref())
                .await?,
            event: EntityRepo::resolve(
                &mut *conn,
                EntityKind::Event,
                draft.purchase_event_name.as_deref(),
            )
            .await?,
            tags: EntityRepo::resolve_tags(&mut *conn, &draft.tag_names).await?,
        })
    }

    async fn insert_tag_links(
        conn: &mut PgConnection,
        work_id: DbId,
        tags: &[EntityRef],
    ) -> Result<(), sqlx::Error> {
        for (position, tag) in (0_i32..).zip(tags) {
            sqlx::query(
                "INSERT INTO work_tags (work_id, tag_id, position) \
                 VALUES ($1, $2, $3)",
            )
            .bind(work_id)
            .bind(tag.id)
            .bind(position)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    async fn insert_extras(
        conn: &mut PgConnection,
        work_id: DbId,
        extra: &ExtraAttributes,
    ) -> Result<(), sqlx::Error> {
        for (key, value) in extra {
            sqlx::query(
                "INSERT INTO work_extras (work_id, key, value) \
                 VALUES ($1, $2, $3)",
            )
            .bind(work_id)
            .bind(key)
            .bind(value)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    async fn load_one(conn: &mut PgConnection, id: DbId) -> Result<Option<Work>, sqlx::Error> {
        let query = format!("{WORK_SELECT} WHERE w.id = $1");
        let row = sqlx::query_as::<_, WorkRow>(&query)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => Ok(Self::assemble(conn, vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Attach tags and extra attributes to work rows, keeping row order.
    async fn assemble(
        conn: &mut PgConnection,
        rows: Vec<WorkRow>,
    ) -> Result<Vec<Work>, sqlx::Error> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<DbId> = rows.iter().map(|r| r.id).collect();

        let tag_rows = sqlx::query_as::<_, WorkTagName>(
            "SELECT wt.work_id, t.name \
             FROM work_tags wt \
             JOIN tags t ON t.id = wt.tag_id \
             WHERE wt.work_id = ANY($1) \
             ORDER BY wt.work_id, wt.position",
        )
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await?;

        let extra_rows = sqlx::query_as::<_, WorkExtra>(
            "SELECT work_id, key, value FROM work_extras WHERE work_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await?;

        let mut tags: HashMap<DbId, Vec<String>> = HashMap::new();
        for row in tag_rows {
            tags.entry(row.work_id).or_default().push(row.name);
        }

        let mut extras: HashMap<DbId, ExtraAttributes> = HashMap::new();
        for row in extra_rows {
            extras.entry(row.work_id).or_default().insert(row.key, row.value);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let id = row.id;
                Work::from_parts(
                    row,
                    tags.remove(&id).unwrap_or_default(),
                    extras.remove(&id).unwrap_or_default(),
                )
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Filter translation
// ---------------------------------------------------------------------------

/// A value bound to one `$n` placeholder of a filter clause.
#[derive(Debug, Clone, PartialEq)]
enum FilterBind {
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

/// Build a `WHERE` clause equivalent to [`WorkFilter::matches`], plus its
/// bind values in placeholder order. Empty when no criterion is set.
///
/// NULL columns make every comparison on them false, which gives the same
/// "missing value fails a set criterion" behaviour as the in-memory filter.
fn filter_clause(filter: &WorkFilter) -> (String, Vec<FilterBind>) {
    let mut conditions = Vec::new();
    let mut binds = Vec::new();

    let mut bind = |value: FilterBind| {
        binds.push(value);
        binds.len()
    };

    let text_criteria = [
        ("w.title", &filter.title),
        ("a.name", &filter.author_name),
        ("c.name", &filter.circle_name),
        ("w.summary", &filter.summary),
        ("e.name", &filter.event_name),
    ];
    for (column, needle) in text_criteria {
        if let Some(needle) = needle {
            let idx = bind(FilterBind::Text(like_pattern(needle)));
            conditions.push(format!("{column} ILIKE ${idx}"));
        }
    }

    if let Some(needle) = &filter.tags {
        let idx = bind(FilterBind::Text(like_pattern(needle)));
        conditions.push(format!(
            "EXISTS (SELECT 1 FROM work_tags wt \
             JOIN tags t ON t.id = wt.tag_id \
             WHERE wt.work_id = w.id AND t.name ILIKE ${idx})"
        ));
    }

    if let Some(needle) = &filter.extra_text {
        // Same rendering as `flatten_extra`: `key: value` lines in byte order of key.
        let idx = bind(FilterBind::Text(like_pattern(needle)));
        conditions.push(format!(
            "COALESCE((SELECT string_agg(x.key || ': ' || x.value, E'\\n' \
             ORDER BY x.key COLLATE \"C\") \
             FROM work_extras x WHERE x.work_id = w.id), '') ILIKE ${idx}"
        ));
    }

    if let Some(min) = filter.price_min {
        let idx = bind(FilterBind::Number(min));
        conditions.push(format!("w.price::float8 >= ${idx}"));
    }
    if let Some(max) = filter.price_max {
        let idx = bind(FilterBind::Number(max));
        conditions.push(format!("w.price::float8 <= ${idx}"));
    }
    if let Some(from) = filter.date_from {
        let idx = bind(FilterBind::Date(from));
        conditions.push(format!("w.purchase_date >= ${idx}"));
    }
    if let Some(to) = filter.date_to {
        let idx = bind(FilterBind::Date(to));
        conditions.push(format!("w.purchase_date <= ${idx}"));
    }

    match filter.r18 {
        R18Filter::Any => {}
        R18Filter::Only => conditions.push("w.is_r18".to_string()),
        R18Filter::Exclude => conditions.push("NOT w.is_r18".to_string()),
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };
    (where_clause, binds)
}

/// Build a `%needle%` pattern with LIKE wildcards in `needle` escaped.
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for ch in needle.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_wraps_and_escapes() {
        assert_eq!(like_pattern("dra"), "%dra%");
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }

    #[test]
    fn empty_filter_has_no_where_clause() {
        let (clause, binds) = filter_clause(&WorkFilter::default());
        assert_eq!(clause, "");
        assert!(binds.is_empty());
    }

    #[test]
    fn placeholders_follow_bind_order() {
        let filter = WorkFilter {
            title: Some("a".into()),
            author_name: Some("b".into()),
            tags: Some("c".into()),
            extra_text: Some("d".into()),
            price_min: Some(1.0),
            date_to: NaiveDate::from_ymd_opt(2024, 1, 1),
            r18: R18Filter::Exclude,
            ..Default::default()
        };
        let (clause, binds) = filter_clause(&filter);

        assert!(clause.starts_with("WHERE w.title ILIKE $1 AND a.name ILIKE $2"));
        assert!(clause.contains("t.name ILIKE $3)"));
        assert!(clause.contains("ILIKE $4"));
        assert!(clause.contains("w.price::float8 >= $5"));
        assert!(clause.contains("w.purchase_date <= $6"));
        assert!(clause.ends_with(" AND NOT w.is_r18"));

        assert_eq!(binds.len(), 6);
        assert_eq!(binds[0], FilterBind::Text("%a%".into()));
        assert_eq!(binds[4], FilterBind::Number(1.0));
        assert_eq!(binds[5], FilterBind::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()));
    }
}
