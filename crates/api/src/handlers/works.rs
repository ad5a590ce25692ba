//! Handlers for the work catalog.
//!
//! Create and update take a `multipart/form-data` body so a cover image can
//! travel with the text fields. Validation happens before anything is
//! persisted; the cover blob is written before the database transaction and
//! removed again if the transaction does not commit.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use doujinshelf_core::filter::{WorkFilter, WorkFilterParams};
use doujinshelf_core::types::DbId;
use doujinshelf_core::work::{WorkDraft, WorkInput};
use doujinshelf_db::models::work::Work;
use doujinshelf_db::repositories::WorkRepo;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Multipart field carrying the cover image.
const COVER_FIELD: &str = "cover";

/// A work as returned to clients: the stored aggregate plus a cover URL.
#[derive(Debug, Serialize)]
pub struct WorkResponse {
    #[serde(flatten)]
    pub work: Work,
    pub cover_image_url: Option<String>,
}

impl WorkResponse {
    fn new(state: &AppState, work: Work) -> Self {
        let cover_image_url = work
            .cover_image_path
            .as_deref()
            .map(|reference| state.covers.url_for(reference));
        Self {
            work,
            cover_image_url,
        }
    }
}

/// Cover image received with a create or update request.
struct CoverUpload {
    file_name: Option<String>,
    bytes: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// GET /api/v1/works
///
/// List works newest first, optionally narrowed by filter criteria in the
/// query string.
pub async fn list_works(
    State(state): State<AppState>,
    Query(params): Query<WorkFilterParams>,
) -> AppResult<Json<DataResponse<Vec<WorkResponse>>>> {
    let filter = WorkFilter::from_params(params)?;
    let works = WorkRepo::list_filtered(&state.pool, &filter).await?;

    tracing::debug!(count = works.len(), filtered = !filter.is_empty(), "Works listed");

    let data = works
        .into_iter()
        .map(|work| WorkResponse::new(&state, work))
        .collect();
    Ok(Json(DataResponse { data }))
}

/// GET /api/v1/works/{id}
pub async fn get_work(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<WorkResponse>>> {
    let work = WorkRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::work_not_found(id))?;

    Ok(Json(DataResponse {
        data: WorkResponse::new(&state, work),
    }))
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// POST /api/v1/works
pub async fn create_work(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<WorkResponse>>)> {
    let (draft, cover) = read_work_form(&state, multipart).await?;
    let cover_ref = store_cover(&state, cover).await?;

    let work = match WorkRepo::create(&state.pool, &draft, cover_ref.as_deref()).await {
        Ok(work) => work,
        Err(e) => {
            discard_cover(&state, cover_ref.as_deref()).await;
            return Err(e.into());
        }
    };

    tracing::info!(
        work_id = work.id,
        title = %work.title,
        tags = work.tags.len(),
        has_cover = work.cover_image_path.is_some(),
        "Work created",
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: WorkResponse::new(&state, work),
        }),
    ))
}

/// PUT /api/v1/works/{id}
///
/// Replaces every field. Tags and extra attributes are replaced as a whole;
/// the stored cover is kept unless a new one is uploaded.
pub async fn update_work(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    multipart: Multipart,
) -> AppResult<Json<DataResponse<WorkResponse>>> {
    let (draft, cover) = read_work_form(&state, multipart).await?;
    let cover_ref = store_cover(&state, cover).await?;

    let updated = match WorkRepo::update(&state.pool, id, &draft, cover_ref.as_deref()).await {
        Ok(Some(updated)) => updated,
        Ok(None) => {
            discard_cover(&state, cover_ref.as_deref()).await;
            return Err(AppError::work_not_found(id));
        }
        Err(e) => {
            discard_cover(&state, cover_ref.as_deref()).await;
            return Err(e.into());
        }
    };

    discard_cover(&state, updated.superseded_cover.as_deref()).await;

    tracing::info!(
        work_id = id,
        title = %updated.work.title,
        tags = updated.work.tags.len(),
        cover_replaced = updated.superseded_cover.is_some(),
        "Work updated",
    );

    Ok(Json(DataResponse {
        data: WorkResponse::new(&state, updated.work),
    }))
}

/// DELETE /api/v1/works/{id}
///
/// Referenced authors, circles, events and tags are kept.
pub async fn delete_work(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    let deleted = WorkRepo::delete(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::work_not_found(id))?;

    discard_cover(&state, deleted.cover_image_path.as_deref()).await;

    tracing::info!(work_id = deleted.id, "Work deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Read the multipart form and validate it into a draft.
///
/// Unknown fields are ignored; a repeated field keeps its last value. An
/// empty file part (what browsers send when no file was picked) counts as
/// no cover.
async fn read_work_form(
    state: &AppState,
    mut multipart: Multipart,
) -> AppResult<(WorkDraft, Option<CoverUpload>)> {
    let mut input = WorkInput::default();
    let mut cover = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        if name == COVER_FIELD {
            let file_name = field.file_name().map(str::to_string);
            let bytes = field.bytes().await?;
            cover = (!bytes.is_empty()).then(|| CoverUpload {
                file_name,
                bytes: bytes.to_vec(),
            });
            continue;
        }

        let slot = match name.as_str() {
            "title" => &mut input.title,
            "author_name" => &mut input.author_name,
            "circle_name" => &mut input.circle_name,
            "purchase_event_name" => &mut input.purchase_event_name,
            "is_r18" => &mut input.is_r18,
            "summary" => &mut input.summary,
            "purchase_date" => &mut input.purchase_date,
            "price" => &mut input.price,
            "tags" => &mut input.tags,
            "extra" => &mut input.extra,
            other => {
                tracing::debug!(field = other, "Ignoring unknown form field");
                continue;
            }
        };
        *slot = Some(field.text().await?);
    }

    let draft = input.into_draft(state.config.max_price)?;
    Ok((draft, cover))
}

async fn store_cover(state: &AppState, cover: Option<CoverUpload>) -> AppResult<Option<String>> {
    match cover {
        Some(upload) => {
            let reference = state
                .covers
                .save(&upload.bytes, upload.file_name.as_deref())
                .await?;
            Ok(Some(reference))
        }
        None => Ok(None),
    }
}

/// Best-effort removal of a cover blob. Failures are logged, never surfaced.
async fn discard_cover(state: &AppState, reference: Option<&str>) {
    let Some(reference) = reference else {
        return;
    };
    if let Err(e) = state.covers.discard(reference).await {
        tracing::warn!(reference, error = %e, "Failed to discard cover image");
    }
}
