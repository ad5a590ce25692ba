//! Handlers for the author, circle, event and tag lists.
//!
//! Each list carries the number of works currently referencing every
//! entity, computed at read time.

use axum::extract::State;
use axum::Json;
use doujinshelf_core::entity::EntityKind;
use doujinshelf_db::models::entity::EntityWithCount;
use doujinshelf_db::repositories::EntityRepo;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

type EntityList = Json<DataResponse<Vec<EntityWithCount>>>;

async fn list_kind(state: &AppState, kind: EntityKind) -> AppResult<EntityList> {
    let entities = EntityRepo::list_with_counts(&state.pool, kind).await?;
    tracing::debug!(kind = %kind, count = entities.len(), "Entities listed");
    Ok(Json(DataResponse { data: entities }))
}

/// GET /api/v1/authors
pub async fn list_authors(State(state): State<AppState>) -> AppResult<EntityList> {
    list_kind(&state, EntityKind::Author).await
}

/// GET /api/v1/circles
pub async fn list_circles(State(state): State<AppState>) -> AppResult<EntityList> {
    list_kind(&state, EntityKind::Circle).await
}

/// GET /api/v1/events
pub async fn list_events(State(state): State<AppState>) -> AppResult<EntityList> {
    list_kind(&state, EntityKind::Event).await
}

/// GET /api/v1/tags
pub async fn list_tags(State(state): State<AppState>) -> AppResult<EntityList> {
    list_kind(&state, EntityKind::Tag).await
}
