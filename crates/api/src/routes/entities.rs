//! Route definitions for the named entity lists.

use axum::routing::get;
use axum::Router;

use crate::handlers::entities;
use crate::state::AppState;

/// ```text
/// GET /authors  -> list_authors
/// GET /circles  -> list_circles
/// GET /events   -> list_events
/// GET /tags     -> list_tags
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/authors", get(entities::list_authors))
        .route("/circles", get(entities::list_circles))
        .route("/events", get(entities::list_events))
        .route("/tags", get(entities::list_tags))
}
