//! Route definitions for works, mounted at `/works`.

use axum::routing::get;
use axum::Router;

use crate::handlers::works;
use crate::state::AppState;

/// ```text
/// GET    /        -> list_works (query-string filter)
/// POST   /        -> create_work
/// GET    /{id}    -> get_work
/// PUT    /{id}    -> update_work
/// DELETE /{id}    -> delete_work
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(works::list_works).post(works::create_work))
        .route(
            "/{id}",
            get(works::get_work)
                .put(works::update_work)
                .delete(works::delete_work),
        )
}
