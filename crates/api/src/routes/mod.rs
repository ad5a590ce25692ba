pub mod entities;
pub mod health;
pub mod works;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /works                     list (filterable), create (multipart)
/// /works/{id}                get, update (multipart), delete
///
/// /authors                   list with work counts
/// /circles                   list with work counts
/// /events                    list with work counts
/// /tags                      list with work counts
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/works", works::router())
        .merge(entities::router())
}
