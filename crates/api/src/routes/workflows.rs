//! Route definitions for workflow management.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{events, workflows};
use crate::state::AppState;

/// Routes mounted at `/workflows`. All require a bearer token.
///
/// ```text
/// GET    /                -> list
/// POST   /                -> create
/// GET    /{id}            -> get_by_id
/// PUT    /{id}            -> update
/// DELETE /{id}            -> delete
/// POST   /{id}/activate   -> activate
/// POST   /{id}/pause      -> pause
/// POST   /{id}/stop       -> stop
/// GET    /{id}/stats      -> stats
/// GET    /{id}/events     -> list_by_workflow (?limit, ?event_type)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(workflows::list).post(workflows::create))
        .route(
            "/{id}",
            get(workflows::get_by_id)
                .put(workflows::update)
                .delete(workflows::delete),
        )
        .route("/{id}/activate", post(workflows::activate))
        .route("/{id}/pause", post(workflows::pause))
        .route("/{id}/stop", post(workflows::stop))
        .route("/{id}/stats", get(workflows::stats))
        .route("/{id}/events", get(events::list_by_workflow))
}
