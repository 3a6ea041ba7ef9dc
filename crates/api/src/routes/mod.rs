pub mod health;
pub mod webhooks;
pub mod workflows;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /workflows                        list, create
/// /workflows/{id}                   get, update, delete
/// /workflows/{id}/activate          activate (POST)
/// /workflows/{id}/pause             pause (POST)
/// /workflows/{id}/stop              stop (POST)
/// /workflows/{id}/stats             aggregated statistics (GET)
/// /workflows/{id}/events            audit trail (GET, ?limit, ?event_type)
/// ```
///
/// The WebSocket endpoint and the provider webhook endpoints are mounted at
/// the root by `main`, outside this tree: webhooks authenticate by payload
/// signature rather than bearer token, and the WebSocket takes its token as
/// a query parameter.
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/workflows", workflows::router())
}
