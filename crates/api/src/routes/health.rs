use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the database is reachable.
    pub db_healthy: bool,
    /// Number of workflows currently being polled.
    pub active_monitors: usize,
    /// Number of open WebSocket connections.
    pub ws_connections: usize,
    /// Seconds since the process started.
    pub uptime_secs: i64,
}

/// GET /health -- returns service, database, and engine health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = replyflow_db::health_check(&state.pool).await.is_ok();

    let status = if db_healthy { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        active_monitors: state.scheduler.running_count().await,
        ws_connections: state.ws_manager.connection_count().await,
        uptime_secs: (chrono::Utc::now() - state.started_at).num_seconds(),
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
