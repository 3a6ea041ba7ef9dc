use std::sync::Arc;

use replyflow_core::types::Timestamp;
use replyflow_engine::{DispatchService, MonitorScheduler};
use replyflow_events::EventBus;

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: replyflow_db::DbPool,
    /// Server configuration (JWT secret, webhook tokens, timeouts).
    pub config: Arc<ServerConfig>,
    /// WebSocket connection manager (browser clients).
    pub ws_manager: Arc<WsManager>,
    /// Per-workflow polling task scheduler.
    pub scheduler: Arc<MonitorScheduler>,
    /// Comment dispatch pipeline, shared with the scheduler. The webhook
    /// ingestion path feeds comments into it directly.
    pub dispatch: Arc<DispatchService>,
    /// Engine notification bus for realtime push.
    pub event_bus: Arc<EventBus>,
    /// Process start time, reported as uptime by the health endpoint.
    pub started_at: Timestamp,
}
