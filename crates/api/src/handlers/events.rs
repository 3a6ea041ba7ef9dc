//! Handlers for the workflow event audit trail.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use replyflow_core::events::EventType;
use replyflow_core::types::DbId;
use replyflow_db::models::event::Event;
use replyflow_db::repositories::{event_repo::DEFAULT_LIST_LIMIT, EventRepo};

use crate::error::AppResult;
use crate::handlers::workflows::find_owned;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Query parameters for event listing (`?limit=&event_type=`).
#[derive(Debug, Deserialize)]
pub struct EventListParams {
    pub limit: Option<i64>,
    pub event_type: Option<String>,
}

/// GET /api/workflows/{id}/events
///
/// Recent events for a workflow, newest first. `limit` defaults to 50 and is
/// capped at 200 in the repository; `event_type` filters to one type.
pub async fn list_by_workflow(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Query(params): Query<EventListParams>,
) -> AppResult<Json<DataResponse<Vec<Event>>>> {
    find_owned(&state, user.user_id, id).await?;

    let event_type = params
        .event_type
        .as_deref()
        .map(EventType::parse)
        .transpose()?;
    let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT);

    let events = EventRepo::list_by_workflow(&state.pool, id, event_type, limit).await?;
    Ok(Json(DataResponse { data: events }))
}
