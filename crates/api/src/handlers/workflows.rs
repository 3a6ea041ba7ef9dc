//! Handlers for the `/api/workflows` resource.
//!
//! Workflows are strictly per-user: every handler resolves the target row
//! and rejects callers who do not own it. Config updates are only allowed
//! while the workflow is not running; status changes go through the
//! transition table and start/stop the monitor task as a side effect.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use replyflow_core::error::CoreError;
use replyflow_core::events::EventType;
use replyflow_core::types::{DbId, Timestamp};
use replyflow_core::workflow::{
    self, state_machine, WorkflowStatus, DEFAULT_MAX_DMS_PER_DAY,
};
use replyflow_db::models::event::NewEvent;
use replyflow_db::models::workflow::{CreateWorkflow, UpdateWorkflow, Workflow};
use replyflow_db::repositories::{
    AccountRepo, EventRepo, EventTypeCount, KeywordPerformance, WorkflowRepo,
};
use replyflow_events::{EngineEvent, EVENT_WORKFLOW_STATUS};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response payloads
// ---------------------------------------------------------------------------

fn default_max_dms_per_day() -> i32 {
    DEFAULT_MAX_DMS_PER_DAY
}

/// Payload for creating a workflow. New workflows always start in `draft`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateWorkflowRequest {
    pub account_id: DbId,
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub name: String,
    #[validate(length(min = 1, message = "post_id is required"))]
    pub post_id: String,
    pub keywords: Vec<String>,
    #[validate(length(min = 1, max = 1000, message = "message_template must be 1-1000 characters"))]
    pub message_template: String,
    pub link_url: Option<String>,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub exact_match: bool,
    #[validate(range(min = 1, max = 1000, message = "max_dms_per_day must be 1-1000"))]
    #[serde(default = "default_max_dms_per_day")]
    pub max_dms_per_day: i32,
}

/// Payload for updating workflow configuration. All fields are optional.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateWorkflowRequest {
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub name: Option<String>,
    #[validate(length(min = 1, message = "post_id must not be empty"))]
    pub post_id: Option<String>,
    pub keywords: Option<Vec<String>>,
    #[validate(length(min = 1, max = 1000, message = "message_template must be 1-1000 characters"))]
    pub message_template: Option<String>,
    pub link_url: Option<String>,
    pub case_sensitive: Option<bool>,
    pub exact_match: Option<bool>,
    #[validate(range(min = 1, max = 1000, message = "max_dms_per_day must be 1-1000"))]
    pub max_dms_per_day: Option<i32>,
}

/// Aggregated statistics for one workflow: cumulative counters from the
/// workflow row plus breakdowns derived from the audit trail.
#[derive(Debug, Serialize)]
pub struct WorkflowStats {
    pub workflow_id: DbId,
    pub status: WorkflowStatus,
    pub total_triggers: i64,
    pub dms_sent: i64,
    pub dms_delivered: i64,
    /// `dms_sent / total_triggers`, or 0 when nothing has triggered yet.
    pub success_rate: f64,
    pub last_triggered_at: Option<Timestamp>,
    pub events_by_type: Vec<EventTypeCount>,
    pub keywords: Vec<KeywordPerformance>,
}

// ---------------------------------------------------------------------------
// CRUD handlers
// ---------------------------------------------------------------------------

/// GET /api/workflows
pub async fn list(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<Workflow>>>> {
    let workflows = WorkflowRepo::list_by_user(&state.pool, user.user_id).await?;
    Ok(Json(DataResponse { data: workflows }))
}

/// POST /api/workflows
pub async fn create(
    user: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateWorkflowRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<Workflow>>)> {
    input
        .validate()
        .map_err(|e| AppError::Core(CoreError::Validation(e.to_string())))?;
    workflow::validate_keywords(&input.keywords)?;
    if let Some(link) = &input.link_url {
        workflow::validate_link_url(link)?;
    }

    // The connected account must exist and belong to the caller.
    let account = AccountRepo::find_by_id(&state.pool, input.account_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Account",
            id: input.account_id,
        }))?;
    if account.user_id != user.user_id {
        return Err(AppError::Core(CoreError::Forbidden(
            "Account belongs to another user".into(),
        )));
    }

    let workflow = WorkflowRepo::create(
        &state.pool,
        &CreateWorkflow {
            user_id: user.user_id,
            account_id: input.account_id,
            name: input.name,
            post_id: input.post_id,
            keywords: input.keywords,
            message_template: input.message_template,
            link_url: input.link_url,
            case_sensitive: input.case_sensitive,
            exact_match: input.exact_match,
            max_dms_per_day: input.max_dms_per_day,
        },
    )
    .await?;

    tracing::info!(workflow_id = workflow.id, user_id = user.user_id, "Workflow created");

    Ok((StatusCode::CREATED, Json(DataResponse { data: workflow })))
}

/// GET /api/workflows/{id}
pub async fn get_by_id(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Workflow>>> {
    let workflow = find_owned(&state, user.user_id, id).await?;
    Ok(Json(DataResponse { data: workflow }))
}

/// PUT /api/workflows/{id}
///
/// Config fields can only change while the workflow is `draft` or `paused`;
/// a running or stopped workflow rejects edits with 409.
pub async fn update(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateWorkflowRequest>,
) -> AppResult<Json<DataResponse<Workflow>>> {
    let workflow = find_owned(&state, user.user_id, id).await?;
    if !matches!(
        workflow.status,
        WorkflowStatus::Draft | WorkflowStatus::Paused
    ) {
        return Err(AppError::Core(CoreError::Conflict(format!(
            "Cannot edit a {} workflow; pause it first",
            workflow.status
        ))));
    }

    input
        .validate()
        .map_err(|e| AppError::Core(CoreError::Validation(e.to_string())))?;
    if let Some(keywords) = &input.keywords {
        workflow::validate_keywords(keywords)?;
    }
    if let Some(link) = &input.link_url {
        workflow::validate_link_url(link)?;
    }

    let updated = WorkflowRepo::update(
        &state.pool,
        id,
        &UpdateWorkflow {
            name: input.name,
            post_id: input.post_id,
            keywords: input.keywords,
            message_template: input.message_template,
            link_url: input.link_url,
            case_sensitive: input.case_sensitive,
            exact_match: input.exact_match,
            max_dms_per_day: input.max_dms_per_day,
        },
    )
    .await?
    .ok_or(AppError::Core(CoreError::NotFound {
        entity: "Workflow",
        id,
    }))?;

    Ok(Json(DataResponse { data: updated }))
}

/// DELETE /api/workflows/{id}
///
/// Active workflows cannot be deleted; stop them first. Events cascade.
pub async fn delete(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    let workflow = find_owned(&state, user.user_id, id).await?;
    if workflow.status == WorkflowStatus::Active {
        return Err(AppError::Core(CoreError::Conflict(
            "Cannot delete an active workflow; stop it first".into(),
        )));
    }

    // The monitor never runs for non-active workflows, but a paused one may
    // still hold dedupe cache entries.
    state.scheduler.stop(id).await;

    let deleted = WorkflowRepo::delete(&state.pool, id).await?;
    if deleted {
        tracing::info!(workflow_id = id, user_id = user.user_id, "Workflow deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::Core(CoreError::NotFound {
            entity: "Workflow",
            id,
        }))
    }
}

// ---------------------------------------------------------------------------
// Status control handlers
// ---------------------------------------------------------------------------

/// POST /api/workflows/{id}/activate
///
/// Draft or paused to active. The activation gate re-checks keywords and the
/// template so a half-configured draft can never reach the monitor.
pub async fn activate(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Workflow>>> {
    let workflow = find_owned(&state, user.user_id, id).await?;
    workflow::validate_for_activation(&workflow.keywords, &workflow.message_template)?;

    let updated = change_status(&state, &workflow, WorkflowStatus::Active).await?;
    state.scheduler.start(&updated).await;

    Ok(Json(DataResponse { data: updated }))
}

/// POST /api/workflows/{id}/pause
pub async fn pause(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Workflow>>> {
    let workflow = find_owned(&state, user.user_id, id).await?;
    let updated = change_status(&state, &workflow, WorkflowStatus::Paused).await?;
    state.scheduler.stop(id).await;

    Ok(Json(DataResponse { data: updated }))
}

/// POST /api/workflows/{id}/stop
///
/// Terminal: a stopped workflow can never be restarted.
pub async fn stop(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Workflow>>> {
    let workflow = find_owned(&state, user.user_id, id).await?;
    let updated = change_status(&state, &workflow, WorkflowStatus::Stopped).await?;
    state.scheduler.stop(id).await;

    Ok(Json(DataResponse { data: updated }))
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// GET /api/workflows/{id}/stats
pub async fn stats(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<WorkflowStats>>> {
    let workflow = find_owned(&state, user.user_id, id).await?;

    let events_by_type = EventRepo::count_by_type(&state.pool, id).await?;
    let keywords = EventRepo::keyword_performance(&state.pool, id).await?;

    let success_rate = if workflow.total_triggers > 0 {
        workflow.dms_sent as f64 / workflow.total_triggers as f64
    } else {
        0.0
    };

    Ok(Json(DataResponse {
        data: WorkflowStats {
            workflow_id: workflow.id,
            status: workflow.status,
            total_triggers: workflow.total_triggers,
            dms_sent: workflow.dms_sent,
            dms_delivered: workflow.dms_delivered,
            success_rate,
            last_triggered_at: workflow.last_triggered_at,
            events_by_type,
            keywords,
        },
    }))
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Resolve a workflow and verify the caller owns it.
pub(crate) async fn find_owned(
    state: &AppState,
    user_id: DbId,
    id: DbId,
) -> AppResult<Workflow> {
    let workflow = WorkflowRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Workflow",
            id,
        }))?;
    if workflow.user_id != user_id {
        return Err(AppError::Core(CoreError::Forbidden(
            "Workflow belongs to another user".into(),
        )));
    }
    Ok(workflow)
}

/// Apply a status transition: check it against the transition table, persist
/// it, append the matching audit event, and publish a status notification.
///
/// Returns the refreshed workflow row.
async fn change_status(
    state: &AppState,
    workflow: &Workflow,
    to: WorkflowStatus,
) -> AppResult<Workflow> {
    state_machine::validate_transition(workflow.status, to)
        .map_err(|msg| AppError::Core(CoreError::Conflict(msg)))?;

    let updated = WorkflowRepo::update_status(&state.pool, workflow.id, to).await?;
    if !updated {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Workflow",
            id: workflow.id,
        }));
    }

    if let Some(event_type) = EventType::for_status(to) {
        let event = NewEvent::status_change(
            workflow.id,
            event_type,
            Some(serde_json::json!({ "from": workflow.status.as_str() })),
        );
        EventRepo::append(&state.pool, &event).await?;
    }

    state.event_bus.publish(
        EngineEvent::new(EVENT_WORKFLOW_STATUS)
            .with_workflow(workflow.id, workflow.user_id)
            .with_payload(serde_json::json!({ "status": to.as_str() })),
    );

    tracing::info!(
        workflow_id = workflow.id,
        from = %workflow.status,
        to = %to,
        "Workflow status changed"
    );

    WorkflowRepo::find_by_id(&state.pool, workflow.id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Workflow",
            id: workflow.id,
        }))
}
