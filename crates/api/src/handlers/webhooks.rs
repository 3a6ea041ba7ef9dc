//! Provider webhook ingestion.
//!
//! Two endpoints, both unauthenticated in the JWT sense:
//!
//! - GET: subscription verification handshake. The provider sends
//!   `hub.mode=subscribe` with a verify token; matching tokens echo back
//!   `hub.challenge`, anything else is refused.
//! - POST: change notifications, authenticated by an HMAC-SHA256 signature
//!   over the raw body. Comment changes feed the same dispatch pipeline the
//!   poller uses; delivery receipts append `dm_delivered` audit events.
//!
//! Processing failures inside a batch are logged and skipped rather than
//! surfaced: a non-200 response makes the provider redeliver the whole
//! batch, which would re-process the entries that already succeeded.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use replyflow_core::error::CoreError;
use replyflow_db::models::event::NewEvent;
use replyflow_db::models::workflow::StatisticsDelta;
use replyflow_db::repositories::{EventRepo, WorkflowRepo};
use replyflow_events::{EngineEvent, EVENT_DM_DELIVERED};
use replyflow_instagram::types::parse_graph_timestamp;
use replyflow_instagram::Comment;

use crate::auth::signature::{verify_signature, SIGNATURE_HEADER};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

/// Query parameters of the verification handshake.
#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    object: String,
    #[serde(default)]
    entry: Vec<WebhookEntry>,
}

#[derive(Debug, Deserialize)]
struct WebhookEntry {
    #[serde(default)]
    changes: Vec<WebhookChange>,
    #[serde(default)]
    messaging: Vec<MessagingEvent>,
}

#[derive(Debug, Deserialize)]
struct WebhookChange {
    field: String,
    value: serde_json::Value,
}

/// `value` of a `comments` field change.
#[derive(Debug, Deserialize)]
struct CommentChange {
    id: String,
    #[serde(default)]
    text: String,
    from: Option<CommentAuthor>,
    media: Option<MediaRef>,
    timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommentAuthor {
    id: String,
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MessagingEvent {
    delivery: Option<DeliveryReceipt>,
}

#[derive(Debug, Deserialize)]
struct DeliveryReceipt {
    #[serde(default)]
    mids: Vec<String>,
}

impl CommentChange {
    /// Map a webhook comment into the engine-facing shape.
    ///
    /// Returns `None` when the author is missing: without a commenter id
    /// there is nobody to DM.
    fn into_comment(self) -> Option<Comment> {
        let author = self.from?;
        let username = author.username.unwrap_or_else(|| author.id.clone());
        let timestamp = self
            .timestamp
            .as_deref()
            .and_then(|raw| parse_graph_timestamp(raw).ok())
            .unwrap_or_else(chrono::Utc::now);
        Some(Comment {
            id: self.id,
            text: self.text,
            username,
            user_id: author.id,
            timestamp,
        })
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /webhooks/instagram -- subscription verification handshake.
pub async fn verify(State(state): State<AppState>, Query(params): Query<VerifyParams>) -> Response {
    match (params.mode.as_deref(), params.verify_token.as_deref()) {
        (Some("subscribe"), Some(token)) if token == state.config.webhook_verify_token => {
            tracing::info!("Webhook subscription verified");
            (StatusCode::OK, params.challenge.unwrap_or_default()).into_response()
        }
        (Some(_), Some(_)) => {
            tracing::warn!("Webhook verification failed: token mismatch");
            StatusCode::FORBIDDEN.into_response()
        }
        _ => {
            tracing::warn!("Webhook verification failed: missing parameters");
            StatusCode::BAD_REQUEST.into_response()
        }
    }
}

/// POST /webhooks/instagram -- signed change notifications.
pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Response> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized("Missing payload signature".into()))
        })?;
    if !verify_signature(&state.config.app_secret, &body, signature) {
        return Err(AppError::Core(CoreError::Unauthorized(
            "Invalid payload signature".into(),
        )));
    }

    let payload: WebhookPayload = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Malformed webhook payload: {e}")))?;

    if payload.object != "instagram" {
        return Ok(StatusCode::NOT_FOUND.into_response());
    }

    for entry in payload.entry {
        for change in entry.changes {
            if change.field == "comments" {
                handle_comment_change(&state, change.value).await;
            } else {
                tracing::debug!(field = %change.field, "Ignoring webhook change");
            }
        }
        for messaging in entry.messaging {
            if let Some(delivery) = messaging.delivery {
                handle_delivery_receipt(&state, &delivery).await;
            }
        }
    }

    Ok((StatusCode::OK, "EVENT_RECEIVED").into_response())
}

// ---------------------------------------------------------------------------
// Batch item processing
// ---------------------------------------------------------------------------

/// Feed one comment change into the dispatch pipeline of every active
/// workflow watching that post.
async fn handle_comment_change(state: &AppState, value: serde_json::Value) {
    let change: CommentChange = match serde_json::from_value(value) {
        Ok(change) => change,
        Err(e) => {
            tracing::warn!(error = %e, "Unparseable comment change, skipping");
            return;
        }
    };

    let Some(post_id) = change.media.as_ref().map(|m| m.id.clone()) else {
        tracing::warn!(comment_id = %change.id, "Comment change without media id, skipping");
        return;
    };
    let Some(comment) = change.into_comment() else {
        tracing::warn!("Comment change without author, skipping");
        return;
    };

    let workflows = match WorkflowRepo::find_active_by_post(&state.pool, &post_id).await {
        Ok(workflows) => workflows,
        Err(e) => {
            tracing::error!(error = %e, post_id = %post_id, "Workflow lookup failed");
            return;
        }
    };
    if workflows.is_empty() {
        tracing::debug!(post_id = %post_id, "No active workflow for post");
        return;
    }

    for workflow in workflows {
        match state
            .dispatch
            .handle_comment_for_workflow(workflow.id, &comment)
            .await
        {
            Ok(Some(outcome)) => {
                tracing::info!(
                    workflow_id = workflow.id,
                    comment_id = %comment.id,
                    outcome = outcome.label(),
                    "Webhook comment processed"
                );
            }
            Ok(None) => {
                tracing::debug!(
                    workflow_id = workflow.id,
                    comment_id = %comment.id,
                    "Webhook comment did not match"
                );
            }
            Err(e) => {
                tracing::error!(
                    workflow_id = workflow.id,
                    comment_id = %comment.id,
                    error = %e,
                    "Webhook comment dispatch failed"
                );
            }
        }
    }
}

/// Resolve delivery receipts to their `dm_sent` events and record delivery.
async fn handle_delivery_receipt(state: &AppState, delivery: &DeliveryReceipt) {
    for mid in &delivery.mids {
        let sent = match EventRepo::find_by_dm_id(&state.pool, mid).await {
            Ok(Some(sent)) => sent,
            Ok(None) => {
                tracing::debug!(dm_id = %mid, "Delivery receipt for unknown DM");
                continue;
            }
            Err(e) => {
                tracing::error!(dm_id = %mid, error = %e, "DM lookup failed");
                continue;
            }
        };

        let event =
            NewEvent::dm_delivered(sent.workflow_id, mid, sent.commenter_user_id.as_deref());
        if let Err(e) = EventRepo::append(&state.pool, &event).await {
            tracing::error!(dm_id = %mid, error = %e, "Failed to record delivery event");
            continue;
        }
        if let Err(e) = WorkflowRepo::increment_statistics(
            &state.pool,
            sent.workflow_id,
            &StatisticsDelta::dm_delivered(),
        )
        .await
        {
            tracing::error!(
                workflow_id = sent.workflow_id,
                error = %e,
                "Failed to bump delivery counter"
            );
        }

        match WorkflowRepo::find_by_id(&state.pool, sent.workflow_id).await {
            Ok(Some(workflow)) => {
                state.event_bus.publish(
                    EngineEvent::new(EVENT_DM_DELIVERED)
                        .with_workflow(workflow.id, workflow.user_id)
                        .with_payload(serde_json::json!({ "dm_id": mid })),
                );
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(
                    workflow_id = sent.workflow_id,
                    error = %e,
                    "Workflow lookup for delivery notification failed"
                );
            }
        }

        tracing::info!(
            workflow_id = sent.workflow_id,
            dm_id = %mid,
            "DM delivery recorded"
        );
    }
}
