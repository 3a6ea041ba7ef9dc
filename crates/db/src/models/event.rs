//! Audit-trail event model and DTOs.
//!
//! Events are append-only: there are no update or delete DTOs on purpose.

use serde::Serialize;
use sqlx::FromRow;

use replyflow_core::events::{DmStatus, EventType};
use replyflow_core::types::{DbId, Timestamp};

/// Longest comment text stored on an event; longer texts are cut.
pub const MAX_COMMENT_TEXT_LENGTH: usize = 2200;

/// Longest error detail stored on an event; longer messages are cut.
pub const MAX_ERROR_MESSAGE_LENGTH: usize = 500;

/// Full event row from the `events` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Event {
    pub id: DbId,
    pub workflow_id: DbId,
    #[sqlx(try_from = "String")]
    pub event_type: EventType,
    pub comment_id: Option<String>,
    pub commenter_username: Option<String>,
    pub commenter_user_id: Option<String>,
    pub comment_text: Option<String>,
    pub matched_keyword: Option<String>,
    pub dm_status: Option<String>,
    pub dm_id: Option<String>,
    pub error_message: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Timestamp,
}

/// DTO for appending one event to the audit trail.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub workflow_id: DbId,
    pub event_type: EventType,
    pub comment_id: Option<String>,
    pub commenter_username: Option<String>,
    pub commenter_user_id: Option<String>,
    pub comment_text: Option<String>,
    pub matched_keyword: Option<String>,
    pub dm_status: Option<DmStatus>,
    pub dm_id: Option<String>,
    pub error_message: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl NewEvent {
    fn base(workflow_id: DbId, event_type: EventType) -> Self {
        Self {
            workflow_id,
            event_type,
            comment_id: None,
            commenter_username: None,
            commenter_user_id: None,
            comment_text: None,
            matched_keyword: None,
            dm_status: None,
            dm_id: None,
            error_message: None,
            metadata: None,
        }
    }

    /// A comment matched one of the workflow's keywords.
    pub fn comment_detected(
        workflow_id: DbId,
        comment_id: &str,
        commenter_username: &str,
        commenter_user_id: &str,
        comment_text: &str,
        matched_keyword: &str,
    ) -> Self {
        let mut event = Self::base(workflow_id, EventType::CommentDetected);
        event.comment_id = Some(comment_id.to_string());
        event.commenter_username = Some(commenter_username.to_string());
        event.commenter_user_id = Some(commenter_user_id.to_string());
        event.comment_text = Some(truncate_chars(comment_text, MAX_COMMENT_TEXT_LENGTH));
        event.matched_keyword = Some(matched_keyword.to_string());
        event
    }

    /// A DM went out to the commenter.
    pub fn dm_sent(
        workflow_id: DbId,
        comment_id: &str,
        commenter_username: &str,
        commenter_user_id: &str,
        matched_keyword: &str,
        dm_id: &str,
    ) -> Self {
        let mut event = Self::base(workflow_id, EventType::DmSent);
        event.comment_id = Some(comment_id.to_string());
        event.commenter_username = Some(commenter_username.to_string());
        event.commenter_user_id = Some(commenter_user_id.to_string());
        event.matched_keyword = Some(matched_keyword.to_string());
        event.dm_status = Some(DmStatus::Sent);
        event.dm_id = Some(dm_id.to_string());
        event
    }

    /// A DM attempt was rejected by the provider.
    pub fn dm_failed(
        workflow_id: DbId,
        comment_id: &str,
        commenter_username: &str,
        commenter_user_id: &str,
        matched_keyword: &str,
        error: &str,
    ) -> Self {
        let mut event = Self::base(workflow_id, EventType::DmFailed);
        event.comment_id = Some(comment_id.to_string());
        event.commenter_username = Some(commenter_username.to_string());
        event.commenter_user_id = Some(commenter_user_id.to_string());
        event.matched_keyword = Some(matched_keyword.to_string());
        event.dm_status = Some(DmStatus::Failed);
        event.error_message = Some(truncate_chars(error, MAX_ERROR_MESSAGE_LENGTH));
        event
    }

    /// The provider confirmed delivery of a previously sent DM.
    pub fn dm_delivered(workflow_id: DbId, dm_id: &str, recipient_id: Option<&str>) -> Self {
        let mut event = Self::base(workflow_id, EventType::DmDelivered);
        event.dm_status = Some(DmStatus::Delivered);
        event.dm_id = Some(dm_id.to_string());
        event.commenter_user_id = recipient_id.map(str::to_string);
        event
    }

    /// The workflow changed status (activated / paused / stopped).
    pub fn status_change(
        workflow_id: DbId,
        event_type: EventType,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        let mut event = Self::base(workflow_id, event_type);
        event.metadata = metadata;
        event
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
