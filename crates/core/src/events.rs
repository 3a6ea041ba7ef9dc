//! Event and DM delivery vocabularies for the audit trail.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::workflow::WorkflowStatus;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// Kind of an audit-trail event. Events are append-only; this list is the
/// full vocabulary the engine emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    CommentDetected,
    DmSent,
    DmFailed,
    DmDelivered,
    WorkflowActivated,
    WorkflowPaused,
    WorkflowStopped,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::CommentDetected => "comment_detected",
            EventType::DmSent => "dm_sent",
            EventType::DmFailed => "dm_failed",
            EventType::DmDelivered => "dm_delivered",
            EventType::WorkflowActivated => "workflow_activated",
            EventType::WorkflowPaused => "workflow_paused",
            EventType::WorkflowStopped => "workflow_stopped",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "comment_detected" => Ok(EventType::CommentDetected),
            "dm_sent" => Ok(EventType::DmSent),
            "dm_failed" => Ok(EventType::DmFailed),
            "dm_delivered" => Ok(EventType::DmDelivered),
            "workflow_activated" => Ok(EventType::WorkflowActivated),
            "workflow_paused" => Ok(EventType::WorkflowPaused),
            "workflow_stopped" => Ok(EventType::WorkflowStopped),
            other => Err(CoreError::Validation(format!(
                "Unknown event type '{other}'"
            ))),
        }
    }

    /// Event recorded when a workflow enters `status`, if any. `Draft` has no
    /// status-change event because workflows are created in it.
    pub fn for_status(status: WorkflowStatus) -> Option<Self> {
        match status {
            WorkflowStatus::Active => Some(EventType::WorkflowActivated),
            WorkflowStatus::Paused => Some(EventType::WorkflowPaused),
            WorkflowStatus::Stopped => Some(EventType::WorkflowStopped),
            WorkflowStatus::Draft => None,
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for EventType {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        EventType::parse(&value)
    }
}

// ---------------------------------------------------------------------------
// DM delivery states
// ---------------------------------------------------------------------------

/// Delivery state attached to DM-related events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DmStatus {
    Pending,
    Sent,
    Delivered,
    Failed,
    Blocked,
}

impl DmStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DmStatus::Pending => "pending",
            DmStatus::Sent => "sent",
            DmStatus::Delivered => "delivered",
            DmStatus::Failed => "failed",
            DmStatus::Blocked => "blocked",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "pending" => Ok(DmStatus::Pending),
            "sent" => Ok(DmStatus::Sent),
            "delivered" => Ok(DmStatus::Delivered),
            "failed" => Ok(DmStatus::Failed),
            "blocked" => Ok(DmStatus::Blocked),
            other => Err(CoreError::Validation(format!("Unknown dm status '{other}'"))),
        }
    }
}

impl std::fmt::Display for DmStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for DmStatus {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        DmStatus::parse(&value)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
