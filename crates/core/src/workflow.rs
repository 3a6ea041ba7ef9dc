//! Workflow status vocabulary, status state machine, and config validation.
//!
//! This module lives in `core` (zero internal deps) so it can be used by both
//! the API/repository layer and the monitoring engine.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::template::MAX_MESSAGE_LENGTH;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Draft,
    Active,
    Paused,
    Stopped,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Draft => "draft",
            WorkflowStatus::Active => "active",
            WorkflowStatus::Paused => "paused",
            WorkflowStatus::Stopped => "stopped",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "draft" => Ok(WorkflowStatus::Draft),
            "active" => Ok(WorkflowStatus::Active),
            "paused" => Ok(WorkflowStatus::Paused),
            "stopped" => Ok(WorkflowStatus::Stopped),
            other => Err(CoreError::Validation(format!(
                "Unknown workflow status '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for WorkflowStatus {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        WorkflowStatus::parse(&value)
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

pub mod state_machine {
    use super::WorkflowStatus;

    /// Returns the set of valid target statuses reachable from `from`.
    ///
    /// `Stopped` is terminal and returns an empty slice; there is no path
    /// back to `Draft` from anywhere.
    pub fn valid_transitions(from: WorkflowStatus) -> &'static [WorkflowStatus] {
        match from {
            WorkflowStatus::Draft => &[WorkflowStatus::Active],
            WorkflowStatus::Active => &[WorkflowStatus::Paused, WorkflowStatus::Stopped],
            WorkflowStatus::Paused => &[WorkflowStatus::Active, WorkflowStatus::Stopped],
            WorkflowStatus::Stopped => &[],
        }
    }

    /// Check whether a transition from `from` to `to` is valid.
    pub fn can_transition(from: WorkflowStatus, to: WorkflowStatus) -> bool {
        valid_transitions(from).contains(&to)
    }

    /// Validate a status transition, returning an error message for invalid
    /// ones.
    pub fn validate_transition(from: WorkflowStatus, to: WorkflowStatus) -> Result<(), String> {
        if can_transition(from, to) {
            Ok(())
        } else {
            Err(format!("Invalid transition: {from} -> {to}"))
        }
    }
}

// ---------------------------------------------------------------------------
// Config limits
// ---------------------------------------------------------------------------

pub const MAX_NAME_LENGTH: usize = 100;
pub const MAX_KEYWORD_LENGTH: usize = 50;
pub const MIN_DMS_PER_DAY: i32 = 1;
pub const MAX_DMS_PER_DAY: i32 = 1000;
pub const DEFAULT_MAX_DMS_PER_DAY: i32 = 100;

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a workflow display name.
pub fn validate_name(name: &str) -> Result<(), CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation("Workflow name is required".into()));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(CoreError::Validation(format!(
            "Workflow name must be at most {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Validate the target post identifier.
pub fn validate_post_id(post_id: &str) -> Result<(), CoreError> {
    if post_id.trim().is_empty() {
        return Err(CoreError::Validation("Post id is required".into()));
    }
    Ok(())
}

/// Validate the trigger keyword list: non-empty, each entry non-blank and
/// within length bounds.
pub fn validate_keywords(keywords: &[String]) -> Result<(), CoreError> {
    if keywords.is_empty() {
        return Err(CoreError::Validation(
            "At least one trigger keyword is required".into(),
        ));
    }
    for keyword in keywords {
        if keyword.trim().is_empty() {
            return Err(CoreError::Validation("Keywords must not be blank".into()));
        }
        if keyword.chars().count() > MAX_KEYWORD_LENGTH {
            return Err(CoreError::Validation(format!(
                "Keyword '{keyword}' exceeds {MAX_KEYWORD_LENGTH} characters"
            )));
        }
    }
    Ok(())
}

/// Validate the DM message template.
pub fn validate_message_template(template: &str) -> Result<(), CoreError> {
    if template.trim().is_empty() {
        return Err(CoreError::Validation("Message template is required".into()));
    }
    if template.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(CoreError::Validation(format!(
            "Message template must be at most {MAX_MESSAGE_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Validate an optional link URL. Only http(s) links are accepted.
pub fn validate_link_url(link_url: &str) -> Result<(), CoreError> {
    let trimmed = link_url.trim();
    let valid = (trimmed.starts_with("http://") || trimmed.starts_with("https://"))
        && trimmed.len() > "https://".len()
        && !trimmed.contains(char::is_whitespace);
    if valid {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid link URL '{link_url}'"
        )))
    }
}

/// Validate the per-workflow daily DM cap.
pub fn validate_max_dms_per_day(value: i32) -> Result<(), CoreError> {
    if (MIN_DMS_PER_DAY..=MAX_DMS_PER_DAY).contains(&value) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "maxDmsPerDay must be between {MIN_DMS_PER_DAY} and {MAX_DMS_PER_DAY}, got {value}"
        )))
    }
}

/// Gate applied before a workflow becomes `Active`: the monitor never receives
/// a workflow without keywords or without a message template.
pub fn validate_for_activation(keywords: &[String], template: &str) -> Result<(), CoreError> {
    validate_keywords(keywords)?;
    validate_message_template(template)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
