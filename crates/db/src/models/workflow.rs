//! Workflow entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use replyflow_core::matching::MatchSettings;
use replyflow_core::types::{DbId, Timestamp};
use replyflow_core::workflow::WorkflowStatus;

/// Full workflow row from the `workflows` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Workflow {
    pub id: DbId,
    pub user_id: DbId,
    pub account_id: DbId,
    pub name: String,
    /// Provider-side identifier of the monitored post.
    pub post_id: String,
    pub keywords: Vec<String>,
    pub message_template: String,
    pub link_url: Option<String>,
    pub case_sensitive: bool,
    pub exact_match: bool,
    pub max_dms_per_day: i32,
    #[sqlx(try_from = "String")]
    pub status: WorkflowStatus,
    pub total_triggers: i64,
    pub dms_sent: i64,
    pub dms_delivered: i64,
    pub last_triggered_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Workflow {
    /// Matching settings consumed by the keyword matcher.
    pub fn match_settings(&self) -> MatchSettings {
        MatchSettings {
            case_sensitive: self.case_sensitive,
            exact_match: self.exact_match,
        }
    }
}

/// DTO for creating a new workflow. New workflows always start in `draft`.
#[derive(Debug, Deserialize)]
pub struct CreateWorkflow {
    pub user_id: DbId,
    pub account_id: DbId,
    pub name: String,
    pub post_id: String,
    pub keywords: Vec<String>,
    pub message_template: String,
    pub link_url: Option<String>,
    pub case_sensitive: bool,
    pub exact_match: bool,
    pub max_dms_per_day: i32,
}

/// DTO for updating workflow configuration. All fields are optional.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateWorkflow {
    pub name: Option<String>,
    pub post_id: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub message_template: Option<String>,
    pub link_url: Option<String>,
    pub case_sensitive: Option<bool>,
    pub exact_match: Option<bool>,
    pub max_dms_per_day: Option<i32>,
}

/// Increments applied to a workflow's cumulative counters.
///
/// `last_triggered_at` is refreshed whenever `total_triggers` is bumped.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatisticsDelta {
    pub total_triggers: i64,
    pub dms_sent: i64,
    pub dms_delivered: i64,
}

impl StatisticsDelta {
    pub fn trigger() -> Self {
        Self {
            total_triggers: 1,
            ..Self::default()
        }
    }

    pub fn dm_sent() -> Self {
        Self {
            dms_sent: 1,
            ..Self::default()
        }
    }

    pub fn dm_delivered() -> Self {
        Self {
            dms_delivered: 1,
            ..Self::default()
        }
    }
}
