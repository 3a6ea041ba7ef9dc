//! Repository for the `events` table.
//!
//! Events are the audit trail: insert and read only, no updates or deletes.

use sqlx::{FromRow, PgPool};

use replyflow_core::events::EventType;
use replyflow_core::types::DbId;

use crate::models::event::{Event, NewEvent};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, workflow_id, event_type, comment_id, commenter_username, \
    commenter_user_id, comment_text, matched_keyword, dm_status, dm_id, \
    error_message, metadata, created_at";

/// Default page size for event listings.
pub const DEFAULT_LIST_LIMIT: i64 = 50;

/// Hard cap on event listing page size.
pub const MAX_LIST_LIMIT: i64 = 200;

/// Per-event-type counters for one workflow.
#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct EventTypeCount {
    pub event_type: String,
    pub count: i64,
}

/// Trigger/send counters per matched keyword for one workflow.
#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct KeywordPerformance {
    pub keyword: String,
    pub triggers: i64,
    pub dms_sent: i64,
}

/// Provides append/read operations for audit events.
pub struct EventRepo;

impl EventRepo {
    /// Append one event, returning the stored row.
    pub async fn append(pool: &PgPool, input: &NewEvent) -> Result<Event, sqlx::Error> {
        let query = format!(
            "INSERT INTO events
                (workflow_id, event_type, comment_id, commenter_username,
                 commenter_user_id, comment_text, matched_keyword, dm_status,
                 dm_id, error_message, metadata)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Event>(&query)
            .bind(input.workflow_id)
            .bind(input.event_type.as_str())
            .bind(&input.comment_id)
            .bind(&input.commenter_username)
            .bind(&input.commenter_user_id)
            .bind(&input.comment_text)
            .bind(&input.matched_keyword)
            .bind(input.dm_status.map(|s| s.as_str()))
            .bind(&input.dm_id)
            .bind(&input.error_message)
            .bind(&input.metadata)
            .fetch_one(pool)
            .await
    }

    /// List a workflow's events newest-first, optionally filtered by type.
    pub async fn list_by_workflow(
        pool: &PgPool,
        workflow_id: DbId,
        event_type: Option<EventType>,
        limit: i64,
    ) -> Result<Vec<Event>, sqlx::Error> {
        let limit = limit.clamp(1, MAX_LIST_LIMIT);
        match event_type {
            Some(et) => {
                let query = format!(
                    "SELECT {COLUMNS} FROM events
                     WHERE workflow_id = $1 AND event_type = $2
                     ORDER BY created_at DESC, id DESC LIMIT $3"
                );
                sqlx::query_as::<_, Event>(&query)
                    .bind(workflow_id)
                    .bind(et.as_str())
                    .bind(limit)
                    .fetch_all(pool)
                    .await
            }
            None => {
                let query = format!(
                    "SELECT {COLUMNS} FROM events
                     WHERE workflow_id = $1
                     ORDER BY created_at DESC, id DESC LIMIT $2"
                );
                sqlx::query_as::<_, Event>(&query)
                    .bind(workflow_id)
                    .bind(limit)
                    .fetch_all(pool)
                    .await
            }
        }
    }

    /// Find the most recent event of any of `types` for a (workflow,
    /// recipient) pair. The duplicate guard uses this as its durable
    /// source of truth.
    pub async fn find_for_recipient(
        pool: &PgPool,
        workflow_id: DbId,
        commenter_user_id: &str,
        types: &[EventType],
    ) -> Result<Option<Event>, sqlx::Error> {
        let type_names: Vec<String> = types.iter().map(|t| t.as_str().to_string()).collect();
        let query = format!(
            "SELECT {COLUMNS} FROM events
             WHERE workflow_id = $1 AND commenter_user_id = $2 AND event_type = ANY($3)
             ORDER BY created_at DESC, id DESC LIMIT 1"
        );
        sqlx::query_as::<_, Event>(&query)
            .bind(workflow_id)
            .bind(commenter_user_id)
            .bind(&type_names)
            .fetch_optional(pool)
            .await
    }

    /// The dm_sent event matching a provider message id, if any. Used to
    /// resolve delivery receipts to a workflow.
    pub async fn find_by_dm_id(
        pool: &PgPool,
        dm_id: &str,
    ) -> Result<Option<Event>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM events
             WHERE dm_id = $1 AND event_type = 'dm_sent'
             ORDER BY created_at DESC, id DESC LIMIT 1"
        );
        sqlx::query_as::<_, Event>(&query)
            .bind(dm_id)
            .fetch_optional(pool)
            .await
    }

    /// Event counts grouped by type for one workflow.
    pub async fn count_by_type(
        pool: &PgPool,
        workflow_id: DbId,
    ) -> Result<Vec<EventTypeCount>, sqlx::Error> {
        sqlx::query_as::<_, EventTypeCount>(
            "SELECT event_type, COUNT(*) AS count
             FROM events WHERE workflow_id = $1
             GROUP BY event_type",
        )
        .bind(workflow_id)
        .fetch_all(pool)
        .await
    }

    /// Per-keyword trigger and send counts, busiest keyword first.
    pub async fn keyword_performance(
        pool: &PgPool,
        workflow_id: DbId,
    ) -> Result<Vec<KeywordPerformance>, sqlx::Error> {
        sqlx::query_as::<_, KeywordPerformance>(
            "SELECT matched_keyword AS keyword,
                    COUNT(*) FILTER (WHERE event_type = 'comment_detected') AS triggers,
                    COUNT(*) FILTER (WHERE event_type = 'dm_sent') AS dms_sent
             FROM events
             WHERE workflow_id = $1 AND matched_keyword IS NOT NULL
             GROUP BY matched_keyword
             ORDER BY triggers DESC",
        )
        .bind(workflow_id)
        .fetch_all(pool)
        .await
    }
}
