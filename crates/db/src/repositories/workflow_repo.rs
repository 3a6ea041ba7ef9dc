//! Repository for the `workflows` table.

use sqlx::PgPool;

use replyflow_core::types::DbId;
use replyflow_core::workflow::WorkflowStatus;

use crate::models::workflow::{CreateWorkflow, StatisticsDelta, UpdateWorkflow, Workflow};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, account_id, name, post_id, keywords, \
    message_template, link_url, case_sensitive, exact_match, max_dms_per_day, \
    status, total_triggers, dms_sent, dms_delivered, last_triggered_at, \
    created_at, updated_at";

/// Provides CRUD and counter operations for workflows.
pub struct WorkflowRepo;

impl WorkflowRepo {
    /// Insert a new workflow, returning the created row.
    ///
    /// New workflows always start in `draft`.
    pub async fn create(pool: &PgPool, input: &CreateWorkflow) -> Result<Workflow, sqlx::Error> {
        let query = format!(
            "INSERT INTO workflows
                (user_id, account_id, name, post_id, keywords, message_template,
                 link_url, case_sensitive, exact_match, max_dms_per_day, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Workflow>(&query)
            .bind(input.user_id)
            .bind(input.account_id)
            .bind(&input.name)
            .bind(&input.post_id)
            .bind(&input.keywords)
            .bind(&input.message_template)
            .bind(&input.link_url)
            .bind(input.case_sensitive)
            .bind(input.exact_match)
            .bind(input.max_dms_per_day)
            .bind(WorkflowStatus::Draft.as_str())
            .fetch_one(pool)
            .await
    }

    /// Find a workflow by its primary key.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Workflow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM workflows WHERE id = $1");
        sqlx::query_as::<_, Workflow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List a user's workflows, most recently created first.
    pub async fn list_by_user(pool: &PgPool, user_id: DbId) -> Result<Vec<Workflow>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM workflows WHERE user_id = $1 ORDER BY created_at DESC");
        sqlx::query_as::<_, Workflow>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// List every workflow currently in `active`, oldest first so monitor
    /// bootstrap order is stable.
    pub async fn find_active(pool: &PgPool) -> Result<Vec<Workflow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM workflows WHERE status = 'active' ORDER BY created_at ASC"
        );
        sqlx::query_as::<_, Workflow>(&query).fetch_all(pool).await
    }

    /// List active workflows watching a given post. Used by webhook ingestion
    /// to resolve incoming comment notifications.
    pub async fn find_active_by_post(
        pool: &PgPool,
        post_id: &str,
    ) -> Result<Vec<Workflow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM workflows
             WHERE status = 'active' AND post_id = $1
             ORDER BY created_at ASC"
        );
        sqlx::query_as::<_, Workflow>(&query)
            .bind(post_id)
            .fetch_all(pool)
            .await
    }

    /// Update workflow configuration. Only non-`None` fields in `input` are
    /// applied.
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateWorkflow,
    ) -> Result<Option<Workflow>, sqlx::Error> {
        let query = format!(
            "UPDATE workflows SET
                name = COALESCE($2, name),
                post_id = COALESCE($3, post_id),
                keywords = COALESCE($4, keywords),
                message_template = COALESCE($5, message_template),
                link_url = COALESCE($6, link_url),
                case_sensitive = COALESCE($7, case_sensitive),
                exact_match = COALESCE($8, exact_match),
                max_dms_per_day = COALESCE($9, max_dms_per_day),
                updated_at = now()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Workflow>(&query)
            .bind(id)
            .bind(&input.name)
            .bind(&input.post_id)
            .bind(&input.keywords)
            .bind(&input.message_template)
            .bind(&input.link_url)
            .bind(input.case_sensitive)
            .bind(input.exact_match)
            .bind(input.max_dms_per_day)
            .fetch_optional(pool)
            .await
    }

    /// Set a workflow's status.
    ///
    /// Returns `true` if the row was updated. Transition legality is checked
    /// by the caller against the status state machine.
    pub async fn update_status(
        pool: &PgPool,
        id: DbId,
        status: WorkflowStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE workflows SET status = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Apply counter increments from the dispatch pipeline.
    ///
    /// `last_triggered_at` is refreshed when the trigger counter moves.
    pub async fn increment_statistics(
        pool: &PgPool,
        id: DbId,
        delta: &StatisticsDelta,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE workflows SET
                total_triggers = total_triggers + $2,
                dms_sent = dms_sent + $3,
                dms_delivered = dms_delivered + $4,
                last_triggered_at = CASE WHEN $2 > 0 THEN now() ELSE last_triggered_at END,
                updated_at = now()
             WHERE id = $1",
        )
        .bind(id)
        .bind(delta.total_triggers)
        .bind(delta.dms_sent)
        .bind(delta.dms_delivered)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a workflow and (via cascade) its events.
    ///
    /// Returns `true` if a row was removed. Callers must stop monitoring
    /// first; the handler refuses deletes while the workflow is `active`.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM workflows WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
