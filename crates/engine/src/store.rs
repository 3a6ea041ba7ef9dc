//! Persistence seam consumed by the engine.
//!
//! The engine never touches sqlx directly: everything goes through
//! [`EngineStore`], implemented by [`PgEngineStore`] over the db repositories
//! in production and by an in-memory fake in tests.

use async_trait::async_trait;

use replyflow_core::events::EventType;
use replyflow_core::types::{DbId, Timestamp};
use replyflow_core::workflow::WorkflowStatus;
use replyflow_db::models::event::{Event, NewEvent};
use replyflow_db::models::workflow::{StatisticsDelta, Workflow};
use replyflow_db::repositories::{AccountRepo, EventRepo, WorkflowRepo};
use replyflow_db::DbPool;

use crate::error::EngineError;

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

/// Provider credential resolved for one connected account.
#[derive(Debug, Clone)]
pub struct Credential {
    /// Internal database id of the account row.
    pub account_id: DbId,
    /// Identity of the account at the social provider; sender of DMs.
    pub provider_account_id: String,
    pub access_token: String,
    /// `None` means the provider reported no expiry.
    pub expires_at: Option<Timestamp>,
}

impl Credential {
    /// Whether the token is past its expiry at `now`.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        match self.expires_at {
            Some(expires_at) => now > expires_at,
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// EngineStore
// ---------------------------------------------------------------------------

/// Durable-store operations the engine depends on.
#[async_trait]
pub trait EngineStore: Send + Sync {
    async fn find_workflow(&self, id: DbId) -> Result<Option<Workflow>, EngineError>;

    /// Every workflow currently in `active`, in stable bootstrap order.
    async fn find_active_workflows(&self) -> Result<Vec<Workflow>, EngineError>;

    async fn update_workflow_status(
        &self,
        id: DbId,
        status: WorkflowStatus,
    ) -> Result<(), EngineError>;

    /// Apply counter increments from the dispatch pipeline.
    async fn increment_statistics(
        &self,
        id: DbId,
        delta: &StatisticsDelta,
    ) -> Result<(), EngineError>;

    /// Append one event to the audit trail.
    async fn append_event(&self, event: &NewEvent) -> Result<(), EngineError>;

    /// Most recent event of any of `types` for a (workflow, recipient) pair.
    /// The duplicate guard's durable source of truth.
    async fn find_dm_event(
        &self,
        workflow_id: DbId,
        recipient_id: &str,
        types: &[EventType],
    ) -> Result<Option<Event>, EngineError>;

    /// Resolve the provider credential for an account.
    async fn account_credential(&self, account_id: DbId)
        -> Result<Option<Credential>, EngineError>;
}

// ---------------------------------------------------------------------------
// Postgres implementation
// ---------------------------------------------------------------------------

/// [`EngineStore`] backed by the Postgres repositories.
pub struct PgEngineStore {
    pool: DbPool,
}

impl PgEngineStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EngineStore for PgEngineStore {
    async fn find_workflow(&self, id: DbId) -> Result<Option<Workflow>, EngineError> {
        Ok(WorkflowRepo::find_by_id(&self.pool, id).await?)
    }

    async fn find_active_workflows(&self) -> Result<Vec<Workflow>, EngineError> {
        Ok(WorkflowRepo::find_active(&self.pool).await?)
    }

    async fn update_workflow_status(
        &self,
        id: DbId,
        status: WorkflowStatus,
    ) -> Result<(), EngineError> {
        let updated = WorkflowRepo::update_status(&self.pool, id, status).await?;
        if !updated {
            return Err(EngineError::WorkflowNotFound(id));
        }
        Ok(())
    }

    async fn increment_statistics(
        &self,
        id: DbId,
        delta: &StatisticsDelta,
    ) -> Result<(), EngineError> {
        let updated = WorkflowRepo::increment_statistics(&self.pool, id, delta).await?;
        if !updated {
            return Err(EngineError::WorkflowNotFound(id));
        }
        Ok(())
    }

    async fn append_event(&self, event: &NewEvent) -> Result<(), EngineError> {
        EventRepo::append(&self.pool, event).await?;
        Ok(())
    }

    async fn find_dm_event(
        &self,
        workflow_id: DbId,
        recipient_id: &str,
        types: &[EventType],
    ) -> Result<Option<Event>, EngineError> {
        Ok(EventRepo::find_for_recipient(&self.pool, workflow_id, recipient_id, types).await?)
    }

    async fn account_credential(
        &self,
        account_id: DbId,
    ) -> Result<Option<Credential>, EngineError> {
        let account = AccountRepo::find_by_id(&self.pool, account_id).await?;
        Ok(account.map(|a| Credential {
            account_id: a.id,
            provider_account_id: a.provider_account_id,
            access_token: a.access_token,
            expires_at: a.token_expires_at,
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn credential(expires_at: Option<Timestamp>) -> Credential {
        Credential {
            account_id: 1,
            provider_account_id: "17840001".into(),
            access_token: "tok".into(),
            expires_at,
        }
    }

    #[test]
    fn credential_expiry_is_checked_against_now() {
        let now = Utc::now();
        assert!(credential(Some(now - Duration::minutes(1))).is_expired(now));
        assert!(!credential(Some(now + Duration::minutes(1))).is_expired(now));
        assert!(!credential(None).is_expired(now));
    }
}
