//! Dispatch pipeline: one matched comment in, one DM attempt out.

use std::sync::Arc;

use serde_json::json;

use replyflow_core::matching::find_keyword_match;
use replyflow_core::template::{compose, TemplateVars};
use replyflow_core::types::DbId;
use replyflow_db::models::event::NewEvent;
use replyflow_db::models::workflow::{StatisticsDelta, Workflow};
use replyflow_events::{EngineEvent, EventBus, EVENT_WORKFLOW_TRIGGERED};
use replyflow_instagram::{Comment, ProviderApi};

use crate::dedupe::DuplicateGuard;
use crate::error::EngineError;
use crate::rate_limit::RateLimiter;
use crate::store::{Credential, EngineStore};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Why a matched comment was skipped without a provider send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Duplicate,
    RateLimited,
    Unreachable,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Duplicate => "duplicate",
            SkipReason::RateLimited => "rate_limited",
            SkipReason::Unreachable => "unreachable",
        }
    }
}

/// Result of dispatching one matched comment. Skips are not errors: they are
/// expected pipeline exits, recorded with a reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent { dm_id: String },
    Skipped { reason: SkipReason },
    Failed { error: String },
}

impl DispatchOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            DispatchOutcome::Sent { .. } => "sent",
            DispatchOutcome::Skipped { .. } => "skipped",
            DispatchOutcome::Failed { .. } => "failed",
        }
    }

    /// Notification payload fragment describing this outcome.
    fn describe(&self) -> serde_json::Value {
        match self {
            DispatchOutcome::Sent { dm_id } => json!({"outcome": "sent", "dm_id": dm_id}),
            DispatchOutcome::Skipped { reason } => {
                json!({"outcome": "skipped", "reason": reason.as_str()})
            }
            DispatchOutcome::Failed { error } => json!({"outcome": "failed", "error": error}),
        }
    }
}

// ---------------------------------------------------------------------------
// DispatchService
// ---------------------------------------------------------------------------

/// Turns matched comments into outbound DM attempts.
///
/// [`handle_comment`](DispatchService::handle_comment) is the single
/// comment-processing entry point shared by the poll loop and the webhook
/// ingestion path. Nothing in the pipeline propagates an error to the
/// caller; every step short-circuits to a [`DispatchOutcome`].
pub struct DispatchService {
    store: Arc<dyn EngineStore>,
    provider: Arc<dyn ProviderApi>,
    rate_limiter: Arc<RateLimiter>,
    duplicate_guard: Arc<DuplicateGuard>,
    bus: Arc<EventBus>,
}

impl DispatchService {
    pub fn new(
        store: Arc<dyn EngineStore>,
        provider: Arc<dyn ProviderApi>,
        rate_limiter: Arc<RateLimiter>,
        duplicate_guard: Arc<DuplicateGuard>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            store,
            provider,
            rate_limiter,
            duplicate_guard,
            bus,
        }
    }

    /// Process one incoming comment against a workflow.
    ///
    /// Runs the keyword matcher; on a match logs `comment_detected`, bumps
    /// the trigger counter, dispatches, and publishes a `workflow_triggered`
    /// notification carrying the outcome. Returns `None` when no keyword
    /// matched.
    pub async fn handle_comment(
        &self,
        workflow: &Workflow,
        comment: &Comment,
        credential: &Credential,
    ) -> Option<DispatchOutcome> {
        let keyword = find_keyword_match(
            &comment.text,
            &workflow.keywords,
            &workflow.match_settings(),
        )?;

        tracing::info!(
            workflow_id = workflow.id,
            comment_id = %comment.id,
            keyword,
            "Comment matched keyword",
        );

        let detected = NewEvent::comment_detected(
            workflow.id,
            &comment.id,
            &comment.username,
            &comment.user_id,
            &comment.text,
            keyword,
        );
        if let Err(e) = self.store.append_event(&detected).await {
            tracing::error!(workflow_id = workflow.id, error = %e, "Failed to log detection");
        }
        if let Err(e) = self
            .store
            .increment_statistics(workflow.id, &StatisticsDelta::trigger())
            .await
        {
            tracing::error!(workflow_id = workflow.id, error = %e, "Failed to bump trigger count");
        }

        let outcome = self.dispatch(workflow, comment, keyword, credential).await;

        let mut payload = json!({
            "comment_id": comment.id,
            "commenter_username": comment.username,
            "matched_keyword": keyword,
        });
        merge(&mut payload, outcome.describe());
        self.bus.publish(
            EngineEvent::new(EVENT_WORKFLOW_TRIGGERED)
                .with_workflow(workflow.id, workflow.user_id)
                .with_payload(payload),
        );

        Some(outcome)
    }

    /// Webhook entry point: resolve the workflow and its credential, then
    /// run the shared comment pipeline.
    pub async fn handle_comment_for_workflow(
        &self,
        workflow_id: DbId,
        comment: &Comment,
    ) -> Result<Option<DispatchOutcome>, EngineError> {
        let workflow = self
            .store
            .find_workflow(workflow_id)
            .await?
            .ok_or(EngineError::WorkflowNotFound(workflow_id))?;
        let credential = self
            .store
            .account_credential(workflow.account_id)
            .await?
            .ok_or(EngineError::AccountNotFound(workflow.account_id))?;
        Ok(self.handle_comment(&workflow, comment, &credential).await)
    }

    /// The dispatch pipeline for one matched comment.
    ///
    /// Duplicate check, rate limit, reachability, compose, send. Skips are
    /// counted toward trigger statistics (by the caller) but not send
    /// statistics.
    pub async fn dispatch(
        &self,
        workflow: &Workflow,
        comment: &Comment,
        keyword: &str,
        credential: &Credential,
    ) -> DispatchOutcome {
        if self
            .duplicate_guard
            .is_duplicate(workflow.id, &comment.user_id)
            .await
        {
            tracing::debug!(
                workflow_id = workflow.id,
                recipient = %comment.user_id,
                "Skipping dispatch: recipient already messaged",
            );
            return DispatchOutcome::Skipped {
                reason: SkipReason::Duplicate,
            };
        }

        let decision = self
            .rate_limiter
            .check_and_reserve(workflow.account_id, workflow.max_dms_per_day)
            .await;
        if !decision.allowed {
            tracing::warn!(
                workflow_id = workflow.id,
                account_id = workflow.account_id,
                retry_after = ?decision.retry_after,
                "Skipping dispatch: account rate limit reached",
            );
            return DispatchOutcome::Skipped {
                reason: SkipReason::RateLimited,
            };
        }

        // A reachability error is not authoritative: the send itself decides,
        // and its failure path records the detail.
        match self
            .provider
            .can_receive_message(&comment.user_id, &credential.access_token)
            .await
        {
            Ok(false) => {
                return DispatchOutcome::Skipped {
                    reason: SkipReason::Unreachable,
                };
            }
            Ok(true) => {}
            Err(e) => {
                tracing::warn!(
                    workflow_id = workflow.id,
                    recipient = %comment.user_id,
                    error = %e,
                    "Reachability check failed, attempting send anyway",
                );
            }
        }

        let text = compose(
            &workflow.message_template,
            &TemplateVars {
                username: Some(&comment.username),
                keyword: Some(keyword),
                comment: Some(&comment.text),
                link: workflow.link_url.as_deref(),
            },
        );

        match self
            .provider
            .send_direct_message(
                &credential.provider_account_id,
                &comment.user_id,
                &text,
                &credential.access_token,
            )
            .await
        {
            Ok(sent) => {
                self.rate_limiter.commit(workflow.account_id).await;
                self.duplicate_guard
                    .record(workflow.id, &comment.user_id)
                    .await;

                let event = NewEvent::dm_sent(
                    workflow.id,
                    &comment.id,
                    &comment.username,
                    &comment.user_id,
                    keyword,
                    &sent.message_id,
                );
                if let Err(e) = self.store.append_event(&event).await {
                    tracing::error!(workflow_id = workflow.id, error = %e, "Failed to log dm_sent");
                }
                if let Err(e) = self
                    .store
                    .increment_statistics(workflow.id, &StatisticsDelta::dm_sent())
                    .await
                {
                    tracing::error!(workflow_id = workflow.id, error = %e, "Failed to bump dms_sent");
                }

                tracing::info!(
                    workflow_id = workflow.id,
                    recipient = %comment.user_id,
                    dm_id = %sent.message_id,
                    "DM sent",
                );
                DispatchOutcome::Sent {
                    dm_id: sent.message_id,
                }
            }
            Err(e) => {
                let error = e.to_string();
                let event = NewEvent::dm_failed(
                    workflow.id,
                    &comment.id,
                    &comment.username,
                    &comment.user_id,
                    keyword,
                    &error,
                );
                if let Err(log_err) = self.store.append_event(&event).await {
                    tracing::error!(
                        workflow_id = workflow.id,
                        error = %log_err,
                        "Failed to log dm_failed",
                    );
                }

                tracing::warn!(
                    workflow_id = workflow.id,
                    recipient = %comment.user_id,
                    error = %error,
                    "DM send failed",
                );
                DispatchOutcome::Failed { error }
            }
        }
    }
}

/// Merge `extra`'s top-level keys into `base` (both are objects).
fn merge(base: &mut serde_json::Value, extra: serde_json::Value) {
    if let (Some(base_map), serde_json::Value::Object(extra_map)) = (base.as_object_mut(), extra) {
        base_map.extend(extra_map);
    }
}
