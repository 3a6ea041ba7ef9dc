//! Per-workflow polling tasks and their lifecycle.
//!
//! [`MonitorScheduler`] owns one recurring poll task per active workflow.
//! Tasks are independent: a stalled provider call on one workflow never
//! delays another. Stopping a workflow cancels future ticks; an in-flight
//! cycle is allowed to finish so event logging never gets cut mid-dispatch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use replyflow_core::events::EventType;
use replyflow_core::types::{DbId, Timestamp};
use replyflow_core::workflow::WorkflowStatus;
use replyflow_db::models::event::NewEvent;
use replyflow_db::models::workflow::Workflow;
use replyflow_events::{EngineEvent, EventBus, EVENT_WORKFLOW_STATUS};
use replyflow_instagram::ProviderApi;

use crate::config::EngineConfig;
use crate::dedupe::DuplicateGuard;
use crate::dispatch::DispatchService;
use crate::store::{Credential, EngineStore};

/// How long `stop`/`shutdown` wait for a task to finish its current cycle.
const TASK_JOIN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Bookkeeping for one workflow's poll task.
struct MonitorTask {
    handle: tokio::task::JoinHandle<()>,
    /// Per-task cancellation token (child of the master token).
    cancel: CancellationToken,
    /// Distinguishes this task from a replacement after an idempotent
    /// restart, so a task exiting on its own only removes its own entry.
    generation: u64,
}

/// What a poll cycle decided about the task's future.
enum CycleOutcome {
    /// Keep polling on the next tick.
    Continue,
    /// The task is done (workflow paused, stopped, or gone).
    Exit,
}

/// Owns and supervises the per-workflow polling tasks.
///
/// Created once at startup via [`MonitorScheduler::new`] and shared as an
/// `Arc`; activation handlers call [`start`](MonitorScheduler::start) /
/// [`stop`](MonitorScheduler::stop) as workflows change status.
pub struct MonitorScheduler {
    /// Active poll tasks indexed by workflow id.
    tasks: RwLock<HashMap<DbId, MonitorTask>>,
    /// Last-seen comment timestamp per workflow. In-memory only: after a
    /// restart the watermark re-bootstraps to "now" and the duplicate
    /// guard's durable fallback covers anyone messaged before.
    watermarks: RwLock<HashMap<DbId, Timestamp>>,
    store: Arc<dyn EngineStore>,
    provider: Arc<dyn ProviderApi>,
    dispatch: Arc<DispatchService>,
    duplicate_guard: Arc<DuplicateGuard>,
    bus: Arc<EventBus>,
    config: EngineConfig,
    /// Master cancellation token -- cancelled during shutdown.
    cancel: CancellationToken,
    next_generation: AtomicU64,
}

impl MonitorScheduler {
    pub fn new(
        store: Arc<dyn EngineStore>,
        provider: Arc<dyn ProviderApi>,
        dispatch: Arc<DispatchService>,
        duplicate_guard: Arc<DuplicateGuard>,
        bus: Arc<EventBus>,
        config: EngineConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            tasks: RwLock::new(HashMap::new()),
            watermarks: RwLock::new(HashMap::new()),
            store,
            provider,
            dispatch,
            duplicate_guard,
            bus,
            config,
            cancel: CancellationToken::new(),
            next_generation: AtomicU64::new(0),
        })
    }

    /// Start (or restart) monitoring a workflow.
    ///
    /// If a task is already running for this workflow it is stopped first,
    /// so calling `start` twice leaves exactly one task. The first poll
    /// fires immediately rather than waiting out the first interval.
    pub async fn start(self: &Arc<Self>, workflow: &Workflow) {
        self.stop(workflow.id).await;

        // Skip-history policy: on first activation only comments newer than
        // "now" trigger, so existing comments never cause a DM blast.
        self.watermarks
            .write()
            .await
            .entry(workflow.id)
            .or_insert_with(Utc::now);

        let workflow_id = workflow.id;
        let task_cancel = self.cancel.child_token();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let scheduler = Arc::clone(self);
        let cancel = task_cancel.clone();

        let handle = tokio::spawn(async move {
            tracing::info!(workflow_id, "Monitor task started");
            scheduler.run_poll_loop(workflow_id, cancel).await;
            scheduler.deregister(workflow_id, generation).await;
            tracing::info!(workflow_id, "Monitor task exited");
        });

        self.tasks.write().await.insert(
            workflow_id,
            MonitorTask {
                handle,
                cancel: task_cancel,
                generation,
            },
        );

        tracing::info!(
            workflow_id,
            post_id = %workflow.post_id,
            poll_interval_secs = self.config.poll_interval.as_secs(),
            "Monitoring started",
        );
    }

    /// Stop monitoring a workflow.
    ///
    /// Cancels future ticks, waits (bounded) for an in-flight cycle to
    /// finish, and purges the workflow's duplicate-cache entries. Returns
    /// `true` if a task was running.
    pub async fn stop(&self, workflow_id: DbId) -> bool {
        let task = self.tasks.write().await.remove(&workflow_id);
        let Some(task) = task else {
            return false;
        };

        task.cancel.cancel();
        if tokio::time::timeout(TASK_JOIN_TIMEOUT, task.handle)
            .await
            .is_err()
        {
            tracing::warn!(workflow_id, "Monitor task did not stop in time");
        }

        self.duplicate_guard.purge_workflow(workflow_id).await;
        tracing::info!(workflow_id, "Monitoring stopped");
        true
    }

    /// Whether a poll task is currently scheduled for this workflow.
    pub async fn is_running(&self, workflow_id: DbId) -> bool {
        self.tasks
            .read()
            .await
            .get(&workflow_id)
            .is_some_and(|t| !t.handle.is_finished())
    }

    /// Number of live poll tasks, for health reporting.
    pub async fn running_count(&self) -> usize {
        self.tasks
            .read()
            .await
            .values()
            .filter(|t| !t.handle.is_finished())
            .count()
    }

    /// The workflow's last-seen comment timestamp, if monitoring has begun.
    pub async fn watermark(&self, workflow_id: DbId) -> Option<Timestamp> {
        self.watermarks.read().await.get(&workflow_id).copied()
    }

    /// Start a task for every workflow already `active` in the store.
    /// Called once at process startup; returns how many were started.
    pub async fn start_all_active(self: &Arc<Self>) -> usize {
        let workflows = match self.store.find_active_workflows().await {
            Ok(list) => list,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load active workflows");
                return 0;
            }
        };

        let count = workflows.len();
        tracing::info!(count, "Bootstrapping monitors for active workflows");
        for workflow in &workflows {
            self.start(workflow).await;
        }
        count
    }

    /// Gracefully stop all poll tasks.
    ///
    /// Cancels the master token, then waits up to [`TASK_JOIN_TIMEOUT`] per
    /// task for a clean exit.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down monitor scheduler");
        self.cancel.cancel();

        // Take the entries and release the lock before joining: an exiting
        // task's last step is deregister, which needs this same write lock.
        let tasks: Vec<(DbId, MonitorTask)> = self.tasks.write().await.drain().collect();
        for (workflow_id, task) in tasks {
            task.cancel.cancel();
            if tokio::time::timeout(TASK_JOIN_TIMEOUT, task.handle)
                .await
                .is_err()
            {
                tracing::warn!(workflow_id, "Monitor task did not stop in time");
            }
        }

        tracing::info!("Monitor scheduler shut down");
    }

    // ---- poll loop ----

    async fn run_poll_loop(&self, workflow_id: DbId, cancel: CancellationToken) {
        // The first tick completes immediately, giving the immediate
        // first poll on start.
        let mut ticker = tokio::time::interval(self.config.poll_interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match self.poll_cycle(workflow_id).await {
                        CycleOutcome::Continue => {}
                        CycleOutcome::Exit => break,
                    }
                }
            }
        }
    }

    /// Remove this task's own map entry on self-initiated exit, unless a
    /// restart already replaced it with a newer generation.
    async fn deregister(&self, workflow_id: DbId, generation: u64) {
        let mut tasks = self.tasks.write().await;
        if tasks
            .get(&workflow_id)
            .is_some_and(|t| t.generation == generation)
        {
            tasks.remove(&workflow_id);
        }
    }

    /// One poll cycle: credential check, comment fetch, per-comment dispatch.
    ///
    /// Provider failures are classified per the error taxonomy: auth errors
    /// auto-pause the workflow; everything else is logged and retried by the
    /// next tick (the poll interval is the backoff).
    async fn poll_cycle(&self, workflow_id: DbId) -> CycleOutcome {
        self.duplicate_guard.evict_expired().await;

        // Refetch so config edits and external status changes take effect.
        let workflow = match self.store.find_workflow(workflow_id).await {
            Ok(Some(w)) => w,
            Ok(None) => {
                tracing::warn!(workflow_id, "Workflow disappeared, stopping monitor");
                return CycleOutcome::Exit;
            }
            Err(e) => {
                tracing::error!(workflow_id, error = %e, "Failed to load workflow");
                return CycleOutcome::Continue;
            }
        };
        if workflow.status != WorkflowStatus::Active {
            tracing::info!(
                workflow_id,
                status = %workflow.status,
                "Workflow no longer active, stopping monitor",
            );
            return CycleOutcome::Exit;
        }

        let credential = match self.store.account_credential(workflow.account_id).await {
            Ok(Some(c)) => c,
            Ok(None) => {
                tracing::error!(
                    workflow_id,
                    account_id = workflow.account_id,
                    "Account missing for workflow",
                );
                return CycleOutcome::Continue;
            }
            Err(e) => {
                tracing::error!(workflow_id, error = %e, "Failed to load credential");
                return CycleOutcome::Continue;
            }
        };
        if credential.is_expired(Utc::now()) {
            self.auto_pause(&workflow, "token_expired").await;
            return CycleOutcome::Exit;
        }

        let since = self.watermark_or_bootstrap(workflow_id).await;
        let page = match self
            .provider
            .fetch_comments(
                &workflow.post_id,
                &credential.access_token,
                Some(since),
                self.config.comment_fetch_limit,
            )
            .await
        {
            Ok(page) => page,
            Err(e) if e.is_auth_error() => {
                self.auto_pause(&workflow, "unauthorized").await;
                return CycleOutcome::Exit;
            }
            Err(e) if e.is_transient() => {
                tracing::warn!(workflow_id, error = %e, "Comment fetch failed, will retry");
                return CycleOutcome::Continue;
            }
            Err(e) => {
                tracing::error!(workflow_id, error = %e, "Comment fetch failed");
                return CycleOutcome::Continue;
            }
        };

        if !page.comments.is_empty() {
            tracing::debug!(
                workflow_id,
                count = page.comments.len(),
                "New comments fetched",
            );
        }

        // Provider order is chronological; process in order and move the
        // watermark forward, never backward.
        for comment in &page.comments {
            self.dispatch
                .handle_comment(&workflow, comment, &credential)
                .await;
            self.advance_watermark(workflow_id, comment.timestamp).await;
        }

        CycleOutcome::Continue
    }

    async fn watermark_or_bootstrap(&self, workflow_id: DbId) -> Timestamp {
        *self
            .watermarks
            .write()
            .await
            .entry(workflow_id)
            .or_insert_with(Utc::now)
    }

    async fn advance_watermark(&self, workflow_id: DbId, seen: Timestamp) {
        let mut watermarks = self.watermarks.write().await;
        let entry = watermarks.entry(workflow_id).or_insert(seen);
        if seen > *entry {
            *entry = seen;
        }
    }

    /// Auth failure path: persist `paused`, log the status event, and notify
    /// the owner. The user must re-authenticate before reactivating.
    async fn auto_pause(&self, workflow: &Workflow, reason: &str) {
        tracing::warn!(
            workflow_id = workflow.id,
            account_id = workflow.account_id,
            reason,
            "Auto-pausing workflow on authorization failure",
        );

        if let Err(e) = self
            .store
            .update_workflow_status(workflow.id, WorkflowStatus::Paused)
            .await
        {
            tracing::error!(workflow_id = workflow.id, error = %e, "Failed to persist pause");
        }

        let event = NewEvent::status_change(
            workflow.id,
            EventType::WorkflowPaused,
            Some(json!({"reason": reason, "auto": true})),
        );
        if let Err(e) = self.store.append_event(&event).await {
            tracing::error!(workflow_id = workflow.id, error = %e, "Failed to log auto-pause");
        }

        self.bus.publish(
            EngineEvent::new(EVENT_WORKFLOW_STATUS)
                .with_workflow(workflow.id, workflow.user_id)
                .with_payload(json!({
                    "status": WorkflowStatus::Paused.as_str(),
                    "reason": reason,
                    "auto": true,
                })),
        );
    }
}
