//! Per-(workflow, recipient) duplicate suppression.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use replyflow_core::events::EventType;
use replyflow_core::types::{DbId, Timestamp};

use crate::store::EngineStore;

/// Event types that mark a recipient as already messaged.
const SENT_EVENT_TYPES: &[EventType] = &[EventType::DmSent, EventType::DmDelivered];

/// Suppresses repeat DMs to the same recipient for the same workflow.
///
/// Fast path is a process-global in-memory map; on a miss the audit trail is
/// consulted for a prior `dm_sent`/`dm_delivered` event, which also survives
/// process restarts. The durable store is the source of truth -- the cache is
/// a latency optimisation with a bounded lifetime.
pub struct DuplicateGuard {
    store: Arc<dyn EngineStore>,
    /// (workflow_id, recipient_id) -> when the entry was recorded.
    cache: RwLock<HashMap<(DbId, String), Timestamp>>,
    ttl: chrono::Duration,
}

impl DuplicateGuard {
    pub fn new(store: Arc<dyn EngineStore>, ttl: chrono::Duration) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Whether `recipient_id` already received a DM from this workflow.
    ///
    /// A durable-lookup failure fails open: blocking a legitimate send on a
    /// store hiccup is worse than the small chance of a repeat DM.
    pub async fn is_duplicate(&self, workflow_id: DbId, recipient_id: &str) -> bool {
        let key = (workflow_id, recipient_id.to_string());
        if self.cache.read().await.contains_key(&key) {
            return true;
        }

        match self
            .store
            .find_dm_event(workflow_id, recipient_id, SENT_EVENT_TYPES)
            .await
        {
            Ok(Some(_)) => {
                self.cache.write().await.insert(key, Utc::now());
                true
            }
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(
                    workflow_id,
                    recipient_id,
                    error = %e,
                    "Duplicate lookup failed, failing open",
                );
                false
            }
        }
    }

    /// Record a confirmed send so later checks report a duplicate.
    pub async fn record(&self, workflow_id: DbId, recipient_id: &str) {
        self.cache
            .write()
            .await
            .insert((workflow_id, recipient_id.to_string()), Utc::now());
    }

    /// Drop cache entries older than the TTL. Called from the poll loop; the
    /// durable trail still answers for anything evicted here.
    pub async fn evict_expired(&self) {
        let cutoff = Utc::now() - self.ttl;
        let mut cache = self.cache.write().await;
        let before = cache.len();
        cache.retain(|_, recorded_at| *recorded_at > cutoff);
        let evicted = before - cache.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = cache.len(), "Evicted stale dedupe entries");
        }
    }

    /// Drop all cache entries for one workflow. Called when its monitor task
    /// stops.
    pub async fn purge_workflow(&self, workflow_id: DbId) {
        self.cache
            .write()
            .await
            .retain(|(wf, _), _| *wf != workflow_id);
    }

    /// Number of cached entries, for health reporting.
    pub async fn cache_size(&self) -> usize {
        self.cache.read().await.len()
    }
}
