//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the fan-out hub for [`EngineEvent`]s: the engine publishes
//! fire-and-forget notifications here and the API layer forwards them to the
//! owning user's WebSocket connections. Designed to be shared via
//! `Arc<EventBus>`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use replyflow_core::types::DbId;

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

/// A comment matched a keyword and went through the dispatch pipeline.
pub const EVENT_WORKFLOW_TRIGGERED: &str = "workflow_triggered";

/// A workflow changed lifecycle status (activated / paused / stopped).
pub const EVENT_WORKFLOW_STATUS: &str = "workflow_status";

/// The provider confirmed delivery of a previously sent DM.
pub const EVENT_DM_DELIVERED: &str = "dm_delivered";

// ---------------------------------------------------------------------------
// EngineEvent
// ---------------------------------------------------------------------------

/// A notification emitted by the monitoring engine.
///
/// Constructed via [`EngineEvent::new`] and enriched with
/// [`with_workflow`](EngineEvent::with_workflow) and
/// [`with_payload`](EngineEvent::with_payload). `user_id` addresses the
/// notification; the forwarder only pushes to that user's sockets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineEvent {
    /// Snake-case event name, e.g. `"workflow_triggered"`.
    pub event_type: String,

    /// Workflow the event concerns, if any.
    pub workflow_id: Option<DbId>,

    /// Owner to notify.
    pub user_id: Option<DbId>,

    /// Free-form JSON payload carrying event-specific data.
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl EngineEvent {
    /// Create a new event with only the required `event_type`.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            workflow_id: None,
            user_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    /// Attach the workflow and its owning user.
    pub fn with_workflow(mut self, workflow_id: DbId, user_id: DbId) -> Self {
        self.workflow_id = Some(workflow_id);
        self.user_id = Some(user_id);
        self
    }

    /// Set the JSON payload for the event.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out notification bus.
///
/// Wraps a [`broadcast::Sender`] so any number of subscribers independently
/// receive every published [`EngineEvent`]. Publishing never blocks the
/// dispatch path; with zero subscribers the event is silently dropped (the
/// audit trail lives in the database, not here).
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest un-consumed messages are dropped
    /// and slow receivers observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: EngineEvent) {
        // Ignore the SendError -- it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        let event = EngineEvent::new(EVENT_WORKFLOW_TRIGGERED)
            .with_workflow(42, 7)
            .with_payload(serde_json::json!({"keyword": "price"}));

        bus.publish(event);

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.event_type, EVENT_WORKFLOW_TRIGGERED);
        assert_eq!(received.workflow_id, Some(42));
        assert_eq!(received.user_id, Some(7));
        assert_eq!(received.payload["keyword"], "price");
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(EngineEvent::new(EVENT_WORKFLOW_STATUS));

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");

        assert_eq!(e1.event_type, EVENT_WORKFLOW_STATUS);
        assert_eq!(e2.event_type, EVENT_WORKFLOW_STATUS);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(EngineEvent::new(EVENT_DM_DELIVERED));
    }

    #[test]
    fn bare_event_has_empty_optional_fields() {
        let event = EngineEvent::new(EVENT_WORKFLOW_TRIGGERED);
        assert!(event.workflow_id.is_none());
        assert!(event.user_id.is_none());
        assert!(event.payload.is_object());
    }
}
