//! Engine-event-to-WebSocket forwarding loop.

use std::sync::Arc;

use axum::extract::ws::Message;
use tokio::sync::broadcast;

use replyflow_events::EngineEvent;

use crate::ws::WsManager;

/// Forwards engine notifications to users over WebSocket.
///
/// Consumes events from the broadcast channel; each event addressed to a
/// user is serialized as JSON and pushed to all of that user's connections.
pub struct NotificationForwarder {
    ws_manager: Arc<WsManager>,
}

impl NotificationForwarder {
    pub fn new(ws_manager: Arc<WsManager>) -> Self {
        Self { ws_manager }
    }

    /// Run the forwarding loop.
    ///
    /// Subscribes to the event bus via `receiver` and processes each event.
    /// The loop exits when the channel is closed (i.e. the
    /// [`EventBus`](replyflow_events::EventBus) is dropped).
    pub async fn run(self, mut receiver: broadcast::Receiver<EngineEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => self.forward(&event).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Notification forwarder lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, notification forwarder shutting down");
                    break;
                }
            }
        }
    }

    /// Push a single event to the addressed user's sockets.
    async fn forward(&self, event: &EngineEvent) {
        let Some(user_id) = event.user_id else {
            tracing::debug!(
                event_type = %event.event_type,
                "Notification without a target user, skipping"
            );
            return;
        };

        let msg = serde_json::json!({
            "type": "notification",
            "event_type": event.event_type,
            "workflow_id": event.workflow_id,
            "payload": event.payload,
            "timestamp": event.timestamp,
        });
        let delivered = self
            .ws_manager
            .send_to_user(user_id, Message::Text(msg.to_string().into()))
            .await;
        tracing::debug!(
            event_type = %event.event_type,
            user_id,
            delivered,
            "Notification forwarded"
        );
    }
}
