//! Realtime notification plumbing.
//!
//! The [`NotificationForwarder`] subscribes to the engine event bus and
//! pushes each notification to the owning user's WebSocket connections.

pub mod forwarder;

pub use forwarder::NotificationForwarder;
