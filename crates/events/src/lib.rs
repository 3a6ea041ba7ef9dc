//! In-process notification bus between the monitoring engine and realtime
//! subscribers (the WebSocket forwarder, tests).

pub mod bus;

pub use bus::{
    EngineEvent, EventBus, EVENT_DM_DELIVERED, EVENT_WORKFLOW_STATUS, EVENT_WORKFLOW_TRIGGERED,
};
