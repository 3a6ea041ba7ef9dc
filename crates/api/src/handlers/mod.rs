pub mod events;
pub mod webhooks;
pub mod workflows;
