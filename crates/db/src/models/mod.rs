pub mod account;
pub mod event;
pub mod user;
pub mod workflow;
