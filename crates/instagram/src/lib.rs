//! Instagram Graph API client.
//!
//! Exposes the three provider calls the engine needs -- fetch comments on a
//! post, check whether a recipient can receive a DM, and send a DM -- behind
//! the [`api::ProviderApi`] trait so the engine can run against a scripted
//! fake in tests.

pub mod api;
pub mod client;
pub mod error;
pub mod types;

pub use api::ProviderApi;
pub use client::GraphClient;
pub use error::ProviderError;
pub use types::{Comment, CommentPage, SentMessage};
