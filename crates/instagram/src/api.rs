//! Provider seam consumed by the monitoring engine.

use async_trait::async_trait;

use replyflow_core::types::Timestamp;

use crate::error::ProviderError;
use crate::types::{CommentPage, SentMessage};

/// The three remote calls the engine makes against the social provider.
///
/// Implemented by [`crate::GraphClient`] for production and by scripted
/// fakes in engine tests.
#[async_trait]
pub trait ProviderApi: Send + Sync {
    /// Fetch comments on `post_id`, oldest-first. With `since` set, only
    /// comments strictly newer than the watermark are returned.
    async fn fetch_comments(
        &self,
        post_id: &str,
        access_token: &str,
        since: Option<Timestamp>,
        limit: u32,
    ) -> Result<CommentPage, ProviderError>;

    /// Whether `recipient_id` can currently receive a direct message.
    async fn can_receive_message(
        &self,
        recipient_id: &str,
        access_token: &str,
    ) -> Result<bool, ProviderError>;

    /// Send `text` from the connected account to `recipient_id`.
    async fn send_direct_message(
        &self,
        account_id: &str,
        recipient_id: &str,
        text: &str,
        access_token: &str,
    ) -> Result<SentMessage, ProviderError>;
}
