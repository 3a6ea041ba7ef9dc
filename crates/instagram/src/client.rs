//! Reqwest-backed Graph API client with bounded retry.
//!
//! Transient failures (429, 5xx, timeouts) are retried up to three times with
//! exponential backoff (5 s, 10 s, 20 s) before surfacing to the caller;
//! everything else surfaces immediately so auth failures reach the engine's
//! auto-pause path on the first attempt.

use std::time::Duration;

use async_trait::async_trait;

use replyflow_core::types::Timestamp;

use crate::api::ProviderApi;
use crate::error::ProviderError;
use crate::types::{
    page_from_graph, CommentPage, GraphCommentsResponse, GraphErrorResponse, GraphSendResponse,
    SentMessage,
};

/// Graph API root used when none is configured.
pub const DEFAULT_BASE_URL: &str = "https://graph.facebook.com/v18.0";

/// Fields requested per comment.
const COMMENT_FIELDS: &str = "id,text,username,timestamp,user{id,username}";

/// Retry delays in seconds (exponential backoff: 5s, 10s, 20s).
const RETRY_DELAYS_SECS: [u64; 3] = [5, 10, 20];

/// HTTP request timeout for a single attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Production [`ProviderApi`] implementation.
pub struct GraphClient {
    client: reqwest::Client,
    base_url: String,
}

impl GraphClient {
    /// Create a client against `base_url` (no trailing slash).
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Execute `build_request` with retry on transient failures.
    ///
    /// Returns the successful response, or the classified error from the
    /// final attempt.
    async fn send_with_retry<F>(&self, build_request: F) -> Result<reqwest::Response, ProviderError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt: usize = 0;
        loop {
            let err = match build_request().send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    classify_status(status.as_u16(), read_graph_error(response).await)
                }
                Err(e) => ProviderError::from_reqwest(e),
            };

            if err.is_transient() && attempt < RETRY_DELAYS_SECS.len() {
                let delay = RETRY_DELAYS_SECS[attempt];
                tracing::warn!(
                    attempt = attempt + 1,
                    delay_secs = delay,
                    error = %err,
                    "Provider request failed, retrying"
                );
                tokio::time::sleep(Duration::from_secs(delay)).await;
                attempt += 1;
            } else {
                return Err(err);
            }
        }
    }
}

#[async_trait]
impl ProviderApi for GraphClient {
    async fn fetch_comments(
        &self,
        post_id: &str,
        access_token: &str,
        since: Option<Timestamp>,
        limit: u32,
    ) -> Result<CommentPage, ProviderError> {
        let url = format!("{}/{}/comments", self.base_url, post_id);
        let limit = limit.to_string();
        let response = self
            .send_with_retry(|| {
                self.client.get(&url).query(&[
                    ("fields", COMMENT_FIELDS),
                    ("limit", limit.as_str()),
                    ("access_token", access_token),
                ])
            })
            .await?;

        let wire: GraphCommentsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        page_from_graph(wire, since)
    }

    async fn can_receive_message(
        &self,
        recipient_id: &str,
        access_token: &str,
    ) -> Result<bool, ProviderError> {
        let url = format!("{}/{}", self.base_url, recipient_id);
        let result = self
            .send_with_retry(|| {
                self.client.get(&url).query(&[
                    ("fields", "id,username"),
                    ("access_token", access_token),
                ])
            })
            .await;

        match result {
            Ok(_) => Ok(true),
            // Credential and transient problems surface; any other rejection
            // means the recipient node is missing or unmessageable, which is
            // a normal skip rather than a failure.
            Err(e) if e.is_auth_error() || e.is_transient() => Err(e),
            Err(_) => Ok(false),
        }
    }

    async fn send_direct_message(
        &self,
        account_id: &str,
        recipient_id: &str,
        text: &str,
        access_token: &str,
    ) -> Result<SentMessage, ProviderError> {
        let url = format!("{}/{}/messages", self.base_url, account_id);
        let payload = serde_json::json!({
            "recipient": { "id": recipient_id },
            "message": { "text": text },
        });
        let response = self
            .send_with_retry(|| {
                self.client
                    .post(&url)
                    .query(&[("access_token", access_token)])
                    .json(&payload)
            })
            .await?;

        let wire: GraphSendResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        let message_id = wire
            .message_id
            .or(wire.id)
            .ok_or_else(|| ProviderError::InvalidResponse("send response had no id".into()))?;
        Ok(SentMessage { message_id })
    }
}

/// Map an HTTP status plus the Graph error body to a classified error.
fn classify_status(status: u16, message: String) -> ProviderError {
    match status {
        401 => ProviderError::Unauthorized(message),
        403 => ProviderError::Forbidden(message),
        429 => ProviderError::RateLimited,
        500..=599 => ProviderError::Server { status, message },
        _ => ProviderError::InvalidResponse(format!("HTTP {status}: {message}")),
    }
}

/// Pull the error message out of a Graph error body, best-effort.
async fn read_graph_error(response: reqwest::Response) -> String {
    match response.json::<GraphErrorResponse>().await {
        Ok(body) => body
            .error
            .map(|e| e.message)
            .unwrap_or_else(|| "unknown provider error".to_string()),
        Err(_) => "unreadable provider error body".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
