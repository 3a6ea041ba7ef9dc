//! Classified provider failures.

/// Error type for Graph API calls.
///
/// The engine branches on the classification: auth failures pause the
/// workflow, transient failures are retried by the next poll cycle, and
/// everything else is logged as a send failure.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Credential rejected (HTTP 401) -- token invalid or expired.
    #[error("Provider rejected credential: {0}")]
    Unauthorized(String),

    /// Missing permission for the requested resource (HTTP 403).
    #[error("Provider refused access: {0}")]
    Forbidden(String),

    /// Provider-side rate limit (HTTP 429).
    #[error("Provider rate limit hit")]
    RateLimited,

    /// Provider-side failure (HTTP 5xx).
    #[error("Provider server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    /// The request did not complete within the fixed timeout.
    #[error("Provider request timed out")]
    Timeout,

    /// Transport-level failure (connect, DNS, TLS).
    #[error("Provider request failed: {0}")]
    Network(String),

    /// The provider answered with a body we could not interpret.
    #[error("Unexpected provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Auth failures trigger the workflow auto-pause path.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, ProviderError::Unauthorized(_))
    }

    /// Transient failures are retried (in-call backoff, then the next poll).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited
                | ProviderError::Server { .. }
                | ProviderError::Timeout
                | ProviderError::Network(_)
        )
    }

    /// Classify a transport error from the HTTP client.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
