use replyflow_instagram::client::DEFAULT_BASE_URL;

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// Fields without a required env var have defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// JWT token configuration (secret, expiry duration).
    pub jwt: JwtConfig,
    /// Token echoed back during the webhook subscription handshake.
    pub webhook_verify_token: String,
    /// Provider app secret used to verify webhook payload signatures.
    pub app_secret: String,
    /// Provider Graph API root (no trailing slash).
    pub provider_base_url: String,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                | Required | Default                    |
    /// |------------------------|----------|----------------------------|
    /// | `HOST`                 | no       | `0.0.0.0`                  |
    /// | `PORT`                 | no       | `3000`                     |
    /// | `CORS_ORIGINS`         | no       | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | no       | `30`                       |
    /// | `WEBHOOK_VERIFY_TOKEN` | **yes**  | --                         |
    /// | `PROVIDER_APP_SECRET`  | **yes**  | --                         |
    /// | `PROVIDER_BASE_URL`    | no       | Graph API v18.0            |
    ///
    /// # Panics
    ///
    /// Panics if a required variable is missing or a value fails to parse.
    /// Startup is the one place where aborting on bad config is correct.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let webhook_verify_token = std::env::var("WEBHOOK_VERIFY_TOKEN")
            .expect("WEBHOOK_VERIFY_TOKEN must be set in the environment");

        let app_secret = std::env::var("PROVIDER_APP_SECRET")
            .expect("PROVIDER_APP_SECRET must be set in the environment");

        let provider_base_url =
            std::env::var("PROVIDER_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());

        let jwt = JwtConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            jwt,
            webhook_verify_token,
            app_secret,
            provider_base_url,
        }
    }
}
