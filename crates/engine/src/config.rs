//! Engine configuration loaded from environment variables.

use std::time::Duration;

/// Default poll interval per monitored workflow.
const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
/// Default per-account hourly outbound-DM cap.
const DEFAULT_HOURLY_DM_LIMIT: i64 = 200;
/// Default per-account daily outbound-DM cap.
const DEFAULT_DAILY_DM_LIMIT: i64 = 1000;
/// Default lifetime of in-memory duplicate-cache entries, in hours.
const DEFAULT_DEDUPE_TTL_HOURS: i64 = 24;
/// Default maximum comments fetched per poll cycle.
const DEFAULT_COMMENT_FETCH_LIMIT: u32 = 50;

/// Tunables for the monitoring engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How often each workflow's poll task fires.
    pub poll_interval: Duration,
    /// Per-account hourly outbound-DM cap.
    pub hourly_dm_limit: i64,
    /// Per-account daily outbound-DM cap.
    pub daily_dm_limit: i64,
    /// Lifetime of in-memory duplicate-cache entries.
    pub dedupe_ttl: chrono::Duration,
    /// Maximum comments fetched per poll cycle.
    pub comment_fetch_limit: u32,
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var               | Default |
    /// |-----------------------|---------|
    /// | `POLL_INTERVAL_SECS`  | `30`    |
    /// | `HOURLY_DM_LIMIT`     | `200`   |
    /// | `DAILY_DM_LIMIT`      | `1000`  |
    /// | `DEDUPE_TTL_HOURS`    | `24`    |
    /// | `COMMENT_FETCH_LIMIT` | `50`    |
    pub fn from_env() -> Self {
        let poll_interval_secs: u64 = std::env::var("POLL_INTERVAL_SECS")
            .unwrap_or_else(|_| DEFAULT_POLL_INTERVAL_SECS.to_string())
            .parse()
            .expect("POLL_INTERVAL_SECS must be a valid u64");

        let hourly_dm_limit: i64 = std::env::var("HOURLY_DM_LIMIT")
            .unwrap_or_else(|_| DEFAULT_HOURLY_DM_LIMIT.to_string())
            .parse()
            .expect("HOURLY_DM_LIMIT must be a valid i64");

        let daily_dm_limit: i64 = std::env::var("DAILY_DM_LIMIT")
            .unwrap_or_else(|_| DEFAULT_DAILY_DM_LIMIT.to_string())
            .parse()
            .expect("DAILY_DM_LIMIT must be a valid i64");

        let dedupe_ttl_hours: i64 = std::env::var("DEDUPE_TTL_HOURS")
            .unwrap_or_else(|_| DEFAULT_DEDUPE_TTL_HOURS.to_string())
            .parse()
            .expect("DEDUPE_TTL_HOURS must be a valid i64");

        let comment_fetch_limit: u32 = std::env::var("COMMENT_FETCH_LIMIT")
            .unwrap_or_else(|_| DEFAULT_COMMENT_FETCH_LIMIT.to_string())
            .parse()
            .expect("COMMENT_FETCH_LIMIT must be a valid u32");

        Self {
            poll_interval: Duration::from_secs(poll_interval_secs),
            hourly_dm_limit,
            daily_dm_limit,
            dedupe_ttl: chrono::Duration::hours(dedupe_ttl_hours),
            comment_fetch_limit,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            hourly_dm_limit: DEFAULT_HOURLY_DM_LIMIT,
            daily_dm_limit: DEFAULT_DAILY_DM_LIMIT,
            dedupe_ttl: chrono::Duration::hours(DEFAULT_DEDUPE_TTL_HOURS),
            comment_fetch_limit: DEFAULT_COMMENT_FETCH_LIMIT,
        }
    }
}
