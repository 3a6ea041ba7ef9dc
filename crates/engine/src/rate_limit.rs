//! Per-account sliding-window caps on outbound DMs.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use tokio::sync::Mutex;

use replyflow_core::types::{DbId, Timestamp};

/// Result of a rate-limit check.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// When the blocking window resets; set only when `allowed` is false.
    pub retry_after: Option<Timestamp>,
}

impl RateLimitDecision {
    fn allowed() -> Self {
        Self {
            allowed: true,
            retry_after: None,
        }
    }

    fn blocked(retry_after: Timestamp) -> Self {
        Self {
            allowed: false,
            retry_after: Some(retry_after),
        }
    }
}

/// One rolling counter window: count plus the instant it zeroes out.
#[derive(Debug, Clone, Copy)]
struct WindowState {
    count: i64,
    reset_at: Timestamp,
}

impl WindowState {
    fn start(now: Timestamp, window: Duration) -> Self {
        Self {
            count: 0,
            reset_at: now + window,
        }
    }

    /// Zero the counter and schedule the next reset once the window passed.
    fn refresh(&mut self, now: Timestamp, window: Duration) {
        if now > self.reset_at {
            self.count = 0;
            self.reset_at = now + window;
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct AccountWindows {
    hourly: WindowState,
    daily: WindowState,
}

/// Per-account hourly/daily outbound-DM caps.
///
/// Counters are shared across all workflows of an account, so the map lives
/// behind one async mutex. The check/commit split is intentionally
/// non-atomic: two dispatches for the same account can both pass
/// [`check_and_reserve`](RateLimiter::check_and_reserve) before either
/// [`commit`](RateLimiter::commit)s, overshooting a cap by at most the number
/// of concurrently in-flight sends. The caps are protective thresholds, not
/// exact quotas.
pub struct RateLimiter {
    windows: Mutex<HashMap<DbId, AccountWindows>>,
    hourly_limit: i64,
    daily_limit: i64,
}

impl RateLimiter {
    pub fn new(hourly_limit: i64, daily_limit: i64) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            hourly_limit,
            daily_limit,
        }
    }

    /// Whether `account_id` may send one more DM right now.
    ///
    /// The effective daily cap is the account-level limit tightened by the
    /// workflow's own `max_dms_per_day`; the hourly cap is account-level
    /// only. On an allowed decision the caller must [`commit`] after the
    /// provider confirms the send.
    ///
    /// [`commit`]: RateLimiter::commit
    pub async fn check_and_reserve(
        &self,
        account_id: DbId,
        workflow_daily_cap: i32,
    ) -> RateLimitDecision {
        self.check_at(account_id, workflow_daily_cap, Utc::now()).await
    }

    /// Count one confirmed send against both windows.
    pub async fn commit(&self, account_id: DbId) {
        self.commit_at(account_id, Utc::now()).await
    }

    async fn check_at(
        &self,
        account_id: DbId,
        workflow_daily_cap: i32,
        now: Timestamp,
    ) -> RateLimitDecision {
        let mut windows = self.windows.lock().await;
        let account = entry(&mut windows, account_id, now);
        account.hourly.refresh(now, Duration::hours(1));
        account.daily.refresh(now, Duration::days(1));

        if account.hourly.count >= self.hourly_limit {
            return RateLimitDecision::blocked(account.hourly.reset_at);
        }

        let daily_cap = self.daily_limit.min(i64::from(workflow_daily_cap));
        if account.daily.count >= daily_cap {
            return RateLimitDecision::blocked(account.daily.reset_at);
        }

        RateLimitDecision::allowed()
    }

    async fn commit_at(&self, account_id: DbId, now: Timestamp) {
        let mut windows = self.windows.lock().await;
        let account = entry(&mut windows, account_id, now);
        account.hourly.refresh(now, Duration::hours(1));
        account.daily.refresh(now, Duration::days(1));
        account.hourly.count += 1;
        account.daily.count += 1;
    }
}

/// Fetch or initialise the windows for an account. Both windows are
/// scheduled `now + window` on first use.
fn entry(
    windows: &mut HashMap<DbId, AccountWindows>,
    account_id: DbId,
    now: Timestamp,
) -> &mut AccountWindows {
    windows.entry(account_id).or_insert_with(|| AccountWindows {
        hourly: WindowState::start(now, Duration::hours(1)),
        daily: WindowState::start(now, Duration::days(1)),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
