//! Connected provider account model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use replyflow_core::types::{DbId, Timestamp};

/// Full account row from the `accounts` table.
///
/// Contains the provider access token -- NEVER serialize this to API
/// responses directly. Use [`AccountResponse`] for external-facing output.
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub id: DbId,
    pub user_id: DbId,
    /// Identity of the account at the social provider.
    pub provider_account_id: String,
    pub username: String,
    pub access_token: String,
    /// Providers issue long-lived tokens with a hard expiry; `None` means the
    /// provider reported no expiry.
    pub token_expires_at: Option<Timestamp>,
    pub connected: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Account {
    /// Whether the stored access token is past its expiry at `now`.
    pub fn is_token_expired(&self, now: Timestamp) -> bool {
        match self.token_expires_at {
            Some(expires_at) => now > expires_at,
            None => false,
        }
    }
}

/// Safe account representation for API responses (no access token).
#[derive(Debug, Clone, Serialize)]
pub struct AccountResponse {
    pub id: DbId,
    pub user_id: DbId,
    pub provider_account_id: String,
    pub username: String,
    pub token_expires_at: Option<Timestamp>,
    pub connected: bool,
    pub created_at: Timestamp,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            user_id: account.user_id,
            provider_account_id: account.provider_account_id,
            username: account.username,
            token_expires_at: account.token_expires_at,
            connected: account.connected,
            created_at: account.created_at,
        }
    }
}

/// DTO for connecting a new account.
#[derive(Debug, Deserialize)]
pub struct CreateAccount {
    pub user_id: DbId,
    pub provider_account_id: String,
    pub username: String,
    pub access_token: String,
    pub token_expires_at: Option<Timestamp>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn account(token_expires_at: Option<Timestamp>) -> Account {
        let now = Utc::now();
        Account {
            id: 1,
            user_id: 1,
            provider_account_id: "17840001".into(),
            username: "shop.example".into(),
            access_token: "tok".into(),
            token_expires_at,
            connected: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn token_expiry_is_checked_against_now() {
        let now = Utc::now();
        let expired = account(Some(now - Duration::hours(1)));
        let valid = account(Some(now + Duration::hours(1)));
        assert!(expired.is_token_expired(now));
        assert!(!valid.is_token_expired(now));
    }

    #[test]
    fn missing_expiry_never_expires() {
        let now = Utc::now();
        assert!(!account(None).is_token_expired(now));
    }
}
