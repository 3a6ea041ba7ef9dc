//! Repository for the `accounts` table.

use sqlx::PgPool;

use replyflow_core::types::{DbId, Timestamp};

use crate::models::account::{Account, CreateAccount};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, provider_account_id, username, access_token, \
    token_expires_at, connected, created_at, updated_at";

/// Provides CRUD operations for connected provider accounts.
pub struct AccountRepo;

impl AccountRepo {
    /// Insert a newly connected account, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateAccount) -> Result<Account, sqlx::Error> {
        let query = format!(
            "INSERT INTO accounts
                (user_id, provider_account_id, username, access_token, token_expires_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Account>(&query)
            .bind(input.user_id)
            .bind(&input.provider_account_id)
            .bind(&input.username)
            .bind(&input.access_token)
            .bind(input.token_expires_at)
            .fetch_one(pool)
            .await
    }

    /// Find an account by its primary key.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Account>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM accounts WHERE id = $1");
        sqlx::query_as::<_, Account>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List a user's connected accounts, most recently connected first.
    pub async fn list_by_user(pool: &PgPool, user_id: DbId) -> Result<Vec<Account>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM accounts WHERE user_id = $1 ORDER BY created_at DESC");
        sqlx::query_as::<_, Account>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Store a refreshed access token and its expiry.
    ///
    /// Returns `true` if the row was updated. Reconnecting also clears the
    /// disconnected flag.
    pub async fn update_token(
        pool: &PgPool,
        id: DbId,
        access_token: &str,
        token_expires_at: Option<Timestamp>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE accounts SET
                access_token = $2,
                token_expires_at = $3,
                connected = true,
                updated_at = now()
             WHERE id = $1",
        )
        .bind(id)
        .bind(access_token)
        .bind(token_expires_at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Flag an account as disconnected (expired or revoked credential).
    ///
    /// Returns `true` if the row was updated.
    pub async fn mark_disconnected(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE accounts SET connected = false, updated_at = now()
             WHERE id = $1 AND connected = true",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
