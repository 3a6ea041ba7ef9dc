//! User entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use replyflow_core::types::{DbId, Timestamp};

/// Full user row from the `users` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: DbId,
    /// Identity assigned by the social provider.
    pub provider_user_id: String,
    pub username: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a new user.
#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub provider_user_id: String,
    pub username: String,
}
