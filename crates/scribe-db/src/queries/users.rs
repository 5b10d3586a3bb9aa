//! Database query functions for the `users` table.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::User;

/// Parameters for inserting a new user row.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: Option<&'a str>,
    pub hashed_password: Option<&'a str>,
    pub full_name: Option<&'a str>,
    pub is_superuser: bool,
    pub subscription_tier: &'a str,
    pub monthly_api_limit: i32,
    pub api_limit_reset_at: Option<DateTime<Utc>>,
}

/// Profile fields a user may change about themselves. `None` leaves the
/// column untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate<'a> {
    pub full_name: Option<&'a str>,
    pub email: Option<&'a str>,
    pub hashed_password: Option<&'a str>,
}

/// Insert a new user. Returns the row with server-generated defaults.
pub async fn insert_user(pool: &PgPool, new: &NewUser<'_>) -> Result<User> {
    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users \
         (username, email, hashed_password, full_name, is_superuser, \
          subscription_tier, monthly_api_limit, api_limit_reset_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING *",
    )
    .bind(new.username)
    .bind(new.email)
    .bind(new.hashed_password)
    .bind(new.full_name)
    .bind(new.is_superuser)
    .bind(new.subscription_tier)
    .bind(new.monthly_api_limit)
    .bind(new.api_limit_reset_at)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to insert user {:?}", new.username))?;

    Ok(user)
}

/// Fetch a user by ID.
pub async fn get_user(pool: &PgPool, id: Uuid) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch user")?;

    Ok(user)
}

/// Fetch a user by username.
pub async fn get_user_by_username(pool: &PgPool, username: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await
        .context("failed to fetch user by username")?;

    Ok(user)
}

/// Fetch a user by email address.
pub async fn get_user_by_email(pool: &PgPool, email: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("failed to fetch user by email")?;

    Ok(user)
}

/// List users, oldest first, with offset pagination.
pub async fn list_users(pool: &PgPool, skip: i64, limit: i64) -> Result<Vec<User>> {
    let users = sqlx::query_as::<_, User>(
        "SELECT * FROM users ORDER BY created_at, username OFFSET $1 LIMIT $2",
    )
    .bind(skip)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("failed to list users")?;

    Ok(users)
}

/// Fetch a user and hold a row lock until the surrounding transaction ends.
///
/// Serializes concurrent quota updates for the same user.
pub async fn lock_user(conn: &mut PgConnection, id: Uuid) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(conn)
        .await
        .context("failed to lock user row")?;

    Ok(user)
}

/// Write the quota counters for a user. Returns the updated row.
pub async fn update_quota_state(
    conn: &mut PgConnection,
    id: Uuid,
    api_call_count: i32,
    api_limit_reset_at: Option<DateTime<Utc>>,
) -> Result<User> {
    let user = sqlx::query_as::<_, User>(
        "UPDATE users \
         SET api_call_count = $1, api_limit_reset_at = $2, updated_at = now() \
         WHERE id = $3 \
         RETURNING *",
    )
    .bind(api_call_count)
    .bind(api_limit_reset_at)
    .bind(id)
    .fetch_optional(conn)
    .await
    .context("failed to update quota state")?;

    user.with_context(|| format!("user {id} not found"))
}

/// Set a user's tier together with its limit and freshly reset counters.
///
/// Returns `None` if the user does not exist.
pub async fn update_subscription(
    pool: &PgPool,
    id: Uuid,
    tier: &str,
    monthly_api_limit: i32,
    api_limit_reset_at: DateTime<Utc>,
) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "UPDATE users \
         SET subscription_tier = $1, monthly_api_limit = $2, api_call_count = 0, \
             api_limit_reset_at = $3, updated_at = now() \
         WHERE id = $4 \
         RETURNING *",
    )
    .bind(tier)
    .bind(monthly_api_limit)
    .bind(api_limit_reset_at)
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("failed to update subscription tier")?;

    Ok(user)
}

/// Activate or deactivate a user. Returns `None` if the user does not exist.
pub async fn set_active_status(pool: &PgPool, id: Uuid, is_active: bool) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "UPDATE users SET is_active = $1, updated_at = now() WHERE id = $2 RETURNING *",
    )
    .bind(is_active)
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("failed to update active status")?;

    Ok(user)
}

/// Apply a partial profile update. Returns `None` if the user does not exist.
pub async fn update_profile(
    pool: &PgPool,
    id: Uuid,
    update: &ProfileUpdate<'_>,
) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "UPDATE users \
         SET full_name = COALESCE($1, full_name), \
             email = COALESCE($2, email), \
             hashed_password = COALESCE($3, hashed_password), \
             updated_at = now() \
         WHERE id = $4 \
         RETURNING *",
    )
    .bind(update.full_name)
    .bind(update.email)
    .bind(update.hashed_password)
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("failed to update user profile")?;

    Ok(user)
}
