//! Local accounts: registration, password login, profile changes and
//! admin user management.
//!
//! Passwords are bcrypt-hashed on the blocking thread pool. Sessions are
//! stateless access tokens from [`crate::token`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use scribe_db::models::User;
use scribe_db::queries::is_unique_violation;
use scribe_db::queries::users::{self, NewUser, ProfileUpdate};

use crate::quota::reset_period;
use crate::tiers::{TierError, TierRegistry};
use crate::token::{self, TokenConfig, TokenError};

pub const USERNAME_MIN_CHARS: usize = 3;
pub const USERNAME_MAX_CHARS: usize = 50;
pub const PASSWORD_MIN_CHARS: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Incorrect username or password")]
    InvalidCredentials,

    #[error("Could not validate credentials")]
    InvalidToken(#[source] Option<TokenError>),

    #[error("Inactive user")]
    Inactive,

    #[error("User with ID {0} not found.")]
    NotFound(Uuid),

    #[error(transparent)]
    Tier(#[from] TierError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

// ---------------------------------------------------------------------------
// Passwords
// ---------------------------------------------------------------------------

pub async fn hash_password(password: &str) -> Result<String, AccountError> {
    let password = password.to_string();
    let hashed = tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await
        .map_err(anyhow::Error::from)?
        .map_err(anyhow::Error::from)?;
    Ok(hashed)
}

pub async fn verify_password(password: &str, hashed: &str) -> Result<bool, AccountError> {
    let (password, hashed) = (password.to_string(), hashed.to_string());
    let ok = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hashed))
        .await
        .map_err(anyhow::Error::from)?
        .map_err(anyhow::Error::from)?;
    Ok(ok)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

pub fn validate_username(username: &str) -> Result<(), AccountError> {
    let len = username.chars().count();
    if !(USERNAME_MIN_CHARS..=USERNAME_MAX_CHARS).contains(&len) {
        return Err(AccountError::Validation(format!(
            "Username must be between {USERNAME_MIN_CHARS} and {USERNAME_MAX_CHARS} characters."
        )));
    }
    if username.chars().any(char::is_whitespace) {
        return Err(AccountError::Validation(
            "Username must not contain whitespace.".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), AccountError> {
    if password.chars().count() < PASSWORD_MIN_CHARS {
        return Err(AccountError::Validation(format!(
            "Password must be at least {PASSWORD_MIN_CHARS} characters."
        )));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), AccountError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(AccountError::Validation(format!(
            "Invalid email address: {email}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Registration and login
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Account creation options beyond self-service registration.
#[derive(Debug, Clone, Default)]
pub struct AccountOptions {
    pub is_superuser: bool,
    /// Starting tier; the registry default when `None`.
    pub tier: Option<String>,
}

/// Self-service registration on the default tier.
pub async fn register(
    pool: &PgPool,
    registry: &TierRegistry,
    req: &RegisterRequest,
) -> Result<User, AccountError> {
    create_account(pool, registry, req, &AccountOptions::default()).await
}

/// Create an account. New users start a fresh quota window at their tier's
/// allowance.
pub async fn create_account(
    pool: &PgPool,
    registry: &TierRegistry,
    req: &RegisterRequest,
    options: &AccountOptions,
) -> Result<User, AccountError> {
    validate_username(&req.username)?;
    validate_password(&req.password)?;
    let email = req.email.as_deref().filter(|e| !e.is_empty());
    if let Some(email) = email {
        validate_email(email)?;
    }

    let tier = match &options.tier {
        Some(id) => registry.require(id)?,
        None => registry.default_tier(),
    };

    if users::get_user_by_username(pool, &req.username).await?.is_some() {
        return Err(AccountError::Conflict("Username already taken".to_string()));
    }
    if let Some(email) = email {
        if users::get_user_by_email(pool, email).await?.is_some() {
            return Err(AccountError::Conflict("Email already registered".to_string()));
        }
    }

    let hashed = hash_password(&req.password).await?;
    let new = NewUser {
        username: &req.username,
        email,
        hashed_password: Some(&hashed),
        full_name: req.full_name.as_deref(),
        is_superuser: options.is_superuser,
        subscription_tier: &tier.tier_id,
        monthly_api_limit: tier.api_calls,
        api_limit_reset_at: Some(Utc::now() + reset_period()),
    };

    let user = match users::insert_user(pool, &new).await {
        Ok(user) => user,
        // Lost a race with a concurrent registration.
        Err(e) if is_unique_violation(&e) => {
            return Err(AccountError::Conflict(
                "Username or email already registered".to_string(),
            ));
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id = %user.id, username = %user.username, tier = %user.subscription_tier, "user registered");
    Ok(user)
}

/// Check a username/password pair.
pub async fn authenticate(pool: &PgPool, username: &str, password: &str) -> Result<User, AccountError> {
    let Some(user) = users::get_user_by_username(pool, username).await? else {
        return Err(AccountError::InvalidCredentials);
    };
    let Some(hashed) = user.hashed_password.as_deref() else {
        return Err(AccountError::InvalidCredentials);
    };
    if !verify_password(password, hashed).await? {
        return Err(AccountError::InvalidCredentials);
    }
    if !user.is_active {
        return Err(AccountError::Inactive);
    }
    Ok(user)
}

/// A bearer token handed out at login.
#[derive(Debug, Clone, Serialize)]
pub struct LoginToken {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
}

/// Authenticate and issue an access token.
pub async fn login(
    pool: &PgPool,
    tokens: &TokenConfig,
    username: &str,
    password: &str,
) -> Result<LoginToken, AccountError> {
    let user = authenticate(pool, username, password).await?;
    let issued = token::issue_access_token(tokens, user.id, Utc::now());
    info!(user_id = %user.id, "access token issued");
    Ok(LoginToken {
        access_token: issued.token,
        token_type: "bearer",
        expires_at: issued.expires_at,
    })
}

/// Resolve a bearer token to its user. Does not check `is_active`.
pub async fn resolve_token(
    pool: &PgPool,
    tokens: &TokenConfig,
    token: &str,
) -> Result<User, AccountError> {
    let claims = token::validate_token(tokens, token, Utc::now())
        .map_err(|e| AccountError::InvalidToken(Some(e)))?;
    users::get_user(pool, claims.user_id)
        .await?
        .ok_or(AccountError::InvalidToken(None))
}

// ---------------------------------------------------------------------------
// Profile and admin
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProfileUpdateRequest {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub new_password: Option<String>,
}

/// Apply a user's own profile changes. Unset fields are left alone.
pub async fn update_profile(
    pool: &PgPool,
    user: &User,
    req: &ProfileUpdateRequest,
) -> Result<User, AccountError> {
    if let Some(email) = req.email.as_deref() {
        validate_email(email)?;
        if user.email.as_deref() != Some(email) {
            if let Some(existing) = users::get_user_by_email(pool, email).await? {
                if existing.id != user.id {
                    return Err(AccountError::Conflict(
                        "Email already registered by another user.".to_string(),
                    ));
                }
            }
        }
    }

    let hashed = match req.new_password.as_deref() {
        Some(password) => {
            validate_password(password)?;
            Some(hash_password(password).await?)
        }
        None => None,
    };

    let update = ProfileUpdate {
        full_name: req.full_name.as_deref(),
        email: req.email.as_deref(),
        hashed_password: hashed.as_deref(),
    };
    let updated = match users::update_profile(pool, user.id, &update).await {
        Ok(updated) => updated,
        Err(e) if is_unique_violation(&e) => {
            return Err(AccountError::Conflict(
                "Email already registered by another user.".to_string(),
            ));
        }
        Err(e) => return Err(e.into()),
    };
    updated.ok_or(AccountError::NotFound(user.id))
}

pub async fn set_active(pool: &PgPool, user_id: Uuid, is_active: bool) -> Result<User, AccountError> {
    let user = users::set_active_status(pool, user_id, is_active)
        .await?
        .ok_or(AccountError::NotFound(user_id))?;
    info!(%user_id, is_active, "user active status changed");
    Ok(user)
}

pub async fn list(pool: &PgPool, skip: i64, limit: i64) -> Result<Vec<User>, AccountError> {
    Ok(users::list_users(pool, skip.max(0), limit.clamp(1, 1000)).await?)
}

/// Change a user's tier, mapping a missing user to [`AccountError::NotFound`].
pub async fn change_tier(
    pool: &PgPool,
    registry: &TierRegistry,
    user_id: Uuid,
    tier_id: &str,
) -> Result<User, AccountError> {
    match crate::tiers::change_tier(pool, registry, user_id, tier_id).await {
        Ok(user) => Ok(user),
        Err(TierError::UserNotFound(id)) => Err(AccountError::NotFound(id)),
        Err(e) => Err(e.into()),
    }
}
