//! `/users`: the caller's own account plus admin user management.

use axum::extract::{Query, State};
use axum::routing::{get, patch};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use scribe_core::accounts::{self, ProfileUpdateRequest};
use scribe_core::tiers;
use scribe_db::models::User;

use super::{AdminUser, AppError, AppState, CurrentUser};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(read_me).patch(update_me))
        .route("/users/me/subscription", patch(change_my_subscription))
        .route("/users", get(list_users))
        .route("/users/", get(list_users))
        .route("/users/update-tier", patch(admin_update_tier))
        .route("/users/set-active-status", patch(admin_set_active_status))
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Public account fields.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub is_superuser: bool,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            full_name: u.full_name,
            is_active: u.is_active,
            is_superuser: u.is_superuser,
        }
    }
}

/// Account fields plus subscription and quota state, for the owner.
#[derive(Debug, Serialize)]
pub struct UserMeResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub subscription_tier: String,
    pub api_call_count: i32,
    pub monthly_api_limit: i32,
    pub api_limit_reset_at: Option<DateTime<Utc>>,
}

impl From<User> for UserMeResponse {
    fn from(u: User) -> Self {
        let subscription_tier = u.subscription_tier.clone();
        let (api_call_count, monthly_api_limit, api_limit_reset_at) =
            (u.api_call_count, u.monthly_api_limit, u.api_limit_reset_at);
        Self {
            user: u.into(),
            subscription_tier,
            api_call_count,
            monthly_api_limit,
            api_limit_reset_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChangeSubscriptionRequest {
    new_tier: String,
}

#[derive(Debug, Deserialize)]
struct UpdateTierRequest {
    user_id: Uuid,
    new_tier: String,
}

#[derive(Debug, Deserialize)]
struct SetActiveStatusRequest {
    user_id: Uuid,
    is_active: bool,
}

#[derive(Debug, Deserialize)]
struct ListParams {
    #[serde(default)]
    skip: i64,
    #[serde(default = "default_list_limit")]
    limit: i64,
}

fn default_list_limit() -> i64 {
    100
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn read_me(CurrentUser(user): CurrentUser) -> Json<UserMeResponse> {
    Json(user.into())
}

async fn update_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<ProfileUpdateRequest>,
) -> Result<Json<UserMeResponse>, AppError> {
    let updated = accounts::update_profile(&state.pool, &user, &req).await?;
    Ok(Json(updated.into()))
}

/// Self-service tier change. No payment step.
async fn change_my_subscription(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<ChangeSubscriptionRequest>,
) -> Result<Json<UserMeResponse>, AppError> {
    let updated = tiers::change_tier(&state.pool, &state.tiers, user.id, &req.new_tier).await?;
    Ok(Json(updated.into()))
}

async fn list_users(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let users = accounts::list(&state.pool, params.skip, params.limit).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

async fn admin_update_tier(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Json(req): Json<UpdateTierRequest>,
) -> Result<Json<UserMeResponse>, AppError> {
    let updated = accounts::change_tier(&state.pool, &state.tiers, req.user_id, &req.new_tier).await?;
    Ok(Json(updated.into()))
}

async fn admin_set_active_status(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Json(req): Json<SetActiveStatusRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let updated = accounts::set_active(&state.pool, req.user_id, req.is_active).await?;
    Ok(Json(updated.into()))
}
