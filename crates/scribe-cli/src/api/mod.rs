//! HTTP API: shared state, error rendering, authentication extractors and
//! the router.

mod auth;
mod content;
mod subscriptions;
mod users;

use std::sync::Arc;

use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use scribe_core::accounts::{self, AccountError};
use scribe_core::content::{ContentError, ContentGenerator};
use scribe_core::quota::QuotaError;
use scribe_core::tiers::{TierError, TierRegistry};
use scribe_core::token::TokenConfig;
use scribe_db::models::User;
use scribe_db::pool;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Everything a handler needs. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub tiers: Arc<TierRegistry>,
    pub content: ContentGenerator,
    pub tokens: Arc<TokenConfig>,
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, msg)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, msg)
    }

    pub fn internal(err: anyhow::Error) -> Self {
        error!(error = %format!("{err:#}"), "request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "detail": self.message });
        let mut response = (self.status, Json(body)).into_response();
        if self.status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err)
    }
}

impl From<QuotaError> for AppError {
    fn from(err: QuotaError) -> Self {
        match err {
            QuotaError::Exceeded { .. } => Self::new(StatusCode::TOO_MANY_REQUESTS, err.to_string()),
            QuotaError::UserNotFound(_) => Self::unauthorized("Could not validate credentials"),
            QuotaError::Internal(e) => Self::internal(e),
        }
    }
}

impl From<TierError> for AppError {
    fn from(err: TierError) -> Self {
        match err {
            TierError::InvalidTier { .. } => Self::bad_request(err.to_string()),
            TierError::UserNotFound(id) => Self::not_found(format!("User with ID {id} not found.")),
            TierError::InvalidConfig(_) => Self::internal(anyhow::Error::new(err)),
            TierError::Internal(e) => Self::internal(e),
        }
    }
}

impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Validation(msg) => Self::new(StatusCode::UNPROCESSABLE_ENTITY, msg),
            AccountError::Conflict(msg) => Self::new(StatusCode::CONFLICT, msg),
            AccountError::InvalidCredentials | AccountError::InvalidToken(_) => {
                Self::unauthorized(err.to_string())
            }
            AccountError::Inactive => Self::bad_request(err.to_string()),
            AccountError::NotFound(_) => Self::not_found(err.to_string()),
            AccountError::Tier(e) => e.into(),
            AccountError::Internal(e) => Self::internal(e),
        }
    }
}

impl From<ContentError> for AppError {
    fn from(err: ContentError) -> Self {
        match err {
            ContentError::Validation(msg) => Self::bad_request(msg),
            ContentError::Store(e) => Self::internal(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

/// The caller named by the `Authorization: Bearer` header. Rejects inactive
/// accounts.
pub struct CurrentUser(pub User);

/// A [`CurrentUser`] who is also a superuser.
pub struct AdminUser(pub User);

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim())
        .filter(|t| !t.is_empty())
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let token = bearer_token(parts).ok_or_else(|| AppError::unauthorized("Not authenticated"))?;
        let user = accounts::resolve_token(&state.pool, &state.tokens, token).await?;
        if !user.is_active {
            return Err(AccountError::Inactive.into());
        }
        Ok(Self(user))
    }
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_superuser {
            return Err(AppError::forbidden("The user doesn't have enough privileges"));
        }
        Ok(Self(user))
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(auth::routes())
        .merge(content::routes())
        .merge(users::routes())
        .merge(subscriptions::routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Welcome to the Scribe content generation API!" }))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    database: bool,
    generator: bool,
}

/// Database and model probes. 503 when the database is unreachable; a
/// down model only degrades, since generation falls back.
async fn health(State(state): State<AppState>) -> Response {
    let database = pool::ping(&state.pool).await.is_ok();
    let generator = state.content.generator().is_healthy().await;
    let status = match (database, generator) {
        (true, true) => "ok",
        (true, false) => "degraded",
        (false, _) => "unavailable",
    };
    let code = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        code,
        Json(HealthResponse {
            status,
            database,
            generator,
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
