//! `/auth`: registration and password login.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Form, Json, Router};
use serde::Deserialize;

use scribe_core::accounts::{self, LoginToken, RegisterRequest};

use super::users::UserResponse;
use super::{AppError, AppState};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/token", post(token))
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let user = accounts::register(&state.pool, &state.tiers, &req).await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// OAuth2 password-flow form fields.
#[derive(Debug, Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

async fn token(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Json<LoginToken>, AppError> {
    let issued = accounts::login(&state.pool, &state.tokens, &form.username, &form.password).await?;
    Ok(Json(issued))
}
