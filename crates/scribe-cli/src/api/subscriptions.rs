//! `/subscriptions`: the public tier catalogue.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use scribe_core::tiers::SubscriptionTier;

use super::AppState;

pub(super) fn routes() -> Router<AppState> {
    Router::new().route("/subscriptions/plans", get(list_plans))
}

async fn list_plans(State(state): State<AppState>) -> Json<Vec<SubscriptionTier>> {
    Json(state.tiers.list_plans().to_vec())
}
