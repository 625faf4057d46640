//! HTTP routes

mod account;
mod checkout;
mod generate;
mod webhook;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/generate-case-study", post(generate::generate_case_study))
        .route(
            "/api/create-checkout-session",
            post(checkout::create_checkout_session),
        )
        .route("/api/stripe-webhook", post(webhook::stripe_webhook))
        .route("/api/delete-account", post(account::delete_account))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
