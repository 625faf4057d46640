//! Stripe webhook endpoint
//!
//! Takes the raw request body so the signature is verified over the exact
//! bytes Stripe signed. Axum's JSON extractor would re-serialize and break
//! verification.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let billing = state
        .billing_service()
        .ok_or(ApiError::BillingUnavailable)?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("Missing stripe-signature header".to_string()))?;

    let event = billing.webhooks.verify_event(&body, signature)?;
    tracing::debug!(event_id = %event.id, "Webhook signature verified");

    billing.webhooks.handle_event(event).await?;

    Ok(StatusCode::OK)
}
