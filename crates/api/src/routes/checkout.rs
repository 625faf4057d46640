//! Checkout session endpoint

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use casegen_billing::CheckoutResponse;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub email: String,
    pub user_id: Option<Uuid>,
}

pub async fn create_checkout_session(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> ApiResult<Json<CheckoutResponse>> {
    let billing = state
        .billing_service()
        .ok_or(ApiError::BillingUnavailable)?;

    if request.email.trim().is_empty() {
        return Err(ApiError::BadRequest("Email is required".to_string()));
    }

    let session = billing
        .checkout
        .create_upgrade_session(&request.email, request.user_id)
        .await?;

    Ok(Json(session))
}
