//! API error types and response mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use casegen_billing::BillingError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found")]
    NotFound,

    #[error("Generation limit reached. Please upgrade to Pro.")]
    QuotaExceeded,

    #[error("Billing is not configured")]
    BillingUnavailable,

    #[error(transparent)]
    Billing(#[from] BillingError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Generation failed: {0}")]
    Generation(#[from] crate::generation::GenerationError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::QuotaExceeded => StatusCode::FORBIDDEN,
            Self::BillingUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Billing(err) => match err {
                // Terminal for the delivery: the sender must not retry
                BillingError::WebhookSignatureInvalid
                | BillingError::WebhookPayloadInvalid(_)
                | BillingError::InvalidStripeId(_) => StatusCode::BAD_REQUEST,
                BillingError::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
                // Transient: a 5xx asks the billing provider to redeliver
                BillingError::Stripe(_)
                | BillingError::Database(_)
                | BillingError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Generation(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
