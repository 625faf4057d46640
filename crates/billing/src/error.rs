//! Billing error types

use thiserror::Error;

pub type BillingResult<T> = Result<T, BillingError>;

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Webhook signature verification failed")]
    WebhookSignatureInvalid,

    #[error("Webhook payload is malformed: {0}")]
    WebhookPayloadInvalid(String),

    #[error("Stripe API error: {0}")]
    Stripe(#[from] stripe::StripeError),

    #[error("Invalid Stripe identifier: {0}")]
    InvalidStripeId(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Billing is not configured: {0}")]
    Config(String),

    #[error("Internal billing error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for BillingError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl BillingError {
    /// Whether the billing provider should redeliver the event.
    ///
    /// Transient downstream failures (database writes, remote lookups) map
    /// to a 5xx so the provider retries. Verification and payload errors are
    /// terminal for the delivery.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Stripe(_) | Self::Internal(_)
        )
    }
}
