//! Checkout session creation
//!
//! The client-facing upgrade action: creates a subscription-mode checkout
//! session at Stripe and hands the hosted URL back to the caller. The
//! internal user id travels in session metadata so the webhook reconciler
//! can resolve identity without an email lookup.

use std::collections::HashMap;

use serde::Serialize;
use stripe::{
    CheckoutSession, CheckoutSessionMode, CreateCheckoutSession, CreateCheckoutSessionAutomaticTax,
    CreateCheckoutSessionLineItems,
};
use uuid::Uuid;

use crate::client::StripeClient;
use crate::error::{BillingError, BillingResult};

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub url: String,
}

pub struct CheckoutService {
    stripe: StripeClient,
}

impl CheckoutService {
    pub fn new(stripe: StripeClient) -> Self {
        Self { stripe }
    }

    /// Create a checkout session for the pro subscription plan.
    pub async fn create_upgrade_session(
        &self,
        email: &str,
        user_id: Option<Uuid>,
    ) -> BillingResult<CheckoutResponse> {
        let config = self.stripe.config();
        let success_url = format!(
            "{}/success?session_id={{CHECKOUT_SESSION_ID}}",
            config.site_url
        );
        let cancel_url = format!("{}/", config.site_url);

        let mut params = CreateCheckoutSession::new();
        params.mode = Some(CheckoutSessionMode::Subscription);
        params.customer_email = Some(email);
        params.success_url = Some(&success_url);
        params.cancel_url = Some(&cancel_url);
        params.line_items = Some(vec![CreateCheckoutSessionLineItems {
            price: Some(config.pro_price_id.clone()),
            quantity: Some(1),
            ..Default::default()
        }]);
        params.automatic_tax = Some(CreateCheckoutSessionAutomaticTax {
            enabled: true,
            liability: None,
        });
        if let Some(user_id) = user_id {
            params.metadata = Some(HashMap::from([(
                "user_id".to_string(),
                user_id.to_string(),
            )]));
        }

        let session = CheckoutSession::create(self.stripe.inner(), params).await?;

        let url = session.url.ok_or_else(|| {
            BillingError::Internal("Checkout session has no hosted URL".to_string())
        })?;

        tracing::info!(
            session_id = %session.id,
            email = %email,
            user_id = ?user_id,
            "Checkout session created"
        );

        Ok(CheckoutResponse { url })
    }
}
