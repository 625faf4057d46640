#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! CaseGen Billing
//!
//! Stripe integration for the pro subscription:
//!
//! - **Webhooks**: verify, parse, and reconcile billing events against the
//!   user database (the core of this crate)
//! - **Checkout**: create upgrade checkout sessions
//!
//! Handlers take their collaborators (`UserStore`, `BillingProvider`)
//! explicitly, so webhook reconciliation can be tested with fakes and no
//! module-level client singletons exist.

pub mod checkout;
pub mod client;
pub mod error;
pub mod events;
pub mod provider;
pub mod store;
pub mod webhooks;

#[cfg(test)]
mod edge_case_tests;

pub use checkout::{CheckoutResponse, CheckoutService};
pub use client::{StripeClient, StripeConfig};
pub use error::{BillingError, BillingResult};
pub use events::{BillingEvent, EventKind, SubscriptionState};
pub use provider::{BillingProvider, CustomerProfile, StripeGateway};
pub use store::{PgUserStore, UserKey, UserStore};
pub use webhooks::WebhookHandler;

use sqlx::PgPool;

/// Billing service bundling the webhook reconciler and the checkout flow.
pub struct BillingService {
    pub checkout: CheckoutService,
    pub webhooks: WebhookHandler,
}

impl BillingService {
    /// Create a billing service from environment variables.
    ///
    /// Fails with a `Config` error when Stripe is not configured; callers
    /// treat that as "billing disabled" rather than a startup failure.
    pub fn from_env(pool: PgPool) -> BillingResult<Self> {
        let stripe = StripeClient::from_env()?;
        Ok(Self::new(stripe, pool))
    }

    pub fn new(stripe: StripeClient, pool: PgPool) -> Self {
        Self {
            checkout: CheckoutService::new(stripe.clone()),
            webhooks: WebhookHandler::new(stripe, pool),
        }
    }
}
