//! Billing provider lookups
//!
//! The reconciler needs two remote reads from the billing provider: a
//! customer's email (identity fallback) and a subscription's status
//! (invoice gating). They sit behind a trait so webhook handling can be
//! exercised with fakes.

use async_trait::async_trait;

use crate::client::StripeClient;
use crate::error::{BillingError, BillingResult};
use casegen_shared::SubscriptionStatus;

/// The slice of a provider customer object the reconciler cares about.
#[derive(Debug, Clone)]
pub struct CustomerProfile {
    pub email: Option<String>,
    /// Deletion marker: a deleted customer is never a valid email source.
    pub deleted: bool,
}

#[async_trait]
pub trait BillingProvider: Send + Sync {
    async fn fetch_customer(&self, customer_id: &str) -> BillingResult<CustomerProfile>;

    async fn fetch_subscription_status(
        &self,
        subscription_id: &str,
    ) -> BillingResult<SubscriptionStatus>;
}

/// Stripe-backed provider implementation.
#[derive(Clone)]
pub struct StripeGateway {
    client: StripeClient,
}

impl StripeGateway {
    pub fn new(client: StripeClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BillingProvider for StripeGateway {
    async fn fetch_customer(&self, customer_id: &str) -> BillingResult<CustomerProfile> {
        let id = customer_id
            .parse()
            .map_err(|_| BillingError::InvalidStripeId(customer_id.to_string()))?;

        let customer = stripe::Customer::retrieve(self.client.inner(), &id, &[]).await?;

        Ok(CustomerProfile {
            email: customer.email,
            deleted: customer.deleted,
        })
    }

    async fn fetch_subscription_status(
        &self,
        subscription_id: &str,
    ) -> BillingResult<SubscriptionStatus> {
        let id = subscription_id
            .parse()
            .map_err(|_| BillingError::InvalidStripeId(subscription_id.to_string()))?;

        let subscription = stripe::Subscription::retrieve(self.client.inner(), &id, &[]).await?;

        Ok(SubscriptionStatus::from_provider(
            subscription.status.as_str(),
        ))
    }
}
