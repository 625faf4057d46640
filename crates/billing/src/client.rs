//! Stripe client and configuration

use std::sync::Arc;

use crate::error::{BillingError, BillingResult};

/// Stripe configuration, validated at construction time.
#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// Secret API key (`sk_...`).
    pub secret_key: String,
    /// Webhook endpoint secret (`whsec_...`).
    pub webhook_secret: String,
    /// Price ID of the pro subscription plan.
    pub pro_price_id: String,
    /// Public site URL used for checkout success/cancel redirects.
    pub site_url: String,
}

impl StripeConfig {
    /// Load configuration from environment variables.
    ///
    /// Fails with a `Config` error naming the missing variable so callers
    /// can run with billing disabled instead of panicking at startup.
    pub fn from_env() -> BillingResult<Self> {
        let secret_key = require_env("STRIPE_SECRET_KEY")?;
        let webhook_secret = require_env("STRIPE_WEBHOOK_SECRET")?;
        let pro_price_id = require_env("STRIPE_PRO_PRICE_ID")?;

        if !secret_key.starts_with("sk_") {
            return Err(BillingError::Config(
                "STRIPE_SECRET_KEY does not look like a secret key".to_string(),
            ));
        }
        if !webhook_secret.starts_with("whsec_") {
            return Err(BillingError::Config(
                "STRIPE_WEBHOOK_SECRET does not look like a webhook secret".to_string(),
            ));
        }

        let site_url = std::env::var("SITE_URL")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "http://localhost:3000".to_string());

        Ok(Self {
            secret_key,
            webhook_secret,
            pro_price_id,
            site_url,
        })
    }
}

fn require_env(name: &str) -> BillingResult<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| BillingError::Config(format!("{} is not set", name)))
}

/// Shared Stripe client wrapper.
///
/// Constructed explicitly and passed into services rather than held in a
/// module-level singleton, so handlers can be built with fakes in tests.
#[derive(Clone)]
pub struct StripeClient {
    inner: Arc<stripe::Client>,
    config: Arc<StripeConfig>,
}

impl StripeClient {
    pub fn new(config: StripeConfig) -> Self {
        let inner = Arc::new(stripe::Client::new(config.secret_key.clone()));
        Self {
            inner,
            config: Arc::new(config),
        }
    }

    pub fn from_env() -> BillingResult<Self> {
        Ok(Self::new(StripeConfig::from_env()?))
    }

    pub fn inner(&self) -> &stripe::Client {
        &self.inner
    }

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }
}
