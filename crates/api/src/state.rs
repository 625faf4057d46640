//! Application state

use sqlx::PgPool;
use std::sync::Arc;

use casegen_billing::BillingService;

use crate::{config::Config, generation::LlmClient};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    /// Billing service; `None` when Stripe is not configured. Billing
    /// endpoints answer 503 in that case, everything else keeps working.
    pub billing: Option<Arc<BillingService>>,
    pub llm: LlmClient,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        // Try to initialize billing if Stripe env vars are set
        let billing = match BillingService::from_env(pool.clone()) {
            Ok(svc) => {
                tracing::info!("Stripe billing service initialized");
                Some(Arc::new(svc))
            }
            Err(e) => {
                tracing::warn!("Stripe billing not configured: {}", e);
                None
            }
        };

        let llm = LlmClient::new(&config);

        Self {
            pool,
            config,
            billing,
            llm,
        }
    }

    pub fn billing_service(&self) -> Option<&Arc<BillingService>> {
        self.billing.as_ref()
    }
}
