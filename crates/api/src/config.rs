//! Server configuration

use anyhow::Context;

/// API server configuration, loaded once at startup.
///
/// Stripe configuration is deliberately not here: the billing crate loads
/// and validates its own, and the server runs with billing disabled when
/// it is absent.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub database_url: String,
    pub openai_api_key: String,
    pub openai_model: String,
    /// Base URL of the OpenAI-compatible completion API. Overridable for
    /// tests and self-hosted gateways.
    pub openai_base_url: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let openai_api_key =
            std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY is not set")?;
        let openai_model =
            std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
        let openai_base_url = std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

        Ok(Self {
            bind_address,
            database_url,
            openai_api_key,
            openai_model,
            openai_base_url,
        })
    }
}
