#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! CaseGen API Server
//!
//! HTTP backend for the case-study generator: generation with free-quota
//! enforcement, Stripe checkout and webhook endpoints, and account
//! soft-deletion.

pub mod config;
pub mod error;
pub mod generation;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use state::AppState;
