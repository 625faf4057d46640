#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! CaseGen shared infrastructure
//!
//! Database pool construction, migrations, and domain types used by both
//! the API server and the billing crate.

pub mod db;
pub mod types;

pub use db::{create_pool, run_migrations};
pub use types::{SubscriptionStatus, User, FREE_GENERATION_LIMIT};
