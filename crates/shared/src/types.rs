//! Shared domain types

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Number of free generations a non-pro user gets before upgrading.
pub const FREE_GENERATION_LIMIT: i32 = 3;

/// A user row.
///
/// `is_pro` and `generation_count` are nullable in the schema: an absent
/// pro flag means "not pro" and an absent count means zero.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub is_pro: Option<bool>,
    pub generation_count: Option<i32>,
    pub stripe_customer_id: Option<String>,
    pub is_deleted: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl User {
    /// Effective pro entitlement (NULL means not pro).
    pub fn is_pro(&self) -> bool {
        self.is_pro.unwrap_or(false)
    }

    /// Effective free-quota usage (NULL means zero).
    pub fn generation_count(&self) -> i32 {
        self.generation_count.unwrap_or(0)
    }
}

/// Subscription lifecycle status as reported by the billing provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trialing,
    Active,
    PastDue,
    Canceled,
    Unpaid,
    Incomplete,
    IncompleteExpired,
    Paused,
}

impl SubscriptionStatus {
    /// Whether this status entitles the user to pro features.
    ///
    /// Only `active` and `trialing` grant entitlement; every other status
    /// (including unknown ones, see `from_provider`) does not.
    pub fn entitles_pro(self) -> bool {
        matches!(self, Self::Active | Self::Trialing)
    }

    /// Parse a provider status string.
    ///
    /// Unknown statuses map to `Incomplete` so they never grant
    /// unintended access.
    pub fn from_provider(status: &str) -> Self {
        match status {
            "trialing" => Self::Trialing,
            "active" => Self::Active,
            "past_due" => Self::PastDue,
            "canceled" => Self::Canceled,
            "unpaid" => Self::Unpaid,
            "incomplete" => Self::Incomplete,
            "incomplete_expired" => Self::IncompleteExpired,
            "paused" => Self::Paused,
            unknown => {
                tracing::warn!(%unknown, "Unknown subscription status, treating as incomplete");
                Self::Incomplete
            }
        }
    }
}
