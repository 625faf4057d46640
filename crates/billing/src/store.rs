//! User billing-state persistence
//!
//! The reconciler only ever touches a user's billing fields, and every
//! write is an absolute overwrite keyed by a stable identifier, which is
//! what makes webhook redelivery safe.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::BillingResult;

/// Stable key for addressing a user row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserKey {
    Id(Uuid),
    Email(String),
}

impl std::fmt::Display for UserKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id={}", id),
            Self::Email(email) => write!(f, "email={}", email),
        }
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look up a live (non-deleted) user by exact email match.
    async fn find_by_email(&self, email: &str) -> BillingResult<Option<Uuid>>;

    /// Set pro entitlement, clear the free-quota counter, and record the
    /// billing customer reference when one is supplied.
    ///
    /// Returns the number of rows matched so callers can log unmatched
    /// updates.
    async fn grant_pro(&self, key: &UserKey, customer_id: Option<&str>) -> BillingResult<u64>;

    /// Remove pro entitlement. The quota counter is left untouched.
    async fn revoke_pro(&self, key: &UserKey) -> BillingResult<u64>;
}

/// PostgreSQL-backed user store.
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> BillingResult<Option<Uuid>> {
        let row: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM users WHERE email = $1 AND is_deleted = FALSE")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(id,)| id))
    }

    async fn grant_pro(&self, key: &UserKey, customer_id: Option<&str>) -> BillingResult<u64> {
        // COALESCE keeps an already-recorded customer reference when the
        // event does not carry one.
        let result = match key {
            UserKey::Id(id) => {
                sqlx::query(
                    r#"
                    UPDATE users
                    SET is_pro = TRUE,
                        generation_count = NULL,
                        stripe_customer_id = COALESCE($2, stripe_customer_id),
                        updated_at = NOW()
                    WHERE id = $1 AND is_deleted = FALSE
                    "#,
                )
                .bind(id)
                .bind(customer_id)
                .execute(&self.pool)
                .await?
            }
            UserKey::Email(email) => {
                sqlx::query(
                    r#"
                    UPDATE users
                    SET is_pro = TRUE,
                        generation_count = NULL,
                        stripe_customer_id = COALESCE($2, stripe_customer_id),
                        updated_at = NOW()
                    WHERE email = $1 AND is_deleted = FALSE
                    "#,
                )
                .bind(email)
                .bind(customer_id)
                .execute(&self.pool)
                .await?
            }
        };

        Ok(result.rows_affected())
    }

    async fn revoke_pro(&self, key: &UserKey) -> BillingResult<u64> {
        let result = match key {
            UserKey::Id(id) => {
                sqlx::query(
                    r#"
                    UPDATE users
                    SET is_pro = FALSE, updated_at = NOW()
                    WHERE id = $1 AND is_deleted = FALSE
                    "#,
                )
                .bind(id)
                .execute(&self.pool)
                .await?
            }
            UserKey::Email(email) => {
                sqlx::query(
                    r#"
                    UPDATE users
                    SET is_pro = FALSE, updated_at = NOW()
                    WHERE email = $1 AND is_deleted = FALSE
                    "#,
                )
                .bind(email)
                .execute(&self.pool)
                .await?
            }
        };

        Ok(result.rows_affected())
    }
}
