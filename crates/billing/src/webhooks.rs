//! Stripe webhook handling
//!
//! Verifies inbound webhook deliveries, parses them into typed events, and
//! reconciles the user's pro entitlement with the billing provider's state.
//! Every write is an idempotent overwrite, so redelivery is safe; out-of-order
//! delivery is an accepted limitation and is not defended against here.

use std::sync::Arc;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use sqlx::PgPool;
use uuid::Uuid;

use crate::client::StripeClient;
use crate::error::{BillingError, BillingResult};
use crate::events::{BillingEvent, EventKind, SubscriptionState};
use crate::provider::{BillingProvider, StripeGateway};
use crate::store::{PgUserStore, UserKey, UserStore};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed payload before it is rejected as a replay.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Webhook handler for Stripe events.
///
/// Stateless per delivery: verification, identity resolution, and the state
/// write all happen within one invocation, and the provider's own redelivery
/// is the only retry path.
pub struct WebhookHandler {
    webhook_secret: String,
    provider: Arc<dyn BillingProvider>,
    store: Arc<dyn UserStore>,
}

impl WebhookHandler {
    pub fn new(stripe: StripeClient, pool: PgPool) -> Self {
        let webhook_secret = stripe.config().webhook_secret.clone();
        Self {
            webhook_secret,
            provider: Arc::new(StripeGateway::new(stripe)),
            store: Arc::new(PgUserStore::new(pool)),
        }
    }

    /// Construct with explicit collaborators. Used by tests to swap in fakes.
    pub fn with_parts(
        webhook_secret: impl Into<String>,
        provider: Arc<dyn BillingProvider>,
        store: Arc<dyn UserStore>,
    ) -> Self {
        Self {
            webhook_secret: webhook_secret.into(),
            provider,
            store,
        }
    }

    /// Verify the signature header against the raw request body and parse
    /// the verified payload into a typed event.
    ///
    /// The body must be the exact bytes Stripe sent; the signature is
    /// computed over them. Fails closed: any missing or malformed header
    /// component rejects the delivery before anything is parsed.
    pub fn verify_event(&self, payload: &[u8], signature: &str) -> BillingResult<BillingEvent> {
        self.verify_signature(payload, signature, unix_now())?;
        BillingEvent::parse(payload)
    }

    fn verify_signature(&self, payload: &[u8], signature: &str, now: i64) -> BillingResult<()> {
        // Header format: t=<timestamp>,v1=<signature>[,v0=<signature>]
        let mut timestamp: Option<i64> = None;
        let mut v1_signature: Option<&str> = None;

        for part in signature.split(',') {
            match part.splitn(2, '=').collect::<Vec<_>>()[..] {
                ["t", value] => timestamp = value.parse().ok(),
                ["v1", value] => v1_signature = Some(value),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or_else(|| {
            tracing::warn!("Missing timestamp in signature header");
            BillingError::WebhookSignatureInvalid
        })?;
        let v1_signature = v1_signature.ok_or_else(|| {
            tracing::warn!("Missing v1 signature in signature header");
            BillingError::WebhookSignatureInvalid
        })?;

        if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
            tracing::warn!(
                timestamp,
                now,
                diff = (now - timestamp).abs(),
                "Webhook timestamp outside tolerance"
            );
            return Err(BillingError::WebhookSignatureInvalid);
        }

        let computed = compute_signature(&self.webhook_secret, payload, timestamp)?;
        if computed != v1_signature {
            tracing::warn!("Webhook signature mismatch");
            return Err(BillingError::WebhookSignatureInvalid);
        }

        Ok(())
    }

    /// Handle a verified event.
    ///
    /// Returns `Ok(())` both for applied state changes and for deliberate
    /// no-ops (unmatched users, ignored event types) so the provider stops
    /// redelivering; only genuine processing failures propagate.
    pub async fn handle_event(&self, event: BillingEvent) -> BillingResult<()> {
        let event_id = event.id;

        match event.kind {
            EventKind::CheckoutCompleted {
                session_id,
                customer,
                customer_email,
                metadata_user_id,
            } => {
                self.handle_checkout_completed(
                    &event_id,
                    &session_id,
                    customer.as_deref(),
                    customer_email.as_deref(),
                    metadata_user_id.as_deref(),
                )
                .await
            }
            EventKind::InvoicePaid {
                invoice_id,
                customer,
                subscription,
            } => {
                self.handle_invoice_paid(
                    &event_id,
                    &invoice_id,
                    customer.as_deref(),
                    subscription.as_deref(),
                )
                .await
            }
            EventKind::SubscriptionCreated(state) | EventKind::SubscriptionUpdated(state) => {
                self.handle_subscription_state(&event_id, state).await
            }
            EventKind::SubscriptionDeleted {
                subscription_id,
                customer,
                metadata_user_id,
            } => {
                self.handle_subscription_deleted(
                    &event_id,
                    &subscription_id,
                    customer.as_deref(),
                    metadata_user_id.as_deref(),
                )
                .await
            }
            EventKind::PaymentFailed {
                invoice_id,
                customer,
                attempt_count,
            } => {
                // Observed only: no downgrade-on-first-failure policy. The
                // authoritative downgrade arrives as a subscription event.
                tracing::warn!(
                    event_id = %event_id,
                    invoice_id = %invoice_id,
                    customer = ?customer,
                    attempt_count,
                    "Invoice payment failed"
                );
                Ok(())
            }
            EventKind::Ignored { event_type } => {
                tracing::info!(
                    event_id = %event_id,
                    event_type = %event_type,
                    "Ignoring unhandled webhook event type"
                );
                Ok(())
            }
        }
    }

    async fn handle_checkout_completed(
        &self,
        event_id: &str,
        session_id: &str,
        customer: Option<&str>,
        customer_email: Option<&str>,
        metadata_user_id: Option<&str>,
    ) -> BillingResult<()> {
        let Some(key) = self
            .resolve_identity(metadata_user_id, customer_email, customer)
            .await?
        else {
            tracing::warn!(
                event_id = %event_id,
                session_id = %session_id,
                "Checkout completed but no user could be resolved"
            );
            return Ok(());
        };

        let matched = self.store.grant_pro(&key, customer).await?;
        if matched == 0 {
            tracing::warn!(
                event_id = %event_id,
                user = %key,
                "Checkout completed but the update matched no user row"
            );
        } else {
            tracing::info!(
                event_id = %event_id,
                session_id = %session_id,
                user = %key,
                "User upgraded to pro after checkout"
            );
        }

        Ok(())
    }

    async fn handle_invoice_paid(
        &self,
        event_id: &str,
        invoice_id: &str,
        customer: Option<&str>,
        subscription: Option<&str>,
    ) -> BillingResult<()> {
        // A paid invoice only confirms entitlement while the underlying
        // subscription is live. A renewal invoice for a past_due or
        // canceled subscription must not re-grant pro.
        if let Some(subscription_id) = subscription {
            let status = self
                .provider
                .fetch_subscription_status(subscription_id)
                .await?;
            if !status.entitles_pro() {
                tracing::info!(
                    event_id = %event_id,
                    invoice_id = %invoice_id,
                    subscription_id = %subscription_id,
                    status = ?status,
                    "Invoice paid but subscription is not live, no state change"
                );
                return Ok(());
            }
        }

        let Some(key) = self.resolve_identity(None, None, customer).await? else {
            tracing::warn!(
                event_id = %event_id,
                invoice_id = %invoice_id,
                "Invoice paid but no user could be resolved"
            );
            return Ok(());
        };

        let matched = self.store.grant_pro(&key, customer).await?;
        tracing::info!(
            event_id = %event_id,
            invoice_id = %invoice_id,
            user = %key,
            matched,
            "Pro entitlement confirmed after invoice payment"
        );

        Ok(())
    }

    async fn handle_subscription_state(
        &self,
        event_id: &str,
        state: SubscriptionState,
    ) -> BillingResult<()> {
        let Some(key) = self
            .resolve_identity(
                state.metadata_user_id.as_deref(),
                None,
                state.customer.as_deref(),
            )
            .await?
        else {
            tracing::warn!(
                event_id = %event_id,
                subscription_id = %state.subscription_id,
                "Subscription event but no user could be resolved"
            );
            return Ok(());
        };

        // The incoming status is authoritative and absolute: pro mirrors
        // the provider's own subscription state, in both directions.
        let matched = if state.status.entitles_pro() {
            self.store
                .grant_pro(&key, state.customer.as_deref())
                .await?
        } else {
            self.store.revoke_pro(&key).await?
        };

        tracing::info!(
            event_id = %event_id,
            subscription_id = %state.subscription_id,
            user = %key,
            status = ?state.status,
            pro = state.status.entitles_pro(),
            matched,
            "Subscription state mirrored to user"
        );

        Ok(())
    }

    async fn handle_subscription_deleted(
        &self,
        event_id: &str,
        subscription_id: &str,
        customer: Option<&str>,
        metadata_user_id: Option<&str>,
    ) -> BillingResult<()> {
        let Some(key) = self
            .resolve_identity(metadata_user_id, None, customer)
            .await?
        else {
            tracing::warn!(
                event_id = %event_id,
                subscription_id = %subscription_id,
                "Subscription deleted but no user could be resolved"
            );
            return Ok(());
        };

        let matched = self.store.revoke_pro(&key).await?;
        tracing::info!(
            event_id = %event_id,
            subscription_id = %subscription_id,
            user = %key,
            matched,
            "User downgraded after subscription deletion"
        );

        Ok(())
    }

    /// Map event references to an internal user key.
    ///
    /// Priority: explicit internal id in metadata, then an email carried in
    /// the payload itself, then a customer lookup against the provider. A
    /// miss is a recoverable condition (test events, customers who never
    /// finished signup) and resolves to `None` rather than an error.
    async fn resolve_identity(
        &self,
        metadata_user_id: Option<&str>,
        payload_email: Option<&str>,
        customer: Option<&str>,
    ) -> BillingResult<Option<UserKey>> {
        if let Some(raw) = metadata_user_id {
            match Uuid::parse_str(raw) {
                Ok(id) => return Ok(Some(UserKey::Id(id))),
                Err(_) => {
                    tracing::warn!(user_id = %raw, "Malformed user_id in event metadata");
                }
            }
        }

        if let Some(email) = payload_email {
            return Ok(Some(UserKey::Email(email.to_string())));
        }

        let Some(customer_id) = customer else {
            return Ok(None);
        };

        let profile = self.provider.fetch_customer(customer_id).await?;
        if profile.deleted {
            tracing::warn!(customer_id = %customer_id, "Customer is deleted at the provider");
            return Ok(None);
        }
        let Some(email) = profile.email else {
            tracing::warn!(customer_id = %customer_id, "Customer has no email at the provider");
            return Ok(None);
        };

        match self.store.find_by_email(&email).await? {
            Some(id) => Ok(Some(UserKey::Id(id))),
            None => {
                tracing::warn!(customer_id = %customer_id, "No user matches the customer email");
                Ok(None)
            }
        }
    }
}

fn compute_signature(secret: &str, payload: &[u8], timestamp: i64) -> BillingResult<String> {
    // The secret's "whsec_" prefix is not part of the signing key.
    let key = secret.strip_prefix("whsec_").unwrap_or(secret);

    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).map_err(|_| {
        tracing::error!("Invalid webhook secret key");
        BillingError::WebhookSignatureInvalid
    })?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn unix_now() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

#[cfg(test)]
pub(crate) mod test_support {
    #![allow(clippy::unwrap_used)]

    /// Produce a valid `stripe-signature` header for a test payload.
    pub fn sign_payload(secret: &str, payload: &[u8], timestamp: i64) -> String {
        let signature = super::compute_signature(secret, payload, timestamp).unwrap();
        format!("t={},v1={}", timestamp, signature)
    }

    pub fn now() -> i64 {
        super::unix_now()
    }
}
