//! Typed billing events
//!
//! Webhook payloads arrive as one nested JSON shape interpreted differently
//! per event type. Parsing them into a tagged union up front keeps the
//! dispatcher an exhaustive match instead of a stringly-typed fallthrough.

use serde_json::Value;

use crate::error::{BillingError, BillingResult};
use casegen_shared::SubscriptionStatus;

/// A verified, parsed webhook delivery.
#[derive(Debug, Clone)]
pub struct BillingEvent {
    /// Provider-assigned idempotency identifier (`evt_...`).
    pub id: String,
    pub kind: EventKind,
}

/// Event payload, keyed by the provider's event type string.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// `checkout.session.completed`
    CheckoutCompleted {
        session_id: String,
        customer: Option<String>,
        customer_email: Option<String>,
        metadata_user_id: Option<String>,
    },
    /// `invoice.paid`
    InvoicePaid {
        invoice_id: String,
        customer: Option<String>,
        subscription: Option<String>,
    },
    /// `customer.subscription.created`
    SubscriptionCreated(SubscriptionState),
    /// `customer.subscription.updated`
    SubscriptionUpdated(SubscriptionState),
    /// `customer.subscription.deleted`
    SubscriptionDeleted {
        subscription_id: String,
        customer: Option<String>,
        metadata_user_id: Option<String>,
    },
    /// `invoice.payment_failed`
    PaymentFailed {
        invoice_id: String,
        customer: Option<String>,
        attempt_count: i64,
    },
    /// Any other event type: acknowledged, never acted on.
    Ignored { event_type: String },
}

/// Snapshot of a subscription carried by created/updated events.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionState {
    pub subscription_id: String,
    pub customer: Option<String>,
    pub status: SubscriptionStatus,
    pub metadata_user_id: Option<String>,
}

impl BillingEvent {
    /// Parse a verified webhook body.
    ///
    /// Only the fields the reconciler acts on are extracted; everything
    /// else in the payload is ignored. Unrecognized event types parse to
    /// `EventKind::Ignored` rather than failing.
    pub fn parse(payload: &[u8]) -> BillingResult<Self> {
        let value: Value = serde_json::from_slice(payload)
            .map_err(|e| BillingError::WebhookPayloadInvalid(e.to_string()))?;

        let id = value["id"].as_str().unwrap_or_default().to_string();
        let event_type = value["type"]
            .as_str()
            .ok_or_else(|| BillingError::WebhookPayloadInvalid("missing event type".into()))?;
        let object = &value["data"]["object"];

        let kind = match event_type {
            "checkout.session.completed" => EventKind::CheckoutCompleted {
                session_id: require_str(object, "id")?,
                customer: opt_str(&object["customer"]),
                customer_email: opt_str(&object["customer_details"]["email"]),
                metadata_user_id: opt_str(&object["metadata"]["user_id"]),
            },
            "invoice.paid" => EventKind::InvoicePaid {
                invoice_id: require_str(object, "id")?,
                customer: opt_str(&object["customer"]),
                subscription: opt_str(&object["subscription"]),
            },
            "customer.subscription.created" => {
                EventKind::SubscriptionCreated(parse_subscription_state(object)?)
            }
            "customer.subscription.updated" => {
                EventKind::SubscriptionUpdated(parse_subscription_state(object)?)
            }
            "customer.subscription.deleted" => EventKind::SubscriptionDeleted {
                subscription_id: require_str(object, "id")?,
                customer: opt_str(&object["customer"]),
                metadata_user_id: opt_str(&object["metadata"]["user_id"]),
            },
            "invoice.payment_failed" => EventKind::PaymentFailed {
                invoice_id: require_str(object, "id")?,
                customer: opt_str(&object["customer"]),
                attempt_count: object["attempt_count"].as_i64().unwrap_or(0),
            },
            other => EventKind::Ignored {
                event_type: other.to_string(),
            },
        };

        Ok(Self { id, kind })
    }
}

fn parse_subscription_state(object: &Value) -> BillingResult<SubscriptionState> {
    Ok(SubscriptionState {
        subscription_id: require_str(object, "id")?,
        customer: opt_str(&object["customer"]),
        status: SubscriptionStatus::from_provider(object["status"].as_str().unwrap_or_default()),
        metadata_user_id: opt_str(&object["metadata"]["user_id"]),
    })
}

fn require_str(object: &Value, field: &str) -> BillingResult<String> {
    object[field]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| BillingError::WebhookPayloadInvalid(format!("missing object {}", field)))
}

fn opt_str(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}
