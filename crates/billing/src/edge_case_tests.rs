// Test file - these are expected patterns in test code
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

//! Edge Case Tests for Webhook Reconciliation
//!
//! Exercises the webhook handler end to end against fake collaborators:
//! - Signature gate (no state change on tampered deliveries)
//! - Identity resolution (metadata id, payload email, customer lookup,
//!   deleted customers)
//! - State application (grant/revoke semantics, idempotent redelivery,
//!   invoice gating on subscription status)
//! - Error propagation (database failures surface for provider retry)

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{BillingError, BillingResult};
use crate::events::BillingEvent;
use crate::provider::{BillingProvider, CustomerProfile};
use crate::store::{UserKey, UserStore};
use crate::webhooks::WebhookHandler;
use casegen_shared::SubscriptionStatus;

#[derive(Debug, Clone, PartialEq)]
struct FakeUser {
    id: Uuid,
    email: String,
    is_pro: Option<bool>,
    generation_count: Option<i32>,
    stripe_customer_id: Option<String>,
}

#[derive(Default)]
struct FakeStore {
    users: Mutex<Vec<FakeUser>>,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl FakeStore {
    fn with_users(users: Vec<FakeUser>) -> Arc<Self> {
        Arc::new(Self {
            users: Mutex::new(users),
            ..Self::default()
        })
    }

    fn user(&self, id: Uuid) -> FakeUser {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .expect("user exists")
    }

    fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_failure(&self) -> BillingResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(BillingError::Database("connection reset".to_string()))
        } else {
            Ok(())
        }
    }
}

fn matches_key(user: &FakeUser, key: &UserKey) -> bool {
    match key {
        UserKey::Id(id) => user.id == *id,
        UserKey::Email(email) => user.email == *email,
    }
}

#[async_trait]
impl UserStore for FakeStore {
    async fn find_by_email(&self, email: &str) -> BillingResult<Option<Uuid>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .map(|u| u.id))
    }

    async fn grant_pro(&self, key: &UserKey, customer_id: Option<&str>) -> BillingResult<u64> {
        self.check_failure()?;
        self.writes.fetch_add(1, Ordering::SeqCst);

        let mut users = self.users.lock().unwrap();
        let mut matched = 0;
        for user in users.iter_mut().filter(|u| matches_key(u, key)) {
            user.is_pro = Some(true);
            user.generation_count = None;
            if let Some(customer_id) = customer_id {
                user.stripe_customer_id = Some(customer_id.to_string());
            }
            matched += 1;
        }
        Ok(matched)
    }

    async fn revoke_pro(&self, key: &UserKey) -> BillingResult<u64> {
        self.check_failure()?;
        self.writes.fetch_add(1, Ordering::SeqCst);

        let mut users = self.users.lock().unwrap();
        let mut matched = 0;
        for user in users.iter_mut().filter(|u| matches_key(u, key)) {
            user.is_pro = Some(false);
            matched += 1;
        }
        Ok(matched)
    }
}

#[derive(Default)]
struct FakeProvider {
    customers: HashMap<String, CustomerProfile>,
    subscriptions: HashMap<String, SubscriptionStatus>,
}

#[async_trait]
impl BillingProvider for FakeProvider {
    async fn fetch_customer(&self, customer_id: &str) -> BillingResult<CustomerProfile> {
        self.customers
            .get(customer_id)
            .cloned()
            .ok_or_else(|| BillingError::Internal(format!("no such customer {}", customer_id)))
    }

    async fn fetch_subscription_status(
        &self,
        subscription_id: &str,
    ) -> BillingResult<SubscriptionStatus> {
        self.subscriptions.get(subscription_id).copied().ok_or_else(|| {
            BillingError::Internal(format!("no such subscription {}", subscription_id))
        })
    }
}

const SECRET: &str = "whsec_test_secret";

fn free_user(email: &str) -> FakeUser {
    FakeUser {
        id: Uuid::new_v4(),
        email: email.to_string(),
        is_pro: None,
        generation_count: Some(2),
        stripe_customer_id: None,
    }
}

fn pro_user(email: &str, customer_id: &str) -> FakeUser {
    FakeUser {
        id: Uuid::new_v4(),
        email: email.to_string(),
        is_pro: Some(true),
        generation_count: None,
        stripe_customer_id: Some(customer_id.to_string()),
    }
}

fn handler(store: Arc<FakeStore>, provider: FakeProvider) -> WebhookHandler {
    WebhookHandler::with_parts(SECRET, Arc::new(provider), store)
}

fn event(json: &str) -> BillingEvent {
    BillingEvent::parse(json.as_bytes()).expect("test payload parses")
}

// =========================================================================
// Signature gate: tampered deliveries never reach the store
// =========================================================================
#[tokio::test]
async fn tampered_signature_never_touches_the_store() {
    let store = FakeStore::with_users(vec![free_user("jo@example.com")]);
    let handler = handler(store.clone(), FakeProvider::default());

    let payload = br#"{
        "id": "evt_1",
        "type": "checkout.session.completed",
        "data": {"object": {"id": "cs_1", "customer_details": {"email": "jo@example.com"}}}
    }"#;
    let signature = crate::webhooks::test_support::sign_payload(
        "whsec_attacker",
        payload,
        crate::webhooks::test_support::now(),
    );

    let result = handler.verify_event(payload, &signature);
    assert!(matches!(result, Err(BillingError::WebhookSignatureInvalid)));
    assert_eq!(store.write_count(), 0, "no write on rejected delivery");
}

// =========================================================================
// Checkout: metadata user id wins over any email also present
// =========================================================================
#[tokio::test]
async fn checkout_with_metadata_user_id_upgrades_exactly_that_user() {
    let target = free_user("target@example.com");
    let bystander = free_user("bystander@example.com");
    let target_id = target.id;
    let bystander_id = bystander.id;

    let store = FakeStore::with_users(vec![target, bystander]);
    let handler = handler(store.clone(), FakeProvider::default());

    let payload = format!(
        r#"{{
            "id": "evt_2",
            "type": "checkout.session.completed",
            "data": {{"object": {{
                "id": "cs_2",
                "customer": "cus_900",
                "customer_details": {{"email": "bystander@example.com"}},
                "metadata": {{"user_id": "{}"}}
            }}}}
        }}"#,
        target_id
    );

    handler.handle_event(event(&payload)).await.unwrap();

    let upgraded = store.user(target_id);
    assert_eq!(upgraded.is_pro, Some(true));
    assert_eq!(upgraded.generation_count, None, "quota cleared on upgrade");
    assert_eq!(upgraded.stripe_customer_id.as_deref(), Some("cus_900"));

    let untouched = store.user(bystander_id);
    assert_eq!(untouched.is_pro, None, "email match must not win over metadata id");
}

// =========================================================================
// Checkout: redelivery of the identical event is a no-op the second time
// =========================================================================
#[tokio::test]
async fn checkout_redelivery_is_idempotent() {
    let user = free_user("jo@example.com");
    let user_id = user.id;
    let store = FakeStore::with_users(vec![user]);
    let handler = handler(store.clone(), FakeProvider::default());

    let payload = r#"{
        "id": "evt_3",
        "type": "checkout.session.completed",
        "data": {"object": {
            "id": "cs_3",
            "customer": "cus_901",
            "customer_details": {"email": "jo@example.com"}
        }}
    }"#;

    handler.handle_event(event(payload)).await.unwrap();
    let after_first = store.user(user_id);

    handler.handle_event(event(payload)).await.unwrap();
    let after_second = store.user(user_id);

    assert_eq!(after_first, after_second);
    assert_eq!(after_second.is_pro, Some(true));
}

// =========================================================================
// Subscription updated: pro mirrors status, in both directions, idempotently
// =========================================================================
#[tokio::test]
async fn subscription_updated_mirrors_status() {
    let user = pro_user("jo@example.com", "cus_456");
    let user_id = user.id;
    let store = FakeStore::with_users(vec![user]);

    let mut provider = FakeProvider::default();
    provider.customers.insert(
        "cus_456".to_string(),
        CustomerProfile {
            email: Some("jo@example.com".to_string()),
            deleted: false,
        },
    );
    let handler = handler(store.clone(), provider);

    let past_due = r#"{
        "id": "evt_4",
        "type": "customer.subscription.updated",
        "data": {"object": {"id": "sub_1", "customer": "cus_456", "status": "past_due"}}
    }"#;

    handler.handle_event(event(past_due)).await.unwrap();
    assert_eq!(store.user(user_id).is_pro, Some(false));

    // Reprocessing the same event yields the same final state
    handler.handle_event(event(past_due)).await.unwrap();
    assert_eq!(store.user(user_id).is_pro, Some(false));

    let active = r#"{
        "id": "evt_5",
        "type": "customer.subscription.updated",
        "data": {"object": {"id": "sub_1", "customer": "cus_456", "status": "active"}}
    }"#;

    handler.handle_event(event(active)).await.unwrap();
    assert_eq!(store.user(user_id).is_pro, Some(true));
}

// =========================================================================
// Subscription deleted: cus_123 -> u_1, pro flips to false
// =========================================================================
#[tokio::test]
async fn subscription_deleted_downgrades_resolved_user() {
    let user = pro_user("u1@example.com", "cus_123");
    let user_id = user.id;
    let store = FakeStore::with_users(vec![user]);

    let mut provider = FakeProvider::default();
    provider.customers.insert(
        "cus_123".to_string(),
        CustomerProfile {
            email: Some("u1@example.com".to_string()),
            deleted: false,
        },
    );
    let handler = handler(store.clone(), provider);

    let payload = r#"{
        "id": "evt_6",
        "type": "customer.subscription.deleted",
        "data": {"object": {"id": "sub_2", "customer": "cus_123"}}
    }"#;

    handler.handle_event(event(payload)).await.unwrap();
    assert_eq!(store.user(user_id).is_pro, Some(false));
}

// =========================================================================
// Invoice paid: a past_due subscription must not re-grant pro
// =========================================================================
#[tokio::test]
async fn invoice_paid_for_past_due_subscription_changes_nothing() {
    let user = free_user("jo@example.com");
    let user_id = user.id;
    let store = FakeStore::with_users(vec![user]);

    let mut provider = FakeProvider::default();
    provider
        .subscriptions
        .insert("sub_789".to_string(), SubscriptionStatus::PastDue);
    let handler = handler(store.clone(), provider);

    let payload = r#"{
        "id": "evt_7",
        "type": "invoice.paid",
        "data": {"object": {"id": "in_1", "customer": "cus_456", "subscription": "sub_789"}}
    }"#;

    handler.handle_event(event(payload)).await.unwrap();
    assert_eq!(store.write_count(), 0);
    assert_eq!(store.user(user_id).is_pro, None);
}

#[tokio::test]
async fn invoice_paid_for_active_subscription_grants_pro() {
    let user = free_user("jo@example.com");
    let user_id = user.id;
    let store = FakeStore::with_users(vec![user]);

    let mut provider = FakeProvider::default();
    provider
        .subscriptions
        .insert("sub_789".to_string(), SubscriptionStatus::Active);
    provider.customers.insert(
        "cus_456".to_string(),
        CustomerProfile {
            email: Some("jo@example.com".to_string()),
            deleted: false,
        },
    );
    let handler = handler(store.clone(), provider);

    let payload = r#"{
        "id": "evt_8",
        "type": "invoice.paid",
        "data": {"object": {"id": "in_2", "customer": "cus_456", "subscription": "sub_789"}}
    }"#;

    handler.handle_event(event(payload)).await.unwrap();
    let granted = store.user(user_id);
    assert_eq!(granted.is_pro, Some(true));
    assert_eq!(granted.generation_count, None);
}

// =========================================================================
// Deleted customer: unresolved, acknowledged, no write
// =========================================================================
#[tokio::test]
async fn deleted_customer_is_acknowledged_without_a_write() {
    let store = FakeStore::with_users(vec![pro_user("jo@example.com", "cus_dead")]);

    let mut provider = FakeProvider::default();
    provider.customers.insert(
        "cus_dead".to_string(),
        CustomerProfile {
            email: Some("jo@example.com".to_string()),
            deleted: true,
        },
    );
    let handler = handler(store.clone(), provider);

    let payload = r#"{
        "id": "evt_9",
        "type": "customer.subscription.deleted",
        "data": {"object": {"id": "sub_3", "customer": "cus_dead"}}
    }"#;

    let result = handler.handle_event(event(payload)).await;
    assert!(result.is_ok(), "unresolved identity still acknowledges");
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn unmatched_customer_email_is_acknowledged_without_a_write() {
    let store = FakeStore::with_users(vec![]);

    let mut provider = FakeProvider::default();
    provider.customers.insert(
        "cus_ghost".to_string(),
        CustomerProfile {
            email: Some("never-signed-up@example.com".to_string()),
            deleted: false,
        },
    );
    let handler = handler(store.clone(), provider);

    let payload = r#"{
        "id": "evt_10",
        "type": "checkout.session.completed",
        "data": {"object": {"id": "cs_4", "customer": "cus_ghost"}}
    }"#;

    let result = handler.handle_event(event(payload)).await;
    assert!(result.is_ok());
    assert_eq!(store.write_count(), 0);
}

// =========================================================================
// Payment failed and unknown event types: observed, never acted on
// =========================================================================
#[tokio::test]
async fn payment_failed_is_observed_only() {
    let user = pro_user("jo@example.com", "cus_456");
    let user_id = user.id;
    let store = FakeStore::with_users(vec![user]);
    let handler = handler(store.clone(), FakeProvider::default());

    let payload = r#"{
        "id": "evt_11",
        "type": "invoice.payment_failed",
        "data": {"object": {"id": "in_3", "customer": "cus_456", "attempt_count": 2}}
    }"#;

    handler.handle_event(event(payload)).await.unwrap();
    assert_eq!(store.write_count(), 0);
    assert_eq!(store.user(user_id).is_pro, Some(true), "no downgrade on failure");
}

#[tokio::test]
async fn unrecognized_event_type_is_acknowledged() {
    let store = FakeStore::with_users(vec![]);
    let handler = handler(store.clone(), FakeProvider::default());

    let payload = r#"{"id": "evt_12", "type": "charge.dispute.created", "data": {"object": {}}}"#;

    let result = handler.handle_event(event(payload)).await;
    assert!(result.is_ok());
    assert_eq!(store.write_count(), 0);
}

// =========================================================================
// Database failure: surfaces as retryable so the provider redelivers
// =========================================================================
#[tokio::test]
async fn database_write_failure_propagates_for_retry() {
    let user = free_user("jo@example.com");
    let store = FakeStore::with_users(vec![user]);
    store.fail_writes.store(true, Ordering::SeqCst);
    let handler = handler(store.clone(), FakeProvider::default());

    let payload = r#"{
        "id": "evt_13",
        "type": "checkout.session.completed",
        "data": {"object": {"id": "cs_5", "customer_details": {"email": "jo@example.com"}}}
    }"#;

    let result = handler.handle_event(event(payload)).await;
    match result {
        Err(err) => assert!(err.is_retryable(), "database errors must trigger redelivery"),
        Ok(()) => panic!("expected a database error"),
    }
}
