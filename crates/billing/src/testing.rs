//! In-memory store and scripted provider for tests
//!
//! Enabled for this crate's own tests and, through the `test-support`
//! feature, for downstream crates that drive the billing flow end to end.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use launchkit_shared::AccountId;

use crate::error::{BillingError, BillingResult};
use crate::provider::{
    BillingProvider, CheckoutRequest, HostedSession, NewCustomer, PlanPrice, PortalRequest,
    SubscriptionSnapshot,
};
use crate::store::{BillingCustomerSummary, CustomerRecord, CustomerStore, SubscriptionFields};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
struct StoreState {
    records: HashMap<AccountId, CustomerRecord>,
    emails: HashMap<AccountId, String>,
    writes: usize,
    fail_writes: bool,
}

/// [`CustomerStore`] over a `HashMap`, counting every write
#[derive(Default)]
pub struct InMemoryCustomerStore {
    state: Mutex<StoreState>,
}

impl InMemoryCustomerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account email so the admin listing can join on it
    pub fn add_account(&self, account_id: AccountId, email: &str) {
        lock(&self.state).emails.insert(account_id, email.to_string());
    }

    /// Seed a record directly, bypassing the write counter
    pub fn insert(&self, record: CustomerRecord) {
        lock(&self.state).records.insert(record.account_id, record);
    }

    pub fn get(&self, account_id: AccountId) -> Option<CustomerRecord> {
        lock(&self.state).records.get(&account_id).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.state).records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of mutating calls that changed or created a row
    pub fn writes(&self) -> usize {
        lock(&self.state).writes
    }

    /// Make every subsequent write fail with a database error
    pub fn set_fail_writes(&self, fail: bool) {
        lock(&self.state).fail_writes = fail;
    }
}

#[async_trait]
impl CustomerStore for InMemoryCustomerStore {
    async fn get_or_create(&self, account_id: AccountId) -> BillingResult<CustomerRecord> {
        let mut state = lock(&self.state);
        if let Some(record) = state.records.get(&account_id) {
            return Ok(record.clone());
        }
        if state.fail_writes {
            return Err(BillingError::Database("write refused".to_string()));
        }
        let record = CustomerRecord::new(account_id);
        state.records.insert(account_id, record.clone());
        state.writes += 1;
        Ok(record)
    }

    async fn find_by_account(&self, account_id: AccountId) -> BillingResult<Option<CustomerRecord>> {
        Ok(self.get(account_id))
    }

    async fn find_by_stripe_customer_id(&self, customer_id: &str) -> BillingResult<Option<CustomerRecord>> {
        Ok(lock(&self.state)
            .records
            .values()
            .find(|r| r.stripe_customer_id.as_deref() == Some(customer_id))
            .cloned())
    }

    async fn assign_stripe_customer_id(&self, account_id: AccountId, customer_id: &str) -> BillingResult<bool> {
        let mut state = lock(&self.state);
        if state.fail_writes {
            return Err(BillingError::Database("write refused".to_string()));
        }
        let Some(record) = state.records.get_mut(&account_id) else {
            return Ok(false);
        };
        if record.stripe_customer_id.is_some() {
            return Ok(false);
        }
        record.stripe_customer_id = Some(customer_id.to_string());
        state.writes += 1;
        Ok(true)
    }

    async fn update_subscription(&self, account_id: AccountId, fields: &SubscriptionFields) -> BillingResult<()> {
        let mut state = lock(&self.state);
        if state.fail_writes {
            return Err(BillingError::Database("write refused".to_string()));
        }
        if let Some(record) = state.records.get_mut(&account_id) {
            record.subscription_status = fields.status.clone();
            record.price_id = fields.price_id.clone();
            record.current_period_end = fields.current_period_end;
            state.writes += 1;
        }
        Ok(())
    }

    async fn list_customers(&self, query: Option<&str>, limit: i64) -> BillingResult<Vec<BillingCustomerSummary>> {
        let state = lock(&self.state);
        let needle = query.map(|q| q.trim().to_lowercase()).filter(|q| !q.is_empty());
        let matches = |value: Option<&str>| match (&needle, value) {
            (Some(n), Some(v)) => v.to_lowercase().contains(n.as_str()),
            _ => false,
        };

        let mut rows: Vec<BillingCustomerSummary> = state
            .records
            .values()
            .filter_map(|record| {
                let email = state.emails.get(&record.account_id)?;
                let hit = needle.is_none()
                    || matches(Some(email))
                    || matches(record.stripe_customer_id.as_deref())
                    || matches(record.price_id.as_deref());
                hit.then(|| BillingCustomerSummary {
                    account_id: record.account_id,
                    email: email.clone(),
                    stripe_customer_id: record.stripe_customer_id.clone(),
                    subscription_status: record.subscription_status.clone(),
                    current_period_end: record.current_period_end,
                    price_id: record.price_id.clone(),
                })
            })
            .collect();

        rows.sort_by(|a, b| a.email.cmp(&b.email));
        rows.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(rows)
    }
}

/// Provider calls that can be scripted to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockCall {
    CreateCustomer,
    RetrievePrice,
    CreateCheckoutSession,
    CreatePortalSession,
    RetrieveSubscription,
}

/// A checkout request as the mock received it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCheckout {
    pub account_id: AccountId,
    pub customer_id: String,
    pub price_id: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Default)]
struct ProviderState {
    prices: HashMap<String, PlanPrice>,
    subscriptions: HashMap<String, SubscriptionSnapshot>,
    failures: HashMap<MockCall, String>,
    customers: Vec<(AccountId, Option<String>)>,
    subscription_fetches: usize,
    checkouts: Vec<RecordedCheckout>,
    portal_return_urls: Vec<String>,
}

/// Scripted [`BillingProvider`]. Unknown prices and subscriptions fail the
/// way Stripe does, with a "No such ..." message.
#[derive(Default)]
pub struct MockProvider {
    state: Mutex<ProviderState>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(self, price: PlanPrice) -> Self {
        lock(&self.state).prices.insert(price.id.clone(), price);
        self
    }

    pub fn with_subscription(self, subscription: SubscriptionSnapshot) -> Self {
        lock(&self.state)
            .subscriptions
            .insert(subscription.id.clone(), subscription);
        self
    }

    /// Fail every call of `call` with `message` as the provider message
    pub fn failing(self, call: MockCall, message: &str) -> Self {
        lock(&self.state).failures.insert(call, message.to_string());
        self
    }

    pub fn customers_created(&self) -> usize {
        lock(&self.state).customers.len()
    }

    /// Email each created customer was given, in creation order
    pub fn customer_emails(&self) -> Vec<Option<String>> {
        lock(&self.state)
            .customers
            .iter()
            .map(|(_, email)| email.clone())
            .collect()
    }

    pub fn subscription_fetches(&self) -> usize {
        lock(&self.state).subscription_fetches
    }

    pub fn checkouts(&self) -> Vec<RecordedCheckout> {
        lock(&self.state).checkouts.clone()
    }

    pub fn portal_return_urls(&self) -> Vec<String> {
        lock(&self.state).portal_return_urls.clone()
    }

    fn check(&self, call: MockCall) -> BillingResult<()> {
        match lock(&self.state).failures.get(&call) {
            Some(message) => Err(BillingError::Provider(message.clone())),
            None => Ok(()),
        }
    }
}

/// A monthly USD price with a product attached
pub fn plan_price(id: &str, product_name: &str, unit_amount: i64) -> PlanPrice {
    PlanPrice {
        id: id.to_string(),
        nickname: None,
        product_name: Some(product_name.to_string()),
        product_description: None,
        unit_amount: Some(unit_amount),
        currency: Some("usd".to_string()),
        interval: Some("month".to_string()),
        interval_count: Some(1),
    }
}

/// An active subscription on `price_id`
pub fn active_subscription(id: &str, customer_id: &str, price_id: &str, period_end: i64) -> SubscriptionSnapshot {
    SubscriptionSnapshot {
        id: id.to_string(),
        customer_id: Some(customer_id.to_string()),
        status: "active".to_string(),
        price_id: Some(price_id.to_string()),
        current_period_end: period_end,
    }
}

#[async_trait]
impl BillingProvider for MockProvider {
    async fn create_customer(&self, customer: NewCustomer<'_>) -> BillingResult<String> {
        self.check(MockCall::CreateCustomer)?;
        let mut state = lock(&self.state);
        state
            .customers
            .push((customer.account_id, customer.email.map(str::to_string)));
        Ok(format!("cus_mock_{}", state.customers.len()))
    }

    async fn retrieve_price(&self, price_id: &str) -> BillingResult<PlanPrice> {
        self.check(MockCall::RetrievePrice)?;
        lock(&self.state)
            .prices
            .get(price_id)
            .cloned()
            .ok_or_else(|| BillingError::Provider(format!("No such price: '{price_id}'")))
    }

    async fn create_checkout_session(&self, request: CheckoutRequest<'_>) -> BillingResult<HostedSession> {
        self.check(MockCall::CreateCheckoutSession)?;
        let mut state = lock(&self.state);
        state.checkouts.push(RecordedCheckout {
            account_id: request.account_id,
            customer_id: request.customer_id.to_string(),
            price_id: request.price_id.to_string(),
            success_url: request.success_url.to_string(),
            cancel_url: request.cancel_url.to_string(),
        });
        let id = format!("cs_mock_{}", state.checkouts.len());
        Ok(HostedSession {
            url: format!("https://checkout.stripe.test/c/{id}"),
            id,
        })
    }

    async fn create_portal_session(&self, request: PortalRequest<'_>) -> BillingResult<HostedSession> {
        self.check(MockCall::CreatePortalSession)?;
        let mut state = lock(&self.state);
        state.portal_return_urls.push(request.return_url.to_string());
        let id = format!("bps_mock_{}", state.portal_return_urls.len());
        Ok(HostedSession {
            url: format!("https://billing.stripe.test/p/{id}"),
            id,
        })
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> BillingResult<SubscriptionSnapshot> {
        lock(&self.state).subscription_fetches += 1;
        self.check(MockCall::RetrieveSubscription)?;
        lock(&self.state)
            .subscriptions
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| BillingError::Provider(format!("No such subscription: '{subscription_id}'")))
    }
}
