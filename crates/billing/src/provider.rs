//! Provider seam
//!
//! Every call the billing flow makes to the payments provider goes through
//! [`BillingProvider`]. The live implementation is [`crate::StripeClient`];
//! tests plug in a scripted provider instead.

use async_trait::async_trait;
use launchkit_shared::AccountId;
use serde::Serialize;

use crate::error::BillingResult;

/// Parameters for provisioning a provider-side customer
#[derive(Debug, Clone)]
pub struct NewCustomer<'a> {
    pub account_id: AccountId,
    pub email: Option<&'a str>,
}

/// Parameters for a hosted subscription checkout
#[derive(Debug, Clone)]
pub struct CheckoutRequest<'a> {
    pub account_id: AccountId,
    pub customer_id: &'a str,
    pub price_id: &'a str,
    pub success_url: &'a str,
    pub cancel_url: &'a str,
}

/// Parameters for a hosted self-service portal session
#[derive(Debug, Clone)]
pub struct PortalRequest<'a> {
    pub customer_id: &'a str,
    pub return_url: &'a str,
}

/// A provider-hosted page the user should be sent to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedSession {
    pub id: String,
    pub url: String,
}

/// A price as the plan list shows it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanPrice {
    pub id: String,
    pub nickname: Option<String>,
    pub product_name: Option<String>,
    pub product_description: Option<String>,
    pub unit_amount: Option<i64>,
    pub currency: Option<String>,
    pub interval: Option<String>,
    pub interval_count: Option<u64>,
}

/// The slice of a provider subscription the local cache mirrors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionSnapshot {
    pub id: String,
    pub customer_id: Option<String>,
    pub status: String,
    /// Price of the first line item, if the subscription has any items
    pub price_id: Option<String>,
    /// Unix seconds; 0 when the provider did not report one
    pub current_period_end: i64,
}

/// Calls into the hosted payments provider.
///
/// Every method makes exactly one attempt; failures come back as
/// [`crate::BillingError::Provider`].
#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Create a customer and return its provider id
    async fn create_customer(&self, customer: NewCustomer<'_>) -> BillingResult<String>;

    /// Retrieve a price with its product expanded
    async fn retrieve_price(&self, price_id: &str) -> BillingResult<PlanPrice>;

    /// Create a hosted checkout session in subscription mode
    async fn create_checkout_session(&self, request: CheckoutRequest<'_>) -> BillingResult<HostedSession>;

    /// Create a hosted billing portal session
    async fn create_portal_session(&self, request: PortalRequest<'_>) -> BillingResult<HostedSession>;

    /// Retrieve a subscription with its line item prices expanded
    async fn retrieve_subscription(&self, subscription_id: &str) -> BillingResult<SubscriptionSnapshot>;
}
