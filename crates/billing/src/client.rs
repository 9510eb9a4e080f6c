//! Stripe client configuration and the live provider implementation

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use stripe::{
    BillingPortalSession, CheckoutSession, CheckoutSessionBillingAddressCollection,
    CheckoutSessionMode, Client, CreateBillingPortalSession, CreateCheckoutSession,
    CreateCheckoutSessionCustomerUpdate, CreateCheckoutSessionCustomerUpdateAddress,
    CreateCheckoutSessionLineItems, CreateCheckoutSessionSubscriptionData, CreateCustomer,
    Customer, CustomerId, Expandable, Price, PriceId, Subscription, SubscriptionId,
};

use crate::error::{BillingError, BillingResult};
use crate::provider::{
    BillingProvider, CheckoutRequest, HostedSession, NewCustomer, PlanPrice, PortalRequest,
    SubscriptionSnapshot,
};

/// Configuration for Stripe billing
#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// Stripe secret API key
    pub secret_key: String,
    /// Publishable key handed to the browser
    pub publishable_key: String,
    /// Webhook signing secret; `None` when not configured
    pub webhook_secret: Option<String>,
    /// Accept unsigned webhook payloads when no secret is configured (development only)
    pub allow_unsigned_webhooks: bool,
    /// Price IDs offered on the plan list, in display order
    pub price_ids: Vec<String>,
    /// Display label per price ID
    pub plan_labels: BTreeMap<String, String>,
    /// Display description per price ID
    pub plan_descriptions: BTreeMap<String, String>,
    /// Base URL for success/cancel/return redirects
    pub app_base_url: String,
}

impl StripeConfig {
    /// Create config from environment variables
    pub fn from_env() -> BillingResult<Self> {
        let secret_key = std::env::var("STRIPE_SECRET_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| BillingError::Config("STRIPE_SECRET_KEY not set".to_string()))?;

        Ok(Self {
            secret_key,
            publishable_key: std::env::var("STRIPE_PUBLISHABLE_KEY").unwrap_or_default(),
            webhook_secret: std::env::var("STRIPE_WEBHOOK_SECRET")
                .ok()
                .filter(|secret| !secret.trim().is_empty()),
            allow_unsigned_webhooks: std::env::var("STRIPE_ALLOW_UNSIGNED_WEBHOOKS")
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            price_ids: parse_price_ids(&std::env::var("STRIPE_PRICE_IDS").unwrap_or_default()),
            plan_labels: parse_plan_text_map(
                "PLAN_LABELS",
                std::env::var("PLAN_LABELS").ok().as_deref(),
            )?,
            plan_descriptions: parse_plan_text_map(
                "PLAN_DESCRIPTIONS",
                std::env::var("PLAN_DESCRIPTIONS").ok().as_deref(),
            )?,
            app_base_url: std::env::var("PUBLIC_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }

    /// Label configured for a price, if any
    pub fn label_for_price(&self, price_id: &str) -> Option<&str> {
        self.plan_labels.get(price_id).map(String::as_str)
    }

    /// Description configured for a price, if any
    pub fn description_for_price(&self, price_id: &str) -> Option<&str> {
        self.plan_descriptions.get(price_id).map(String::as_str)
    }

    /// Absolute URL of the plan list
    pub fn plans_url(&self) -> String {
        format!("{}/", self.app_base_url)
    }
}

/// Split a comma-separated price list, dropping blanks
pub fn parse_price_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a JSON object of price ID -> display text
fn parse_plan_text_map(var: &str, raw: Option<&str>) -> BillingResult<BTreeMap<String, String>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(BTreeMap::new()),
        Some(json) => serde_json::from_str(json)
            .map_err(|e| BillingError::Config(format!("{var} must be a JSON object of strings: {e}"))),
    }
}

/// Stripe billing client
#[derive(Clone)]
pub struct StripeClient {
    client: Client,
}

impl StripeClient {
    /// Create a new Stripe client for the configured secret key
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            client: Client::new(&config.secret_key),
        }
    }
}

#[async_trait]
impl BillingProvider for StripeClient {
    async fn create_customer(&self, customer: NewCustomer<'_>) -> BillingResult<String> {
        let mut metadata = HashMap::new();
        metadata.insert("account_id".to_string(), customer.account_id.to_string());

        let params = CreateCustomer {
            email: customer.email,
            metadata: Some(metadata),
            ..Default::default()
        };

        let created = Customer::create(&self.client, params).await?;

        tracing::info!(
            account_id = %customer.account_id,
            customer_id = %created.id,
            "Created Stripe customer"
        );

        Ok(created.id.to_string())
    }

    async fn retrieve_price(&self, price_id: &str) -> BillingResult<PlanPrice> {
        let id = price_id
            .parse::<PriceId>()
            .map_err(|e| BillingError::Provider(format!("Invalid price ID {price_id}: {e}")))?;

        let price = Price::retrieve(&self.client, &id, &["product"]).await?;

        let (product_name, product_description) = match &price.product {
            Some(Expandable::Object(product)) => (product.name.clone(), product.description.clone()),
            _ => (None, None),
        };

        Ok(PlanPrice {
            id: price.id.to_string(),
            nickname: price.nickname.clone(),
            product_name,
            product_description,
            unit_amount: price.unit_amount,
            currency: price.currency.map(|c| c.to_string()),
            interval: price.recurring.as_ref().map(|r| r.interval.to_string()),
            interval_count: price.recurring.as_ref().map(|r| r.interval_count),
        })
    }

    async fn create_checkout_session(&self, request: CheckoutRequest<'_>) -> BillingResult<HostedSession> {
        let customer_id = request
            .customer_id
            .parse::<CustomerId>()
            .map_err(|e| BillingError::Provider(format!("Invalid customer ID: {e}")))?;

        let mut subscription_metadata = HashMap::new();
        subscription_metadata.insert("account_id".to_string(), request.account_id.to_string());

        let params = CreateCheckoutSession {
            customer: Some(customer_id),
            mode: Some(CheckoutSessionMode::Subscription),
            line_items: Some(vec![CreateCheckoutSessionLineItems {
                price: Some(request.price_id.to_string()),
                quantity: Some(1),
                ..Default::default()
            }]),
            success_url: Some(request.success_url),
            cancel_url: Some(request.cancel_url),
            allow_promotion_codes: Some(true),
            billing_address_collection: Some(CheckoutSessionBillingAddressCollection::Auto),
            customer_update: Some(CreateCheckoutSessionCustomerUpdate {
                address: Some(CreateCheckoutSessionCustomerUpdateAddress::Auto),
                ..Default::default()
            }),
            subscription_data: Some(CreateCheckoutSessionSubscriptionData {
                metadata: Some(subscription_metadata),
                ..Default::default()
            }),
            ..Default::default()
        };

        let session = CheckoutSession::create(&self.client, params).await?;
        let url = session
            .url
            .ok_or_else(|| BillingError::Provider("Checkout session was created without a URL".to_string()))?;

        Ok(HostedSession {
            id: session.id.to_string(),
            url,
        })
    }

    async fn create_portal_session(&self, request: PortalRequest<'_>) -> BillingResult<HostedSession> {
        let customer_id = request
            .customer_id
            .parse::<CustomerId>()
            .map_err(|e| BillingError::Provider(format!("Invalid customer ID: {e}")))?;

        let mut params = CreateBillingPortalSession::new(customer_id);
        params.return_url = Some(request.return_url);

        let session = BillingPortalSession::create(&self.client, params).await?;

        Ok(HostedSession {
            id: session.id.to_string(),
            url: session.url,
        })
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> BillingResult<SubscriptionSnapshot> {
        let id = subscription_id
            .parse::<SubscriptionId>()
            .map_err(|e| BillingError::Provider(format!("Invalid subscription ID: {e}")))?;

        let subscription = Subscription::retrieve(&self.client, &id, &["items.data.price"]).await?;

        Ok(snapshot_from_subscription(&subscription))
    }
}

fn snapshot_from_subscription(subscription: &Subscription) -> SubscriptionSnapshot {
    let customer_id = match &subscription.customer {
        Expandable::Id(id) => id.to_string(),
        Expandable::Object(customer) => customer.id.to_string(),
    };

    let price_id = subscription
        .items
        .data
        .first()
        .and_then(|item| item.price.as_ref())
        .map(|p| p.id.to_string());

    SubscriptionSnapshot {
        id: subscription.id.to_string(),
        customer_id: Some(customer_id),
        status: subscription.status.to_string(),
        price_id,
        current_period_end: subscription.current_period_end,
    }
}
