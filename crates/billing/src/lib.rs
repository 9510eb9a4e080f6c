// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Launchkit Billing Module
//!
//! Stripe-hosted subscription billing for local accounts.
//!
//! ## Features
//!
//! - **Customers**: Lazily link each account to one Stripe customer
//! - **Checkout**: Hosted checkout sessions in subscription mode
//! - **Portal**: Hosted billing portal sessions
//! - **Plans**: Resolve the configured prices for the plan list
//! - **Webhooks**: Verify Stripe events and mirror subscription state locally

pub mod checkout;
pub mod client;
pub mod customer;
pub mod error;
pub mod plans;
pub mod portal;
pub mod provider;
pub mod store;
pub mod sync;
pub mod webhooks;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

// Checkout
pub use checkout::CheckoutService;

// Client
pub use client::{StripeClient, StripeConfig};

// Customer
pub use customer::CustomerService;

// Error
pub use error::{BillingError, BillingResult};

// Plans
pub use plans::{Plan, PlanCatalog, PlanList};

// Portal
pub use portal::PortalService;

// Provider
pub use provider::{BillingProvider, HostedSession, PlanPrice, SubscriptionSnapshot};

// Store
pub use store::{BillingCustomerSummary, CustomerRecord, CustomerStore, PgCustomerStore, SubscriptionFields};

// Sync
pub use sync::{ReconcileOutcome, SubscriptionSync};

// Webhooks
pub use webhooks::{WebhookEvent, WebhookHandler, WebhookOutcome};

use std::sync::Arc;

use sqlx::PgPool;

/// Main billing service that combines all billing functionality
#[derive(Clone)]
pub struct BillingService {
    pub checkout: CheckoutService,
    pub customer: CustomerService,
    pub plans: PlanCatalog,
    pub portal: PortalService,
    pub store: Arc<dyn CustomerStore>,
    pub sync: SubscriptionSync,
    pub webhooks: WebhookHandler,
    config: StripeConfig,
}

impl BillingService {
    /// Create a new billing service from environment variables
    pub fn from_env(pool: PgPool) -> BillingResult<Self> {
        let config = StripeConfig::from_env()?;
        Ok(Self::new(config, pool))
    }

    /// Create a new billing service with explicit config
    pub fn new(config: StripeConfig, pool: PgPool) -> Self {
        let stripe = StripeClient::new(&config);
        Self::with_parts(config, Arc::new(stripe), Arc::new(PgCustomerStore::new(pool)))
    }

    /// Wire the services over any provider and store
    pub fn with_parts(
        config: StripeConfig,
        provider: Arc<dyn BillingProvider>,
        store: Arc<dyn CustomerStore>,
    ) -> Self {
        let plans_url = config.plans_url();
        let customer = CustomerService::new(provider.clone(), store.clone());
        let sync = SubscriptionSync::new(provider.clone(), store.clone());

        Self {
            checkout: CheckoutService::new(provider.clone(), customer.clone(), plans_url.clone()),
            portal: PortalService::new(provider.clone(), customer.clone(), plans_url),
            plans: PlanCatalog::new(provider.clone(), config.clone()),
            webhooks: WebhookHandler::new(
                provider,
                sync.clone(),
                config.webhook_secret.clone(),
                config.allow_unsigned_webhooks,
            ),
            customer,
            store,
            sync,
            config,
        }
    }

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }
}
