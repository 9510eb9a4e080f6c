//! Stripe Checkout sessions

use std::sync::Arc;

use launchkit_shared::AccountId;

use crate::customer::CustomerService;
use crate::error::{BillingError, BillingResult};
use crate::provider::{BillingProvider, CheckoutRequest, HostedSession};

/// Checkout service for creating Stripe checkout sessions
#[derive(Clone)]
pub struct CheckoutService {
    provider: Arc<dyn BillingProvider>,
    customers: CustomerService,
    plans_url: String,
}

impl CheckoutService {
    pub fn new(provider: Arc<dyn BillingProvider>, customers: CustomerService, plans_url: String) -> Self {
        Self {
            provider,
            customers,
            plans_url,
        }
    }

    pub fn success_url(&self) -> String {
        format!("{}?checkout=success", self.plans_url)
    }

    pub fn cancel_url(&self) -> String {
        format!("{}?checkout=cancel", self.plans_url)
    }

    /// Create a checkout session for a new subscription to `price_id`
    pub async fn create_subscription_checkout(
        &self,
        account_id: AccountId,
        email: Option<&str>,
        price_id: &str,
    ) -> BillingResult<HostedSession> {
        let price_id = price_id.trim();
        if price_id.is_empty() {
            return Err(BillingError::InvalidInput("price_id is required".to_string()));
        }

        let (_, customer_id) = self.customers.get_or_create_customer(account_id, email).await?;

        let success_url = self.success_url();
        let cancel_url = self.cancel_url();
        let session = self
            .provider
            .create_checkout_session(CheckoutRequest {
                account_id,
                customer_id: &customer_id,
                price_id,
                success_url: &success_url,
                cancel_url: &cancel_url,
            })
            .await
            .inspect_err(|e| {
                tracing::warn!(
                    account_id = %account_id,
                    price_id = %price_id,
                    error = %e,
                    "Stripe rejected checkout session"
                );
            })?;

        tracing::info!(
            account_id = %account_id,
            customer_id = %customer_id,
            session_id = %session.id,
            price_id = %price_id,
            "Created subscription checkout session"
        );

        Ok(session)
    }
}
