//! Stripe Billing Portal

use std::sync::Arc;

use launchkit_shared::AccountId;

use crate::customer::CustomerService;
use crate::error::BillingResult;
use crate::provider::{BillingProvider, HostedSession, PortalRequest};

/// Portal service for Stripe billing portal sessions
#[derive(Clone)]
pub struct PortalService {
    provider: Arc<dyn BillingProvider>,
    customers: CustomerService,
    return_url: String,
}

impl PortalService {
    pub fn new(provider: Arc<dyn BillingProvider>, customers: CustomerService, return_url: String) -> Self {
        Self {
            provider,
            customers,
            return_url,
        }
    }

    /// Create a billing portal session, provisioning the customer if needed
    pub async fn create_portal_session(
        &self,
        account_id: AccountId,
        email: Option<&str>,
    ) -> BillingResult<HostedSession> {
        let (_, customer_id) = self.customers.get_or_create_customer(account_id, email).await?;

        let session = self
            .provider
            .create_portal_session(PortalRequest {
                customer_id: &customer_id,
                return_url: &self.return_url,
            })
            .await?;

        tracing::info!(
            account_id = %account_id,
            customer_id = %customer_id,
            "Created billing portal session"
        );

        Ok(session)
    }
}
