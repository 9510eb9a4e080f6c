//! Stripe customer provisioning

use std::sync::Arc;

use launchkit_shared::AccountId;

use crate::error::{BillingError, BillingResult};
use crate::provider::{BillingProvider, NewCustomer};
use crate::store::{CustomerRecord, CustomerStore};

/// Customer service for linking accounts to Stripe customers
#[derive(Clone)]
pub struct CustomerService {
    provider: Arc<dyn BillingProvider>,
    store: Arc<dyn CustomerStore>,
}

impl CustomerService {
    pub fn new(provider: Arc<dyn BillingProvider>, store: Arc<dyn CustomerStore>) -> Self {
        Self { provider, store }
    }

    /// Return the account's record with a Stripe customer id, creating the
    /// row and the Stripe customer on first use.
    pub async fn get_or_create_customer(
        &self,
        account_id: AccountId,
        email: Option<&str>,
    ) -> BillingResult<(CustomerRecord, String)> {
        let record = self.store.get_or_create(account_id).await?;

        if let Some(customer_id) = record.stripe_customer_id.clone() {
            return Ok((record, customer_id));
        }

        let customer_id = self
            .provider
            .create_customer(NewCustomer { account_id, email })
            .await?;

        if self.store.assign_stripe_customer_id(account_id, &customer_id).await? {
            tracing::info!(
                account_id = %account_id,
                customer_id = %customer_id,
                "Linked Stripe customer to account"
            );
            let mut record = record;
            record.stripe_customer_id = Some(customer_id.clone());
            return Ok((record, customer_id));
        }

        // A concurrent request linked a customer first; use theirs
        let record = self.store.get_or_create(account_id).await?;
        match record.stripe_customer_id.clone() {
            Some(existing) => {
                tracing::warn!(
                    account_id = %account_id,
                    orphaned_customer_id = %customer_id,
                    customer_id = %existing,
                    "Stripe customer already linked, discarding the one just created"
                );
                Ok((record, existing))
            }
            None => Err(BillingError::CustomerNotFound(account_id.to_string())),
        }
    }
}
