//! Subscription reconciliation
//!
//! Overwrites the cached subscription columns with what Stripe reports. The
//! local copy is never computed, only copied from the last successful fetch.

use std::sync::Arc;

use launchkit_shared::AccountId;

use crate::error::BillingResult;
use crate::provider::BillingProvider;
use crate::store::{CustomerStore, SubscriptionFields};

/// What a reconcile call did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The event carried no customer id
    NoCustomerId,
    /// No local record is linked to the customer
    UnknownCustomer,
    /// No subscription id: the cached subscription was cleared
    Cleared { account_id: AccountId },
    /// The cached subscription now mirrors Stripe
    Updated { account_id: AccountId, status: String },
    /// Stripe could not be reached or refused; nothing was written
    FetchFailed { account_id: AccountId, error: String },
}

#[derive(Clone)]
pub struct SubscriptionSync {
    provider: Arc<dyn BillingProvider>,
    store: Arc<dyn CustomerStore>,
}

impl SubscriptionSync {
    pub fn new(provider: Arc<dyn BillingProvider>, store: Arc<dyn CustomerStore>) -> Self {
        Self { provider, store }
    }

    /// Refresh the cached subscription of the account linked to `customer_id`.
    ///
    /// Only store failures are errors; a failed Stripe fetch is reported as
    /// [`ReconcileOutcome::FetchFailed`] and leaves the record untouched.
    pub async fn reconcile(
        &self,
        customer_id: Option<&str>,
        subscription_id: Option<&str>,
    ) -> BillingResult<ReconcileOutcome> {
        let Some(customer_id) = customer_id.filter(|id| !id.is_empty()) else {
            return Ok(ReconcileOutcome::NoCustomerId);
        };

        let Some(record) = self.store.find_by_stripe_customer_id(customer_id).await? else {
            tracing::debug!(customer_id = %customer_id, "No local record for Stripe customer");
            return Ok(ReconcileOutcome::UnknownCustomer);
        };
        let account_id = record.account_id;

        let Some(subscription_id) = subscription_id.filter(|id| !id.is_empty()) else {
            self.store
                .update_subscription(account_id, &SubscriptionFields::cleared())
                .await?;
            tracing::info!(account_id = %account_id, customer_id = %customer_id, "Cleared cached subscription");
            return Ok(ReconcileOutcome::Cleared { account_id });
        };

        let snapshot = match self.provider.retrieve_subscription(subscription_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(
                    account_id = %account_id,
                    subscription_id = %subscription_id,
                    error = %e,
                    "Failed to fetch subscription, keeping cached state"
                );
                return Ok(ReconcileOutcome::FetchFailed {
                    account_id,
                    error: e.to_string(),
                });
            }
        };

        let fields = SubscriptionFields::from_snapshot(&snapshot);
        self.store.update_subscription(account_id, &fields).await?;

        tracing::info!(
            account_id = %account_id,
            subscription_id = %subscription_id,
            status = %snapshot.status,
            price_id = ?snapshot.price_id,
            "Synced subscription from Stripe"
        );

        Ok(ReconcileOutcome::Updated {
            account_id,
            status: snapshot.status,
        })
    }
}
