//! Plan list built from the configured Stripe prices

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::client::StripeConfig;
use crate::provider::{BillingProvider, PlanPrice};

/// A configured price with its display text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    #[serde(flatten)]
    pub price: PlanPrice,
    pub label: Option<String>,
    pub description: Option<String>,
}

/// Everything the plan page needs
#[derive(Debug, Clone, Serialize)]
pub struct PlanList {
    pub publishable_key: String,
    pub plans: Vec<Plan>,
    pub plan_labels: BTreeMap<String, String>,
    pub plan_descriptions: BTreeMap<String, String>,
}

#[derive(Clone)]
pub struct PlanCatalog {
    provider: Arc<dyn BillingProvider>,
    config: StripeConfig,
}

impl PlanCatalog {
    pub fn new(provider: Arc<dyn BillingProvider>, config: StripeConfig) -> Self {
        Self { provider, config }
    }

    /// Resolve every configured price id, in configured order. Prices Stripe
    /// rejects are left out.
    pub async fn list_plans(&self) -> PlanList {
        let mut plans = Vec::with_capacity(self.config.price_ids.len());

        for price_id in &self.config.price_ids {
            match self.provider.retrieve_price(price_id).await {
                Ok(price) => plans.push(Plan {
                    label: self.config.label_for_price(price_id).map(str::to_string),
                    description: self.config.description_for_price(price_id).map(str::to_string),
                    price,
                }),
                Err(e) => {
                    tracing::warn!(price_id = %price_id, error = %e, "Skipping price Stripe could not resolve");
                }
            }
        }

        PlanList {
            publishable_key: self.config.publishable_key.clone(),
            plans,
            plan_labels: self.config.plan_labels.clone(),
            plan_descriptions: self.config.plan_descriptions.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{plan_price, MockProvider};

    fn config(price_ids: &[&str]) -> StripeConfig {
        StripeConfig {
            secret_key: "sk_test_123".to_string(),
            publishable_key: "pk_test_123".to_string(),
            webhook_secret: None,
            allow_unsigned_webhooks: false,
            price_ids: price_ids.iter().map(|s| s.to_string()).collect(),
            plan_labels: BTreeMap::from([("price_pro".to_string(), "Pro".to_string())]),
            plan_descriptions: BTreeMap::from([("price_pro".to_string(), "For teams".to_string())]),
            app_base_url: "https://www.example.com".to_string(),
        }
    }

    #[tokio::test]
    async fn test_rejected_price_is_skipped() {
        let provider = Arc::new(
            MockProvider::new()
                .with_price(plan_price("price_basic", "Basic", 900))
                .with_price(plan_price("price_pro", "Pro", 2900)),
        );
        let catalog = PlanCatalog::new(provider, config(&["price_basic", "price_gone", "price_pro"]));

        let list = catalog.list_plans().await;

        let ids: Vec<&str> = list.plans.iter().map(|p| p.price.id.as_str()).collect();
        assert_eq!(ids, vec!["price_basic", "price_pro"]);
        assert_eq!(list.publishable_key, "pk_test_123");
    }

    #[tokio::test]
    async fn test_plans_carry_configured_text() {
        let provider = Arc::new(MockProvider::new().with_price(plan_price("price_pro", "Pro", 2900)));
        let catalog = PlanCatalog::new(provider, config(&["price_pro"]));

        let list = catalog.list_plans().await;
        let plan = &list.plans[0];
        assert_eq!(plan.label.as_deref(), Some("Pro"));
        assert_eq!(plan.description.as_deref(), Some("For teams"));

        let json = serde_json::to_value(plan).unwrap();
        assert_eq!(json["id"], "price_pro");
        assert_eq!(json["unit_amount"], 2900);
        assert_eq!(json["interval"], "month");
    }

    #[tokio::test]
    async fn test_no_configured_prices() {
        let catalog = PlanCatalog::new(Arc::new(MockProvider::new()), config(&[]));
        assert!(catalog.list_plans().await.plans.is_empty());
    }
}
