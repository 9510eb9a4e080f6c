//! Admin routes: billing customer listing

use axum::{
    extract::{Extension, Query, State},
    Json,
};
use launchkit_billing::BillingCustomerSummary;
use serde::{Deserialize, Serialize};

use crate::{auth::AuthUser, error::ApiResult, state::AppState};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct ListBillingCustomersQuery {
    /// Case-insensitive search over email, Stripe customer id and price id
    pub q: Option<String>,
    pub limit: Option<i64>,
}

impl ListBillingCustomersQuery {
    fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

#[derive(Debug, Serialize)]
pub struct BillingCustomerListResponse {
    pub customers: Vec<BillingCustomerSummary>,
    pub limit: i64,
}

/// List billing customers (admin only)
pub async fn list_billing_customers(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Query(query): Query<ListBillingCustomersQuery>,
) -> ApiResult<Json<BillingCustomerListResponse>> {
    let billing = state.billing()?;
    let limit = query.effective_limit();

    let customers = billing
        .store
        .list_customers(query.q.as_deref(), limit)
        .await?;

    tracing::info!(
        admin_id = %admin.account_id,
        query = ?query.q,
        count = customers.len(),
        "Admin listed billing customers"
    );

    Ok(Json(BillingCustomerListResponse { customers, limit }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(limit: Option<i64>) -> ListBillingCustomersQuery {
        ListBillingCustomersQuery { q: None, limit }
    }

    #[test]
    fn test_limit_defaults_and_clamps() {
        assert_eq!(query(None).effective_limit(), 50);
        assert_eq!(query(Some(0)).effective_limit(), 1);
        assert_eq!(query(Some(10)).effective_limit(), 10);
        assert_eq!(query(Some(5_000)).effective_limit(), 200);
    }
}
