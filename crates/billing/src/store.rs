//! Local cache of provider-side billing state
//!
//! One `billing_customers` row per account. The Stripe customer id is written
//! once; the subscription columns are only ever overwritten from a provider
//! fetch (see [`crate::sync`]).

use async_trait::async_trait;
use launchkit_shared::AccountId;
use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::error::BillingResult;
use crate::provider::SubscriptionSnapshot;

/// Cached billing state for one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct CustomerRecord {
    pub account_id: AccountId,
    pub stripe_customer_id: Option<String>,
    pub subscription_status: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub current_period_end: Option<OffsetDateTime>,
    pub price_id: Option<String>,
}

impl CustomerRecord {
    /// A freshly created row: no provider customer, no subscription
    pub fn new(account_id: AccountId) -> Self {
        Self {
            account_id,
            stripe_customer_id: None,
            subscription_status: None,
            current_period_end: None,
            price_id: None,
        }
    }

    pub fn has_subscription(&self) -> bool {
        self.subscription_status.is_some()
    }

    pub fn subscription_fields(&self) -> SubscriptionFields {
        SubscriptionFields {
            status: self.subscription_status.clone(),
            price_id: self.price_id.clone(),
            current_period_end: self.current_period_end,
        }
    }
}

/// The three cached subscription columns, always written together
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionFields {
    pub status: Option<String>,
    pub price_id: Option<String>,
    pub current_period_end: Option<OffsetDateTime>,
}

impl SubscriptionFields {
    /// "No active subscription"
    pub fn cleared() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: &SubscriptionSnapshot) -> Self {
        Self {
            status: Some(snapshot.status.clone()),
            price_id: snapshot.price_id.clone(),
            current_period_end: period_end_from_unix(snapshot.current_period_end),
        }
    }
}

/// Provider timestamps are unix seconds; 0 means the provider sent none
pub fn period_end_from_unix(seconds: i64) -> Option<OffsetDateTime> {
    if seconds <= 0 {
        return None;
    }
    OffsetDateTime::from_unix_timestamp(seconds).ok()
}

/// A record joined with its account, for the admin listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct BillingCustomerSummary {
    pub account_id: AccountId,
    pub email: String,
    pub stripe_customer_id: Option<String>,
    pub subscription_status: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub current_period_end: Option<OffsetDateTime>,
    pub price_id: Option<String>,
}

/// Persistence for [`CustomerRecord`]s
#[async_trait]
pub trait CustomerStore: Send + Sync {
    /// Return the account's record, inserting an empty one if none exists.
    /// Concurrent callers end up with the same row.
    async fn get_or_create(&self, account_id: AccountId) -> BillingResult<CustomerRecord>;

    async fn find_by_account(&self, account_id: AccountId) -> BillingResult<Option<CustomerRecord>>;

    async fn find_by_stripe_customer_id(&self, customer_id: &str) -> BillingResult<Option<CustomerRecord>>;

    /// Set the Stripe customer id only if the record has none yet.
    /// Returns `false` when another id was already in place.
    async fn assign_stripe_customer_id(&self, account_id: AccountId, customer_id: &str) -> BillingResult<bool>;

    /// Overwrite all three subscription columns
    async fn update_subscription(&self, account_id: AccountId, fields: &SubscriptionFields) -> BillingResult<()>;

    /// Records with their account email, newest first. `query` is a
    /// case-insensitive substring of email, customer id or price id.
    async fn list_customers(&self, query: Option<&str>, limit: i64) -> BillingResult<Vec<BillingCustomerSummary>>;
}

/// Postgres-backed store
#[derive(Clone)]
pub struct PgCustomerStore {
    pool: PgPool,
}

impl PgCustomerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CustomerStore for PgCustomerStore {
    async fn get_or_create(&self, account_id: AccountId) -> BillingResult<CustomerRecord> {
        sqlx::query(
            "INSERT INTO billing_customers (account_id) VALUES ($1) ON CONFLICT (account_id) DO NOTHING",
        )
        .bind(account_id)
        .execute(&self.pool)
        .await?;

        let record: CustomerRecord = sqlx::query_as(
            r#"
            SELECT account_id, stripe_customer_id, subscription_status, current_period_end, price_id
            FROM billing_customers
            WHERE account_id = $1
            "#,
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn find_by_account(&self, account_id: AccountId) -> BillingResult<Option<CustomerRecord>> {
        let record: Option<CustomerRecord> = sqlx::query_as(
            r#"
            SELECT account_id, stripe_customer_id, subscription_status, current_period_end, price_id
            FROM billing_customers
            WHERE account_id = $1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn find_by_stripe_customer_id(&self, customer_id: &str) -> BillingResult<Option<CustomerRecord>> {
        let record: Option<CustomerRecord> = sqlx::query_as(
            r#"
            SELECT account_id, stripe_customer_id, subscription_status, current_period_end, price_id
            FROM billing_customers
            WHERE stripe_customer_id = $1
            "#,
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn assign_stripe_customer_id(&self, account_id: AccountId, customer_id: &str) -> BillingResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE billing_customers
            SET stripe_customer_id = $2, updated_at = NOW()
            WHERE account_id = $1 AND stripe_customer_id IS NULL
            "#,
        )
        .bind(account_id)
        .bind(customer_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_subscription(&self, account_id: AccountId, fields: &SubscriptionFields) -> BillingResult<()> {
        sqlx::query(
            r#"
            UPDATE billing_customers
            SET subscription_status = $2,
                price_id = $3,
                current_period_end = $4,
                updated_at = NOW()
            WHERE account_id = $1
            "#,
        )
        .bind(account_id)
        .bind(fields.status.as_deref())
        .bind(fields.price_id.as_deref())
        .bind(fields.current_period_end)
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            account_id = %account_id,
            status = ?fields.status,
            price_id = ?fields.price_id,
            "Updated cached subscription"
        );

        Ok(())
    }

    async fn list_customers(&self, query: Option<&str>, limit: i64) -> BillingResult<Vec<BillingCustomerSummary>> {
        let pattern = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(|q| format!("%{}%", escape_like(q)));

        let rows: Vec<BillingCustomerSummary> = sqlx::query_as(
            r#"
            SELECT bc.account_id, a.email, bc.stripe_customer_id, bc.subscription_status,
                   bc.current_period_end, bc.price_id
            FROM billing_customers bc
            JOIN accounts a ON a.id = bc.account_id
            WHERE $1::text IS NULL
               OR a.email ILIKE $1
               OR bc.stripe_customer_id ILIKE $1
               OR bc.price_id ILIKE $1
            ORDER BY bc.updated_at DESC
            LIMIT $2
            "#,
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

/// Escape LIKE wildcards so user input only matches literally
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
