//! Stripe webhook handling
//!
//! Verifies the `Stripe-Signature` header and routes subscription lifecycle
//! events to [`SubscriptionSync`]. Signature verification is done by hand so
//! that signed and (development-only) unsigned payloads parse into the same
//! [`WebhookEvent`] type.

use std::sync::Arc;

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{BillingError, BillingResult};
use crate::provider::BillingProvider;
use crate::sync::{ReconcileOutcome, SubscriptionSync};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed payload, in seconds
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// The envelope of a Stripe event. `data.object` is kept as raw JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: WebhookEventData,
    #[serde(default)]
    pub created: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookEventData {
    #[serde(default)]
    pub object: serde_json::Value,
}

impl WebhookEvent {
    /// Read an id-valued field of `data.object`, whether Stripe sent the bare
    /// id or an expanded object
    pub fn object_id_field(&self, field: &str) -> Option<&str> {
        id_of(self.data.object.get(field)?)
    }
}

fn id_of(value: &serde_json::Value) -> Option<&str> {
    match value {
        serde_json::Value::String(id) if !id.is_empty() => Some(id.as_str()),
        serde_json::Value::Object(map) => map.get("id").and_then(serde_json::Value::as_str),
        _ => None,
    }
}

/// What the handler did with an authenticated event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Reconciled(ReconcileOutcome),
    /// `invoice.payment_failed` for an invoice with no subscription
    InvoiceWithoutSubscription,
    /// `invoice.payment_failed` whose subscription could not be fetched
    SubscriptionUnavailable { error: String },
    Ignored,
}

struct SignatureParts<'a> {
    timestamp: i64,
    signatures: Vec<&'a str>,
}

fn parse_signature_header(header: &str) -> BillingResult<SignatureParts<'_>> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        tracing::warn!("Missing timestamp in signature header");
        BillingError::WebhookSignatureInvalid
    })?;

    if signatures.is_empty() {
        tracing::warn!("Missing v1 signature in signature header");
        return Err(BillingError::WebhookSignatureInvalid);
    }

    Ok(SignatureParts { timestamp, signatures })
}

/// Hex HMAC-SHA256 of `"{timestamp}.{payload}"`, as Stripe signs it
pub fn compute_signature(secret: &str, timestamp: i64, payload: &str) -> BillingResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| BillingError::Config("Invalid webhook secret".to_string()))?;
    mac.update(format!("{timestamp}.{payload}").as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn unix_now() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

/// Webhook handler for Stripe events
#[derive(Clone)]
pub struct WebhookHandler {
    provider: Arc<dyn BillingProvider>,
    sync: SubscriptionSync,
    webhook_secret: Option<String>,
    allow_unsigned: bool,
}

impl WebhookHandler {
    pub fn new(
        provider: Arc<dyn BillingProvider>,
        sync: SubscriptionSync,
        webhook_secret: Option<String>,
        allow_unsigned: bool,
    ) -> Self {
        match (&webhook_secret, allow_unsigned) {
            (Some(_), _) => {}
            (None, true) => tracing::warn!(
                "STRIPE_WEBHOOK_SECRET is not set and unsigned webhooks are allowed; do not run this in production"
            ),
            (None, false) => tracing::warn!(
                "STRIPE_WEBHOOK_SECRET is not set; all webhooks will be rejected"
            ),
        }

        Self {
            provider,
            sync,
            webhook_secret,
            allow_unsigned,
        }
    }

    /// Authenticate and parse a webhook payload
    pub fn verify_event(&self, payload: &str, signature: Option<&str>) -> BillingResult<WebhookEvent> {
        self.verify_event_at(payload, signature, unix_now())
    }

    fn verify_event_at(&self, payload: &str, signature: Option<&str>, now: i64) -> BillingResult<WebhookEvent> {
        match &self.webhook_secret {
            Some(secret) => {
                let header = signature.ok_or_else(|| {
                    tracing::warn!("Webhook without Stripe-Signature header");
                    BillingError::WebhookSignatureInvalid
                })?;
                let parts = parse_signature_header(header)?;

                let outside_tolerance = now
                    .checked_sub(parts.timestamp)
                    .map_or(true, |age| age.unsigned_abs() > SIGNATURE_TOLERANCE_SECS.unsigned_abs());
                if outside_tolerance {
                    tracing::warn!(
                        timestamp = parts.timestamp,
                        now = now,
                        "Webhook timestamp outside tolerance"
                    );
                    return Err(BillingError::WebhookSignatureInvalid);
                }

                let expected = compute_signature(secret, parts.timestamp, payload)?;
                let matched = parts
                    .signatures
                    .iter()
                    .any(|sig| bool::from(expected.as_bytes().ct_eq(sig.as_bytes())));
                if !matched {
                    tracing::warn!("Webhook signature mismatch");
                    return Err(BillingError::WebhookSignatureInvalid);
                }
            }
            None if self.allow_unsigned => {
                tracing::debug!("Accepting unsigned webhook");
            }
            None => return Err(BillingError::UnsignedWebhookRejected),
        }

        serde_json::from_str(payload).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse webhook payload");
            BillingError::WebhookPayloadInvalid(e.to_string())
        })
    }

    /// Handle an authenticated event. Only store failures are errors.
    pub async fn handle_event(&self, event: &WebhookEvent) -> BillingResult<WebhookOutcome> {
        tracing::info!(event_id = %event.id, event_type = %event.event_type, "Processing Stripe webhook");

        let outcome = match event.event_type.as_str() {
            "checkout.session.completed" => WebhookOutcome::Reconciled(
                self.sync
                    .reconcile(event.object_id_field("customer"), event.object_id_field("subscription"))
                    .await?,
            ),
            "customer.subscription.created"
            | "customer.subscription.updated"
            | "customer.subscription.deleted" => WebhookOutcome::Reconciled(
                self.sync
                    .reconcile(event.object_id_field("customer"), event.object_id_field("id"))
                    .await?,
            ),
            "invoice.payment_failed" => self.handle_payment_failed(event).await?,
            other => {
                tracing::debug!(event_type = %other, "Unhandled webhook event type");
                WebhookOutcome::Ignored
            }
        };

        Ok(outcome)
    }

    async fn handle_payment_failed(&self, event: &WebhookEvent) -> BillingResult<WebhookOutcome> {
        let subscription_id = event.object_id_field("subscription").or_else(|| {
            // Newer API versions move it under the invoice's parent
            event
                .data
                .object
                .pointer("/parent/subscription_details/subscription")
                .and_then(id_of)
        });

        let Some(subscription_id) = subscription_id else {
            return Ok(WebhookOutcome::InvoiceWithoutSubscription);
        };

        let subscription = match self.provider.retrieve_subscription(subscription_id).await {
            Ok(subscription) => subscription,
            Err(e) => {
                tracing::warn!(
                    subscription_id = %subscription_id,
                    error = %e,
                    "Could not fetch subscription for failed invoice"
                );
                return Ok(WebhookOutcome::SubscriptionUnavailable { error: e.to_string() });
            }
        };

        let outcome = self
            .sync
            .reconcile(subscription.customer_id.as_deref(), Some(&subscription.id))
            .await?;
        Ok(WebhookOutcome::Reconciled(outcome))
    }
}
