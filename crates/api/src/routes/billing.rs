//! Billing routes for Stripe integration

use axum::{
    body::Bytes,
    extract::{Extension, Form, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use launchkit_billing::{CustomerRecord, HostedSession, PlanList};
use serde::{Deserialize, Serialize};

use crate::{auth::AuthUser, error::ApiError, state::AppState};

/// Header htmx follows for client-side redirects
pub const HX_REDIRECT: &str = "HX-Redirect";

/// Form body of `POST /subscribe/`
#[derive(Debug, Deserialize)]
pub struct SubscribeForm {
    #[serde(default)]
    pub price_id: Option<String>,
}

/// Cached subscription of the current account
#[derive(Debug, Serialize)]
pub struct SubscriptionStatusView {
    pub has_subscription: bool,
    pub customer: Option<CustomerRecord>,
}

fn hx_redirect(session: HostedSession) -> Response {
    (StatusCode::NO_CONTENT, [(HX_REDIRECT, session.url)]).into_response()
}

/// Plan list
pub async fn plans(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<PlanList>, ApiError> {
    let billing = state.billing()?;
    let list = billing.plans.list_plans().await;

    tracing::debug!(
        account_id = %user.account_id,
        plans = list.plans.len(),
        "Rendered plan list"
    );

    Ok(Json(list))
}

/// Start a hosted checkout for the selected price
pub async fn subscribe(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    form: Option<Form<SubscribeForm>>,
) -> Result<Response, ApiError> {
    let billing = state.billing()?;

    let price_id = form
        .and_then(|Form(form)| form.price_id)
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing price_id".to_string()))?;

    let session = billing
        .checkout
        .create_subscription_checkout(user.account_id, Some(&user.email), &price_id)
        .await?;

    Ok(hx_redirect(session))
}

/// Open the hosted billing portal
pub async fn portal(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Response, ApiError> {
    let billing = state.billing()?;

    let session = billing
        .portal
        .create_portal_session(user.account_id, Some(&user.email))
        .await?;

    Ok(hx_redirect(session))
}

/// Cached subscription state; never calls Stripe
pub async fn status_fragment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<SubscriptionStatusView>, ApiError> {
    let billing = state.billing()?;
    let customer = billing.store.find_by_account(user.account_id).await?;

    Ok(Json(SubscriptionStatusView {
        has_subscription: customer.as_ref().is_some_and(CustomerRecord::has_subscription),
        customer,
    }))
}

/// Stripe webhook receiver. 403 unless authenticated (always 403 while
/// billing is not configured), 200 otherwise.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    tracing::info!(body_len = body.len(), "Stripe webhook received");

    // Without billing there is no secret to authenticate against
    let billing = state.billing.as_deref().ok_or_else(|| {
        tracing::warn!("Stripe webhook rejected: billing is not configured");
        ApiError::InvalidSignature
    })?;

    let payload = std::str::from_utf8(&body).map_err(|_| {
        tracing::warn!("Stripe webhook body is not UTF-8");
        ApiError::InvalidSignature
    })?;

    let signature = headers.get("stripe-signature").and_then(|v| v.to_str().ok());

    let event = billing.webhooks.verify_event(payload, signature).map_err(|e| {
        tracing::warn!(error = %e, "Stripe webhook rejected");
        ApiError::from(e)
    })?;

    tracing::info!(
        event_type = %event.event_type,
        event_id = %event.id,
        "Stripe webhook event verified"
    );

    // Stripe only needs to know the event arrived; local failures are ours to fix
    match billing.webhooks.handle_event(&event).await {
        Ok(outcome) => {
            tracing::info!(event_id = %event.id, outcome = ?outcome, "Stripe webhook processed");
        }
        Err(e) => {
            tracing::error!(event_id = %event.id, error = %e, "Webhook handling error");
        }
    }

    Ok(StatusCode::OK)
}
