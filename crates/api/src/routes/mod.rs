//! API routes

pub mod admin;
pub mod billing;
pub mod health;

#[cfg(test)]
mod router_tests;

use axum::{
    http::{header::LOCATION, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Router,
};

use crate::{
    auth::{require_admin, require_auth},
    routing::require_known_host,
    state::AppState,
};

/// Anything not routed goes back to the plan list
async fn redirect_home() -> impl IntoResponse {
    (StatusCode::FOUND, [(LOCATION, "/")])
}

/// Create all API routes
pub fn create_router(state: AppState) -> Router {
    let auth_state = state.auth_state();

    // Health check routes (outside host routing; probes hit the bare IP)
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    // Account billing routes
    let account_routes = Router::new()
        .route("/", get(billing::plans))
        .route("/subscribe/", post(billing::subscribe))
        .route("/portal/", post(billing::portal))
        .route("/status-fragment/", get(billing::status_fragment))
        .route_layer(middleware::from_fn_with_state(auth_state.clone(), require_auth));

    // Admin routes; require_admin runs after require_auth
    let admin_routes = Router::new()
        .route("/admin/billing-customers", get(admin::list_billing_customers))
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth));

    // Stripe authenticates with the payload signature
    let webhook_routes = Router::new().route("/webhook/", post(billing::webhook));

    let app_routes = Router::new()
        .merge(account_routes)
        .merge(admin_routes)
        .merge(webhook_routes)
        .fallback(redirect_home)
        .layer(middleware::from_fn_with_state(
            state.host_policy.clone(),
            require_known_host,
        ));

    Router::new()
        .merge(health_routes)
        .merge(app_routes)
        .with_state(state)
}
