use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use launchkit_billing::{
    testing::{active_subscription, plan_price, InMemoryCustomerStore, MockCall, MockProvider},
    webhooks::compute_signature,
    BillingService, CustomerRecord, StripeConfig,
};
use launchkit_shared::{AccountId, AccountRole};
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

use super::create_router;
use crate::{config::Config, state::AppState};

const HOST: &str = "www.example.com";
const WEBHOOK_SECRET: &str = "whsec_router_tests";
const JWT_SECRET: &str = "router-test-secret-at-least-32-chars";

struct TestApp {
    router: Router,
    state: AppState,
    store: Arc<InMemoryCustomerStore>,
    provider: Arc<MockProvider>,
}

fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".to_string(),
        public_url: "https://www.example.com".to_string(),
        base_domain: "example.com".to_string(),
        allowed_subdomains: vec!["www".to_string()],
        allowed_origins: vec![],
        database_url: "postgres://localhost/launchkit_test".to_string(),
        database_max_connections: 1,
        jwt_secret: JWT_SECRET.to_string(),
        jwt_expiry_hours: 1,
        enable_billing: true,
    }
}

fn stripe_config() -> StripeConfig {
    StripeConfig {
        secret_key: "sk_test_router".to_string(),
        publishable_key: "pk_test_router".to_string(),
        webhook_secret: Some(WEBHOOK_SECRET.to_string()),
        allow_unsigned_webhooks: false,
        price_ids: vec!["price_basic".to_string(), "price_gone".to_string()],
        plan_labels: [("price_basic".to_string(), "Basic".to_string())].into_iter().collect(),
        plan_descriptions: Default::default(),
        app_base_url: "https://www.example.com".to_string(),
    }
}

fn app_with(provider: MockProvider) -> TestApp {
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://localhost/launchkit_test")
        .unwrap();
    let store = Arc::new(InMemoryCustomerStore::new());
    let provider = Arc::new(provider);
    let billing = BillingService::with_parts(stripe_config(), provider.clone(), store.clone());
    let state = AppState::with_billing(pool, test_config(), Some(Arc::new(billing)));

    TestApp {
        router: create_router(state.clone()),
        state,
        store,
        provider,
    }
}

fn app() -> TestApp {
    app_with(
        MockProvider::new()
            .with_price(plan_price("price_basic", "Basic", 900))
            .with_subscription(active_subscription("sub_1", "cus_1", "price_basic", 1_900_000_000)),
    )
}

fn token(state: &AppState, account_id: AccountId, role: AccountRole) -> String {
    state
        .jwt_manager
        .generate_token(account_id, "ada@example.com", role)
        .unwrap()
}

fn seeded_customer(store: &InMemoryCustomerStore, customer_id: &str) -> AccountId {
    let account_id = AccountId::new();
    let mut record = CustomerRecord::new(account_id);
    record.stripe_customer_id = Some(customer_id.to_string());
    store.insert(record);
    account_id
}

fn signed_webhook(payload: &str) -> Request<Body> {
    let timestamp = time::OffsetDateTime::now_utc().unix_timestamp();
    let signature = compute_signature(WEBHOOK_SECRET, timestamp, payload).unwrap();

    Request::post("/webhook/")
        .header(header::HOST, HOST)
        .header("stripe-signature", format!("t={timestamp},v1={signature}"))
        .body(Body::from(payload.to_string()))
        .unwrap()
}

fn checkout_completed(customer: &str, subscription: &str) -> String {
    json!({
        "id": "evt_1",
        "type": "checkout.session.completed",
        "created": 1_700_000_000,
        "data": { "object": { "customer": customer, "subscription": subscription } }
    })
    .to_string()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_billing_routes_require_auth() {
    let app = app();

    for (method, uri) in [
        ("GET", "/"),
        ("POST", "/subscribe/"),
        ("POST", "/portal/"),
        ("GET", "/status-fragment/"),
    ] {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::HOST, HOST)
            .body(Body::empty())
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
    }
}

#[tokio::test]
async fn test_plan_list_skips_rejected_price() {
    let app = app();
    let token = token(&app.state, AccountId::new(), AccountRole::Member);

    let request = Request::get("/")
        .header(header::HOST, HOST)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["publishable_key"], "pk_test_router");
    let plans = body["plans"].as_array().unwrap();
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0]["id"], "price_basic");
    assert_eq!(plans[0]["label"], "Basic");
}

#[tokio::test]
async fn test_subscribe_without_price_id_is_bad_request() {
    let app = app();
    let token = token(&app.state, AccountId::new(), AccountRole::Member);

    let request = Request::post("/subscribe/")
        .header(header::HOST, HOST)
        .header(header::COOKIE, format!("session={token}"))
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("price_id="))
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.provider.customers_created(), 0);

    let body = json_body(response).await;
    assert_eq!(body["error"]["message"], "Missing price_id");
}

#[tokio::test]
async fn test_subscribe_redirects_to_hosted_checkout() {
    let app = app();
    let account_id = AccountId::new();
    let token = token(&app.state, account_id, AccountRole::Member);

    let request = Request::post("/subscribe/")
        .header(header::HOST, HOST)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("price_id=price_basic"))
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let location = response.headers().get("HX-Redirect").unwrap().to_str().unwrap();
    assert!(location.starts_with("https://checkout.stripe.test/"));

    let checkouts = app.provider.checkouts();
    assert_eq!(checkouts.len(), 1);
    assert_eq!(checkouts[0].price_id, "price_basic");
    assert_eq!(checkouts[0].success_url, "https://www.example.com/?checkout=success");
    assert!(app.store.get(account_id).unwrap().stripe_customer_id.is_some());
}

#[tokio::test]
async fn test_subscribe_surfaces_provider_message() {
    let app = app_with(
        MockProvider::new().failing(MockCall::CreateCheckoutSession, "No such price: 'price_x'"),
    );
    let token = token(&app.state, AccountId::new(), AccountRole::Member);

    let request = Request::post("/subscribe/")
        .header(header::HOST, HOST)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("price_id=price_x"))
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert_eq!(body["error"]["message"], "No such price: 'price_x'");
}

#[tokio::test]
async fn test_portal_redirects_and_wrong_method_is_rejected() {
    let app = app();
    let token = token(&app.state, AccountId::new(), AccountRole::Member);

    let request = Request::post("/portal/")
        .header(header::HOST, HOST)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(app.provider.portal_return_urls(), vec!["https://www.example.com/".to_string()]);

    let request = Request::get("/portal/")
        .header(header::HOST, HOST)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_status_fragment_reads_cached_record() {
    let app = app();
    let token_without = token(&app.state, AccountId::new(), AccountRole::Member);

    let request = Request::get("/status-fragment/")
        .header(header::HOST, HOST)
        .header(header::AUTHORIZATION, format!("Bearer {token_without}"))
        .body(Body::empty())
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["has_subscription"], false);
    assert!(body["customer"].is_null());
    assert_eq!(app.provider.subscription_fetches(), 0);
}

#[tokio::test]
async fn test_webhook_bad_signature_is_forbidden_without_writes() {
    let app = app();
    let account_id = seeded_customer(&app.store, "cus_1");
    let payload = checkout_completed("cus_1", "sub_1");

    let request = Request::post("/webhook/")
        .header(header::HOST, HOST)
        .header("stripe-signature", "t=1700000000,v1=deadbeef")
        .body(Body::from(payload))
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.store.writes(), 0);
    assert!(!app.store.get(account_id).unwrap().has_subscription());
}

#[tokio::test]
async fn test_webhook_checkout_completed_mirrors_subscription() {
    let app = app();
    let account_id = seeded_customer(&app.store, "cus_1");

    let response = app
        .router
        .oneshot(signed_webhook(&checkout_completed("cus_1", "sub_1")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let record = app.store.get(account_id).unwrap();
    assert_eq!(record.subscription_status.as_deref(), Some("active"));
    assert_eq!(record.price_id.as_deref(), Some("price_basic"));
    assert_eq!(
        record.current_period_end.map(|t| t.unix_timestamp()),
        Some(1_900_000_000)
    );
}

#[tokio::test]
async fn test_webhook_unknown_customer_is_acknowledged() {
    let app = app();

    let response = app
        .router
        .oneshot(signed_webhook(&checkout_completed("cus_unknown", "sub_1")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.store.writes(), 0);
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_webhook_fetch_failure_is_acknowledged() {
    let app = app_with(MockProvider::new().failing(MockCall::RetrieveSubscription, "Stripe unavailable"));
    let account_id = seeded_customer(&app.store, "cus_1");

    let response = app
        .router
        .oneshot(signed_webhook(&checkout_completed("cus_1", "sub_1")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.store.writes(), 0);
    assert_eq!(app.store.get(account_id).unwrap(), {
        let mut expected = CustomerRecord::new(account_id);
        expected.stripe_customer_id = Some("cus_1".to_string());
        expected
    });
}

#[tokio::test]
async fn test_webhook_store_failure_is_still_acknowledged() {
    let app = app();
    seeded_customer(&app.store, "cus_1");
    app.store.set_fail_writes(true);

    let response = app
        .router
        .oneshot(signed_webhook(&checkout_completed("cus_1", "sub_1")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_billing_disabled() {
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://localhost/launchkit_test")
        .unwrap();
    let state = AppState::with_billing(pool, test_config(), None);
    let router = create_router(state.clone());

    let request = Request::post("/webhook/")
        .header(header::HOST, HOST)
        .header("stripe-signature", "t=1700000000,v1=00")
        .body(Body::from("{}"))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let token = token(&state, AccountId::new(), AccountRole::Member);
    let request = Request::get("/")
        .header(header::HOST, HOST)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_webhook_extreme_timestamp_is_forbidden() {
    let app = app();
    seeded_customer(&app.store, "cus_1");

    for signature in ["t=-9223372036854775808,v1=00", "t=9223372036854775807,v1=00"] {
        let request = Request::post("/webhook/")
            .header(header::HOST, HOST)
            .header("stripe-signature", signature)
            .body(Body::from(checkout_completed("cus_1", "sub_1")))
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{signature}");
    }
    assert_eq!(app.store.writes(), 0);
}

#[tokio::test]
async fn test_admin_listing_requires_admin_role() {
    let app = app();
    let account_id = seeded_customer(&app.store, "cus_1");
    app.store.add_account(account_id, "ada@example.com");

    let member = token(&app.state, AccountId::new(), AccountRole::Member);
    let request = Request::get("/admin/billing-customers")
        .header(header::HOST, HOST)
        .header(header::AUTHORIZATION, format!("Bearer {member}"))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let admin = token(&app.state, AccountId::new(), AccountRole::Admin);
    let request = Request::get("/admin/billing-customers?q=cus_1")
        .header(header::HOST, HOST)
        .header(header::AUTHORIZATION, format!("Bearer {admin}"))
        .body(Body::empty())
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["limit"], 50);
    assert_eq!(body["customers"][0]["email"], "ada@example.com");
    assert_eq!(body["customers"][0]["stripe_customer_id"], "cus_1");
}

#[tokio::test]
async fn test_unknown_subdomain_is_not_found() {
    let app = app();

    let request = Request::get("/webhook/")
        .header(header::HOST, "shop.example.com")
        .body(Body::empty())
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unrouted_path_redirects_home() {
    let app = app();

    let request = Request::get("/pricing/old")
        .header(header::HOST, "example.com")
        .body(Body::empty())
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");
}

#[tokio::test]
async fn test_liveness_ignores_host() {
    let app = app();

    let request = Request::get("/health/live")
        .header(header::HOST, "10.0.0.7:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
