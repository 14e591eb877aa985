use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use sweet_api::middleware::CustomerClaims;
use sweet_api::{app, AppState, AuthConfig};
use sweet_core::repository::OrderRepository;
use sweet_core::signature::SignatureVerifier;
use sweet_order::{MockPaymentSimulator, Notifier, PaymentOrchestrator, WebhookProcessor};
use sweet_shared::{Order, OrderStatus};
use sweet_store::memory::{
    MemoryEventLedger, MemoryInventory, MemoryNotificationRepository, MemoryOrderRepository, MemoryPaymentAdapter,
};
use tokio::sync::broadcast;
use tower::ServiceExt;
use uuid::Uuid;

const WEBHOOK_SECRET: &str = "whsec_test_secret";
const JWT_SECRET: &str = "test-jwt-secret";

struct TestApp {
    router: Router,
    orders: Arc<MemoryOrderRepository>,
    adapter: Arc<MemoryPaymentAdapter>,
    inventory: Arc<MemoryInventory>,
}

fn build(success_rate: f64, configured: bool) -> TestApp {
    let orders = Arc::new(MemoryOrderRepository::new());
    let adapter = Arc::new(MemoryPaymentAdapter::new());
    let inventory = Arc::new(MemoryInventory::new());
    let (tx, _) = broadcast::channel(16);
    let notifier = Notifier::new(Arc::new(MemoryNotificationRepository::new()), tx);

    let state = AppState {
        payments: configured.then(|| {
            Arc::new(PaymentOrchestrator::new(
                adapter.clone(),
                orders.clone(),
                notifier.clone(),
            ))
        }),
        webhooks: configured.then(|| {
            Arc::new(WebhookProcessor::new(
                orders.clone(),
                inventory.clone(),
                Arc::new(MemoryEventLedger::new()),
                notifier.clone(),
            ))
        }),
        signature: configured.then(|| Arc::new(SignatureVerifier::new(WEBHOOK_SECRET))),
        mock_payments: Arc::new(MockPaymentSimulator::with_seed(Duration::ZERO, success_rate, 3)),
        notifier,
        auth: AuthConfig {
            secret: Some(JWT_SECRET.to_string()),
        },
    };

    TestApp {
        router: app(state),
        orders,
        adapter,
        inventory,
    }
}

fn test_app() -> TestApp {
    build(1.0, true)
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn webhook_request(payload: &Value, signature: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/v1/webhooks/stripe")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(signature) = signature {
        builder = builder.header("stripe-signature", signature);
    }
    builder.body(Body::from(payload.to_string())).unwrap()
}

fn signed_webhook(payload: &Value) -> Request<Body> {
    let signature = SignatureVerifier::new(WEBHOOK_SECRET)
        .sign(payload.to_string().as_bytes(), Utc::now().timestamp())
        .unwrap();
    webhook_request(payload, Some(signature))
}

fn event(id: &str, event_type: &str, intent_id: &str) -> Value {
    event_at(id, event_type, intent_id, Utc::now().timestamp())
}

fn event_at(id: &str, event_type: &str, intent_id: &str, created: i64) -> Value {
    json!({
        "id": id,
        "type": event_type,
        "created": created,
        "data": { "object": { "id": intent_id, "object": "payment_intent" } }
    })
}

fn bearer(user_id: &str) -> String {
    let claims = CustomerClaims {
        sub: user_id.to_string(),
        email: Some("jo@example.com".to_string()),
        role: Some("authenticated".to_string()),
        exp: (Utc::now().timestamp() + 3600) as usize,
    };
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(JWT_SECRET.as_bytes())).unwrap();
    format!("Bearer {}", token)
}

fn authed(method: &str, uri: &str, user_id: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, bearer(user_id))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn health_reports_configured_services() {
    let app = test_app();
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(&app.router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["payments"], true);
}

#[tokio::test]
async fn confirm_marks_order_confirmed() {
    let app = test_app();
    let order = Order::new("ST-1000", 2599, "usd").with_payment_intent("pi_abc");
    app.orders.insert(order.clone()).await.unwrap();
    app.adapter.set_status("pi_abc", "succeeded").await;

    let (status, body) = send(
        &app.router,
        post_json("/v1/payments/confirm", json!({ "paymentIntentId": "pi_abc" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["paymentIntentId"], "pi_abc");
    assert_eq!(body["data"]["status"], "succeeded");
    assert_eq!(body["data"]["orderStatus"], "confirmed");
    assert_eq!(body["data"]["order"]["orderNumber"], "ST-1000");
    assert_eq!(body["data"]["order"]["paymentIntentId"], "pi_abc");
    assert!(body["data"]["order"].get("order_number").is_none());

    let stored = app.orders.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Confirmed);
}

#[tokio::test]
async fn confirm_requires_intent_id() {
    let app = test_app();
    for body in [json!({}), json!({ "paymentIntentId": "   " })] {
        let (status, body) = send(&app.router, post_json("/v1/payments/confirm", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(body["error"]["timestamp"].is_string());
    }
}

#[tokio::test]
async fn confirm_without_processor_fails_with_confirmation_code() {
    let app = build(1.0, false);
    let (status, body) = send(
        &app.router,
        post_json("/v1/payments/confirm", json!({ "paymentIntentId": "pi_abc" })),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "PAYMENT_CONFIRMATION_FAILED");
}

#[tokio::test]
async fn confirm_surfaces_processor_failure() {
    let app = test_app();
    let (status, body) = send(
        &app.router,
        post_json("/v1/payments/confirm", json!({ "paymentIntentId": "pi_unknown" })),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "PAYMENT_CONFIRMATION_FAILED");
    assert!(body["error"]["message"].as_str().unwrap().contains("pi_unknown"));
}

#[tokio::test]
async fn create_intent_links_order() {
    let app = test_app();
    let order = Order::new("ST-2000", 1800, "usd");
    app.orders.insert(order.clone()).await.unwrap();

    let (status, body) = send(
        &app.router,
        post_json("/v1/payments/intents", json!({ "orderId": order.id })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["amount"], 1800);
    assert!(body["data"]["clientSecret"].is_string());
    let intent_id = body["data"]["paymentIntentId"].as_str().unwrap();
    let stored = app.orders.find_by_payment_intent(intent_id).await.unwrap().unwrap();
    assert_eq!(stored.id, order.id);

    let (status, _) = send(
        &app.router,
        post_json("/v1/payments/intents", json!({ "orderId": Uuid::new_v4() })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn signed_succeeded_webhook_marks_order_paid() {
    let app = test_app();
    let order = Order::new("ST-3000", 999, "usd").with_payment_intent("pi_123");
    app.orders.insert(order.clone()).await.unwrap();

    let payload = event("evt_paid", "payment_intent.succeeded", "pi_123");
    let (status, body) = send(&app.router, signed_webhook(&payload)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "received": true }));
    let stored = app.orders.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Paid);
}

#[tokio::test]
async fn failed_webhook_releases_items_once_even_when_replayed() {
    let app = test_app();
    let mut order = Order::new("ST-4000", 999, "usd").with_payment_intent("pi_fail");
    order.add_item(Uuid::new_v4(), 2);
    order.add_item(Uuid::new_v4(), 1);
    app.orders.insert(order.clone()).await.unwrap();

    let payload = event("evt_failed", "payment_intent.payment_failed", "pi_fail");
    let (status, _) = send(&app.router, signed_webhook(&payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.inventory.calls().await.len(), 2);

    let (status, body) = send(&app.router, signed_webhook(&payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);
    assert_eq!(app.inventory.calls().await.len(), 2);

    let stored = app.orders.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::PaymentFailed);
}

#[tokio::test]
async fn webhooks_after_confirmation_settle_the_order() {
    let app = test_app();
    let mut failed = Order::new("ST-4100", 999, "usd").with_payment_intent("pi_f");
    failed.add_item(Uuid::new_v4(), 1);
    app.orders.insert(failed.clone()).await.unwrap();
    app.adapter.set_status("pi_f", "payment_failed").await;

    let paid = Order::new("ST-4101", 999, "usd").with_payment_intent("pi_s");
    app.orders.insert(paid.clone()).await.unwrap();
    app.adapter.set_status("pi_s", "succeeded").await;

    for intent_id in ["pi_f", "pi_s"] {
        let (status, _) = send(
            &app.router,
            post_json("/v1/payments/confirm", json!({ "paymentIntentId": intent_id })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    // Processor stamps trail the confirmation that already ran.
    let created = Utc::now().timestamp() - 1;
    let payload = event_at("evt_f", "payment_intent.payment_failed", "pi_f", created);
    let (status, _) = send(&app.router, signed_webhook(&payload)).await;
    assert_eq!(status, StatusCode::OK);
    let payload = event_at("evt_s", "payment_intent.succeeded", "pi_s", created);
    let (status, _) = send(&app.router, signed_webhook(&payload)).await;
    assert_eq!(status, StatusCode::OK);

    let stored = app.orders.get_order(failed.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::PaymentFailed);
    assert_eq!(app.inventory.calls().await.len(), 1);
    let stored = app.orders.get_order(paid.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Paid);
}

#[tokio::test]
async fn webhook_rejects_missing_or_forged_signature() {
    let app = test_app();
    let order = Order::new("ST-5000", 999, "usd").with_payment_intent("pi_forged");
    app.orders.insert(order.clone()).await.unwrap();
    let payload = event("evt_forged", "payment_intent.succeeded", "pi_forged");

    let (status, body) = send(&app.router, webhook_request(&payload, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"].is_string());

    let forged = SignatureVerifier::new("whsec_someone_else")
        .sign(payload.to_string().as_bytes(), Utc::now().timestamp())
        .unwrap();
    let (status, body) = send(&app.router, webhook_request(&payload, Some(forged))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"].is_string());

    let stored = app.orders.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
}

#[tokio::test]
async fn webhook_rejects_unparsable_body() {
    let app = test_app();
    let body = b"{not json".to_vec();
    let signature = SignatureVerifier::new(WEBHOOK_SECRET)
        .sign(&body, Utc::now().timestamp())
        .unwrap();
    let request = Request::builder()
        .method("POST")
        .uri("/v1/webhooks/stripe")
        .header("stripe-signature", signature)
        .body(Body::from(body))
        .unwrap();

    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"].is_string());
}

#[tokio::test]
async fn webhook_without_secret_is_configuration_error() {
    let app = build(1.0, false);
    let payload = event("evt_1", "payment_intent.succeeded", "pi_1");
    let (status, body) = send(&app.router, webhook_request(&payload, Some("t=1,v1=00".into()))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "CONFIGURATION_ERROR");
}

fn mock_body() -> Value {
    json!({
        "amount": 2599,
        "currency": "usd",
        "customerEmail": "jo@example.com",
        "customerName": "Jo Baker",
        "items": [{ "productId": Uuid::new_v4(), "name": "Macaron box", "quantity": 1, "unitPrice": 2599 }],
        "shippingAddress": { "line1": "1 Sugar Lane", "city": "Portland", "postalCode": "97201", "country": "US" }
    })
}

#[tokio::test]
async fn mock_payment_returns_receipt() {
    let app = build(1.0, false);
    let (status, body) = send(&app.router, post_json("/v1/payments/mock", mock_body())).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["paymentId"].as_str().unwrap().starts_with("mock_pi_"));
    assert!(body["data"]["orderNumber"].as_str().unwrap().starts_with("ST-"));
}

#[tokio::test]
async fn mock_payment_lists_every_violation() {
    let app = test_app();
    let mut request = mock_body();
    request["customerEmail"] = json!("");
    request["items"] = json!([]);

    let (status, body) = send(&app.router, post_json("/v1/payments/mock", request)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["details"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn mock_payment_decline_is_payment_required() {
    let app = build(0.0, false);
    let (status, body) = send(&app.router, post_json("/v1/payments/mock", mock_body())).await;

    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error"]["code"], "PAYMENT_DECLINED");
    assert!(!body["error"]["message"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn notifications_require_a_token() {
    let app = test_app();
    let request = Request::builder().uri("/v1/notifications").body(Body::empty()).unwrap();
    let (status, _) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/v1/notifications")
        .header(header::AUTHORIZATION, "Bearer not-a-jwt")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn status_change_lands_in_owner_feed() {
    let app = test_app();
    let order = Order::new("ST-6000", 500, "usd")
        .with_user("user-42")
        .with_payment_intent("pi_feed");
    app.orders.insert(order).await.unwrap();

    let payload = event("evt_feed", "payment_intent.succeeded", "pi_feed");
    send(&app.router, signed_webhook(&payload)).await;

    let (status, body) = send(&app.router, authed("GET", "/v1/notifications", "user-42")).await;
    assert_eq!(status, StatusCode::OK);
    let feed = body["data"].as_array().unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0]["orderNumber"], "ST-6000");
    assert_eq!(feed[0]["status"], "paid");

    let (_, body) = send(&app.router, authed("GET", "/v1/notifications", "someone-else")).await;
    assert!(body["data"].as_array().unwrap().is_empty());

    let (status, _) = send(&app.router, authed("DELETE", "/v1/notifications", "user-42")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, body) = send(&app.router, authed("GET", "/v1/notifications", "user-42")).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}
