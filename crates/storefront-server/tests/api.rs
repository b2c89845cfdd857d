//! HTTP surface tests, driving the router in-process

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chrono::Duration;
use http_body_util::BodyExt;
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use tower::ServiceExt;

use storefront_checkout::notify::MailKind;
use storefront_checkout::{
    BackUrls, CheckoutService, CheckoutSessions, Environment, MemoryProcessedPayments,
    MemorySessionStore, MockGateway, PackageDimensions, PaymentDetails, PaymentStatus,
    RecordingMailer, ShippingQuote, ShippingQuoter, WebhookReconciler, WebhookVerifier,
};
use storefront_server::{AppState, Payments, router};

const SECRET: &str = "whsec_api_test";

struct TestApp {
    router: Router,
    gateway: Arc<MockGateway>,
    mailer: Arc<RecordingMailer>,
}

struct FixedQuoter;

#[async_trait]
impl ShippingQuoter for FixedQuoter {
    async fn quote(
        &self,
        _destination: &str,
        _package: &PackageDimensions,
    ) -> storefront_checkout::Result<Vec<ShippingQuote>> {
        Ok(vec![ShippingQuote {
            id: Some(json!(1)),
            name: "PAC".into(),
            price: Some("22.50".into()),
            delivery_time: Some(6),
            error: None,
            company: None,
        }])
    }

    fn name(&self) -> &str {
        "FixedQuoter"
    }
}

fn app_with(ttl: Duration, environment: Environment, with_payments: bool) -> TestApp {
    let sessions = CheckoutSessions::new(Arc::new(MemorySessionStore::with_ttl(ttl)));
    let gateway = Arc::new(MockGateway::new());
    let mailer = Arc::new(RecordingMailer::new());
    let ledger = Arc::new(MemoryProcessedPayments::new());

    let payments = with_payments.then(|| Payments {
        checkout: Arc::new(CheckoutService::new(
            sessions.clone(),
            gateway.clone(),
            BackUrls::from_base("http://localhost:3000"),
            environment,
        )),
        reconciler: Arc::new(WebhookReconciler::new(gateway.clone(), mailer.clone(), ledger)),
        verifier: WebhookVerifier::new(SECRET),
    });

    let state = AppState {
        sessions,
        payments,
        mailer: mailer.clone(),
        mail_configured: true,
        shipping: Some(Arc::new(FixedQuoter)),
        environment,
    };

    TestApp {
        router: router(state),
        gateway,
        mailer,
    }
}

fn app() -> TestApp {
    app_with(Duration::hours(24), Environment::Development, true)
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn cart() -> Value {
    json!({
        "products": [{"id": "p1", "name": "Peça Teste 1", "price": 150.50, "quantity": 2}],
        "shipping": {"name": "Frete Expresso", "price": 45.90, "estimatedDays": 3}
    })
}

fn purchaser(checkout_id: &str) -> Value {
    json!({
        "checkoutId": checkout_id,
        "name": "João Silva",
        "email": "joao@exemplo.com",
        "cpf": "123.456.789-00",
        "phone": "(11) 99999-8888",
        "address": {
            "cep": "01234-567", "street": "Rua Teste", "number": "123",
            "neighborhood": "Centro", "city": "São Paulo", "state": "SP"
        }
    })
}

async fn init(router: &Router) -> String {
    let (status, body) = send(router, post_json("/checkout/init", &cart())).await;
    assert_eq!(status, StatusCode::CREATED);
    body["checkoutId"].as_str().unwrap().to_string()
}

fn now_ts() -> String {
    chrono::Utc::now().timestamp().to_string()
}

fn webhook(payment_id: &str, secret: &str, request_id: &str) -> Request<Body> {
    let signature = WebhookVerifier::new(secret)
        .sign(Some(payment_id), Some(request_id), &now_ts())
        .unwrap();
    Request::builder()
        .method("POST")
        .uri(format!("/checkout/webhook?data.id={payment_id}&type=payment"))
        .header("content-type", "application/json")
        .header("x-signature", signature)
        .header("x-request-id", request_id)
        .body(Body::from(
            json!({"type": "payment", "data": {"id": payment_id}}).to_string(),
        ))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = app();
    let (status, body) = send(&app.router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["paymentsConfigured"], true);
    assert_eq!(body["shippingConfigured"], true);
}

#[tokio::test]
async fn test_init_and_read_recomputes_total() {
    let app = app();
    let id = init(&app.router).await;

    let (status, body) = send(&app.router, get(&format!("/checkout/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], json!(346.9));
    assert_eq!(body["products"][0]["quantity"], 2);
    assert_eq!(body["shipping"]["name"], "Frete Expresso");
}

#[tokio::test]
async fn test_init_rejects_bad_carts() {
    let app = app();

    let empty = json!({"products": [], "shipping": {"name": "PAC", "price": 10}});
    let (status, body) = send(&app.router, post_json("/checkout/init", &empty)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_CHECKOUT_DATA");

    let no_shipping = json!({"products": [{"id": "p", "name": "n", "price": 1, "quantity": 1}]});
    let (status, _) = send(&app.router, post_json("/checkout/init", &no_shipping)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .method("POST")
        .uri("/checkout/init")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_CHECKOUT_DATA");
}

#[tokio::test]
async fn test_unknown_checkout_is_404() {
    let app = app();
    let (status, body) = send(&app.router, get("/checkout/does-not-exist")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "CHECKOUT_NOT_FOUND");
}

#[tokio::test]
async fn test_expired_checkout_is_410_then_404() {
    let app = app_with(Duration::zero(), Environment::Development, true);
    let id = init(&app.router).await;

    let (status, body) = send(&app.router, get(&format!("/checkout/{id}"))).await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["code"], "CHECKOUT_EXPIRED");

    let (status, _) = send(&app.router, get(&format!("/checkout/{id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_checkout_returns_sandbox_url() {
    let app = app();
    let id = init(&app.router).await;

    let (status, body) = send(&app.router, post_json("/checkout", &purchaser(&id))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["checkoutUrl"].as_str().unwrap().starts_with("https://sandbox."));

    let preferences = app.gateway.preferences().await;
    assert_eq!(preferences.len(), 1);
    assert_eq!(preferences[0].items.len(), 2);
}

#[tokio::test]
async fn test_checkout_errors() {
    let app = app();

    let (status, _) = send(&app.router, post_json("/checkout", &purchaser("missing"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let id = init(&app.router).await;
    let mut bad_email = purchaser(&id);
    bad_email["email"] = json!("joao at exemplo");
    let (status, _) = send(&app.router, post_json("/checkout", &bad_email)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.gateway.fail_preferences(true);
    let (status, body) = send(&app.router, post_json("/checkout", &purchaser(&id))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "CHECKOUT_CREATION_FAILED");
}

#[tokio::test]
async fn test_payments_disabled() {
    let app = app_with(Duration::hours(24), Environment::Development, false);
    let id = init(&app.router).await;

    let (status, body) = send(&app.router, post_json("/checkout", &purchaser(&id))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "PAYMENTS_DISABLED");

    let (status, _) = send(&app.router, webhook("1", SECRET, "req-1")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

/// Full flow: init, checkout, then an approved payment notified twice
#[tokio::test]
async fn test_happy_path_notifies_once() {
    let app = app();
    let id = init(&app.router).await;
    let (status, _) = send(&app.router, post_json("/checkout", &purchaser(&id))).await;
    assert_eq!(status, StatusCode::OK);

    // The gateway echoes the preference metadata back on the payment
    let metadata = app.gateway.preferences().await[0]
        .metadata
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    app.gateway
        .insert_payment(PaymentDetails {
            id: "123456789".into(),
            status: PaymentStatus::Approved,
            date_approved: Some("2024-05-01T10:00:00.000-03:00".into()),
            metadata,
        })
        .await;

    let (status, body) = send(&app.router, webhook("123456789", SECRET, "req-1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);

    let (status, _) = send(&app.router, webhook("123456789", SECRET, "req-2")).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(app.mailer.count(MailKind::OrderConfirmation).await, 1);
    assert_eq!(app.mailer.count(MailKind::OwnerNotification).await, 1);

    let sent = app.mailer.sent().await;
    assert_eq!(sent[0].1.name, "João Silva");
    assert_eq!(sent[0].1.total, dec!(346.90));
}

#[tokio::test]
async fn test_webhook_bad_signature_is_401() {
    let app = app();

    let (status, body) = send(&app.router, webhook("42", "wrong-secret", "req-1")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "WEBHOOK_VERIFICATION_FAILED");

    let unsigned = post_json("/checkout/webhook?data.id=42", &json!({"type": "payment", "data": {"id": "42"}}));
    let (status, missing_body) = send(&app.router, unsigned).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(missing_body, body);

    assert_eq!(app.gateway.payment_lookups(), 0);
}

#[tokio::test]
async fn test_webhook_body_must_match_signed_id() {
    let app = app();
    let signature = WebhookVerifier::new(SECRET)
        .sign(Some("42"), Some("req-1"), &now_ts())
        .unwrap();
    let request = Request::builder()
        .method("POST")
        .uri("/checkout/webhook?data.id=42")
        .header("x-signature", signature)
        .header("x-request-id", "req-1")
        .body(Body::from(json!({"type": "payment", "data": {"id": "43"}}).to_string()))
        .unwrap();

    let (status, _) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_webhook_stale_timestamp_is_401() {
    let app = app();
    let stale = (chrono::Utc::now() - Duration::days(31)).timestamp().to_string();
    let signature = WebhookVerifier::new(SECRET)
        .sign(Some("42"), Some("req-1"), &stale)
        .unwrap();
    let request = Request::builder()
        .method("POST")
        .uri("/checkout/webhook?data.id=42")
        .header("x-signature", signature)
        .header("x-request-id", "req-1")
        .body(Body::from(json!({"type": "payment", "data": {"id": "42"}}).to_string()))
        .unwrap();

    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "WEBHOOK_VERIFICATION_FAILED");
    assert_eq!(app.gateway.payment_lookups(), 0);
}

#[tokio::test]
async fn test_webhook_other_event_without_id_is_acknowledged() {
    let app = app();
    let signature = WebhookVerifier::new(SECRET)
        .sign(None, Some("req-1"), &now_ts())
        .unwrap();
    let request = Request::builder()
        .method("POST")
        .uri("/checkout/webhook")
        .header("x-signature", signature)
        .header("x-request-id", "req-1")
        .body(Body::from(
            json!({"type": "subscription_preapproval", "data": {}}).to_string(),
        ))
        .unwrap();

    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);
    assert_eq!(app.gateway.payment_lookups(), 0);
}

#[tokio::test]
async fn test_webhook_pending_and_gateway_failure() {
    let app = app();
    app.gateway
        .insert_payment(PaymentDetails {
            id: "777".into(),
            status: PaymentStatus::Pending,
            date_approved: None,
            metadata: serde_json::Map::new(),
        })
        .await;

    let (status, _) = send(&app.router, webhook("777", SECRET, "req-1")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.mailer.sent().await.is_empty());

    // Unknown payment: the lookup fails and the gateway should redeliver
    let (status, body) = send(&app.router, webhook("888", SECRET, "req-2")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "GATEWAY_ERROR");
}

#[tokio::test]
async fn test_webhook_bad_metadata_is_acknowledged() {
    let app = app();
    app.gateway
        .insert_payment(PaymentDetails {
            id: "999".into(),
            status: PaymentStatus::Approved,
            date_approved: None,
            metadata: serde_json::Map::new(),
        })
        .await;

    let (status, body) = send(&app.router, webhook("999", SECRET, "req-1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);
    assert!(app.mailer.sent().await.is_empty());
}

#[tokio::test]
async fn test_shipping_quote() {
    let app = app();
    let request = json!({
        "cep": "90570-020",
        "product": {"width": 11, "height": 17, "length": 11, "weight": 0.3, "insurance_value": 10.1}
    });
    let (status, body) = send(&app.router, post_json("/shipping", &request)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["name"], "PAC");

    let (status, _) = send(&app.router, post_json("/shipping", &json!({"cep": "90570-020"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_dev_email_route() {
    let app = app();
    let request = Request::builder()
        .method("POST")
        .uri("/dev/test-email")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(app.mailer.sent().await.len(), 2);

    let prod = app_with(Duration::hours(24), Environment::Production, true);
    let request = Request::builder()
        .method("POST")
        .uri("/dev/test-email")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&prod.router, request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
