use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;
use wayfarer_api::{app, middleware::Claims, AppState, AuthConfig};
use wayfarer_catalog::PricingCalculator;
use wayfarer_core::{InMemoryRequestStore, ItinerarySummary, StoreOp};
use wayfarer_workflow::{EngineConfig, WorkflowEngine};

const SECRET: &str = "test-secret";

struct TestApp {
    router: Router,
    store: InMemoryRequestStore,
    itinerary_id: Uuid,
    admin: String,
    customer_id: Uuid,
    customer: String,
}

fn token(id: Uuid, role: &str) -> String {
    let claims = Claims {
        sub: id.to_string(),
        role: role.to_string(),
        exp: (Utc::now() + ChronoDuration::hours(1)).timestamp() as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

async fn test_app(config: EngineConfig) -> TestApp {
    let store = InMemoryRequestStore::new();
    let itinerary_id = Uuid::new_v4();
    store
        .add_itinerary(ItinerarySummary {
            id: itinerary_id,
            title: "Highland Circuit".to_string(),
            duration: "3 days".to_string(),
        })
        .await;

    let engine = WorkflowEngine::new(Arc::new(store.clone()), PricingCalculator::default(), config);
    let state = AppState {
        engine: Arc::new(engine),
        auth: AuthConfig {
            secret: SECRET.to_string(),
        },
    };

    let customer_id = Uuid::new_v4();
    TestApp {
        router: app(state),
        store,
        itinerary_id,
        admin: token(Uuid::new_v4(), "ADMIN"),
        customer_id,
        customer: token(customer_id, "CUSTOMER"),
    }
}

async fn send(router: &Router, method: &str, uri: &str, bearer: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(t) = bearer {
        builder = builder.header("Authorization", format!("Bearer {}", t));
    }
    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn new_request(itinerary_id: Uuid) -> Value {
    json!({
        "itinerary_id": itinerary_id,
        "guide_id": null,
        "start_date": "2027-05-01",
        "end_date": "2027-05-03",
        "group_size": "4",
        "additional_requests": null,
        "contact": { "name": "Noor", "email": "noor@example.com", "phone": null }
    })
}

async fn submit(t: &TestApp) -> Uuid {
    let (status, body) = send(&t.router, "POST", "/v1/requests", Some(&t.customer), Some(new_request(t.itinerary_id))).await;
    assert_eq!(status, StatusCode::CREATED);
    Uuid::parse_str(body["id"].as_str().unwrap()).unwrap()
}

#[tokio::test]
async fn test_health() {
    let t = test_app(EngineConfig::default()).await;
    let (status, body) = send(&t.router, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_missing_or_bad_token_is_unauthorized() {
    let t = test_app(EngineConfig::default()).await;

    let (status, _) = send(&t.router, "GET", "/v1/requests", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&t.router, "GET", "/v1/requests", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_customer_token_cannot_reach_admin_routes() {
    let t = test_app(EngineConfig::default()).await;
    let (status, _) = send(&t.router, "GET", "/v1/admin/requests", Some(&t.customer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_console_flow() {
    let t = test_app(EngineConfig::default()).await;
    let id = submit(&t).await;

    let (status, quote) = send(&t.router, "GET", &format!("/v1/admin/requests/{}/quote", id), Some(&t.admin), None).await;
    assert_eq!(status, StatusCode::OK);
    // 3 days * 4 * 150 + 3 days * 50
    assert_eq!(quote["breakdown"]["grand_total"], "1950");

    let (status, body) = send(&t.router, "POST", &format!("/v1/admin/requests/{}/process", id), Some(&t.admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "processing");

    let (status, body) = send(
        &t.router,
        "POST",
        &format!("/v1/admin/requests/{}/confirm", id),
        Some(&t.admin),
        Some(json!({ "total_price": "1800", "payment_due_date": "2027-04-01", "admin_notes": null })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "confirmed");
    assert_eq!(body["total_price"], "1800");
    assert_eq!(t.store.booking_count().await, 1);

    let (status, body) = send(
        &t.router,
        "POST",
        &format!("/v1/admin/requests/{}/payment-status", id),
        Some(&t.admin),
        Some(json!({ "payment_status": "paid" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payment_status"], "paid");

    let (status, history) = send(&t.router, "GET", &format!("/v1/requests/{}/history", id), Some(&t.customer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 3);
    assert_eq!(history[0]["to_status"], "confirmed");

    let (status, notifications) = send(&t.router, "GET", "/v1/notifications?unread_only=true", Some(&t.customer), None).await;
    assert_eq!(status, StatusCode::OK);
    let notifications = notifications.as_array().unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["kind"], "success");
    let notification_id = notifications[0]["id"].as_str().unwrap().to_string();

    let (status, _) = send(&t.router, "POST", &format!("/v1/notifications/{}/read", notification_id), Some(&t.customer), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, unread) = send(&t.router, "GET", "/v1/notifications?unread_only=true", Some(&t.customer), None).await;
    assert!(unread.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_confirm_from_pending_is_bad_request() {
    let t = test_app(EngineConfig::default()).await;
    let id = submit(&t).await;

    let (status, body) = send(
        &t.router,
        "POST",
        &format!("/v1/admin/requests/{}/confirm", id),
        Some(&t.admin),
        Some(json!({ "total_price": "900", "payment_due_date": "2027-04-01" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("pending"));
}

#[tokio::test]
async fn test_customer_cancel_needs_reason_and_ownership() {
    let t = test_app(EngineConfig::default()).await;
    let id = submit(&t).await;
    let uri = format!("/v1/requests/{}/cancel", id);

    let (status, _) = send(&t.router, "POST", &uri, Some(&t.customer), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let stranger = token(Uuid::new_v4(), "CUSTOMER");
    let (status, _) = send(&t.router, "POST", &uri, Some(&stranger), Some(json!({ "reason": "mine now" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&t.router, "POST", &uri, Some(&t.customer), Some(json!({ "reason": "Plans changed" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");
    assert_eq!(body["cancellation_reason"], "Plans changed");
}

#[tokio::test]
async fn test_customer_sees_only_own_requests() {
    let t = test_app(EngineConfig::default()).await;
    submit(&t).await;
    let other = token(Uuid::new_v4(), "CUSTOMER");
    send(&t.router, "POST", "/v1/requests", Some(&other), Some(new_request(t.itinerary_id))).await;

    let (status, mine) = send(&t.router, "GET", "/v1/requests", Some(&t.customer), None).await;
    assert_eq!(status, StatusCode::OK);
    let mine = mine.as_array().unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0]["user_id"], t.customer_id.to_string());

    let (_, all) = send(&t.router, "GET", "/v1/admin/requests?status=pending", Some(&t.admin), None).await;
    assert_eq!(all.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_unknown_request_is_not_found() {
    let t = test_app(EngineConfig::default()).await;
    let (status, _) = send(&t.router, "POST", &format!("/v1/admin/requests/{}/process", Uuid::new_v4()), Some(&t.admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_partial_failure_reports_step() {
    let t = test_app(EngineConfig::default()).await;
    let id = submit(&t).await;
    t.store.fail_on(StoreOp::InsertNotification);

    let (status, body) = send(&t.router, "POST", &format!("/v1/admin/requests/{}/reject", id), Some(&t.admin), Some(json!({}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "partial_failure");
    assert_eq!(body["step"], "notification");
    assert_eq!(body["request_id"], id.to_string());
}

#[tokio::test]
async fn test_slow_store_is_service_unavailable() {
    let t = test_app(EngineConfig {
        store_timeout: Duration::from_millis(10),
        read_retries: 0,
        email_notifications: false,
    })
    .await;
    t.store.set_latency(Some(Duration::from_millis(100)));

    let (status, body) = send(&t.router, "GET", "/v1/requests", Some(&t.customer), None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "Service temporarily unavailable");
}
