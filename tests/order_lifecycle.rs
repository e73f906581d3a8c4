#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::fs;
use std::sync::Arc;

use paypal_gateway::{
    client::{Credentials, InMemoryTokenCache, PaypalClient},
    config::GatewayConfig,
    events::{OrderEvent, OrderEvents},
    orders::{self, CreateOrderRequest, OrderError},
    store::StoreError,
    types::{
        OrderStatus,
        orders_api::{OrderIntent, PaymentSource, PurchaseUnit, PurchaseUnitAmount},
    },
};
use serde_json::json;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tempfile::NamedTempFile;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct TestDb {
    pool: sqlx::SqlitePool,
    _db_file: NamedTempFile,
}

async fn setup_db() -> TestDb {
    let db_file = NamedTempFile::new().expect("create temp sqlite file");
    let options = SqliteConnectOptions::new()
        .filename(db_file.path())
        .create_if_missing(true)
        .busy_timeout(std::time::Duration::from_millis(500));

    let mut conn = sqlx::SqliteConnection::connect_with(&options)
        .await
        .expect("connect sqlite");
    sqlx::query("PRAGMA foreign_keys = ON;")
        .execute(&mut conn)
        .await
        .expect("enable foreign keys");

    let mut entries: Vec<_> = fs::read_dir("migrations")
        .expect("read migrations dir")
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().and_then(|ext| ext.to_str()) == Some("sql"))
        .collect();
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        let contents = fs::read_to_string(entry.path()).expect("read migration");
        for stmt in contents.split(';') {
            let stmt = stmt.trim();
            if !stmt.is_empty() {
                sqlx::query(stmt)
                    .execute(&mut conn)
                    .await
                    .expect("run migration");
            }
        }
    }

    use sqlx::Connection;
    conn.close().await.expect("close migration conn");

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("connect pool");

    TestDb {
        pool,
        _db_file: db_file,
    }
}

fn test_client(server: &MockServer) -> PaypalClient {
    let mut config = GatewayConfig::default();
    config.api_url = server.uri();
    config.sandbox = false;
    config.root_url = "https://shop.example.com".to_string();
    config.success_url = "/checkout/done".to_string();
    config.cancellation_url = "/checkout/cancelled".to_string();
    PaypalClient::new(
        config,
        Credentials::new("client-id", "client-secret"),
        Arc::new(InMemoryTokenCache::default()),
    )
}

async fn mock_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "token-abc",
            "token_type": "Bearer",
            "expires_in": 32400,
        })))
        .mount(server)
        .await;
}

fn sample_request() -> CreateOrderRequest {
    CreateOrderRequest {
        intent: OrderIntent::Capture,
        purchase_units: vec![PurchaseUnit {
            amount: PurchaseUnitAmount {
                currency_code: "EUR".to_string(),
                value: "19.99".to_string(),
                breakdown: None,
            },
            reference_id: Some("ref-1".to_string()),
            description: None,
            custom_id: None,
            invoice_id: None,
            soft_descriptor: None,
            items: None,
            payee: None,
            shipping: None,
        }],
        payment_source: PaymentSource::default(),
        application_context: None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Order creation
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_order_persists_order_and_audit_record() {
    let db = setup_db().await;
    let server = MockServer::start().await;
    mock_token(&server).await;

    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "5O190127TN364715T",
            "status": "CREATED",
            "links": [
                {"href": "https://www.paypal.com/checkoutnow?token=5O190127TN364715T",
                 "rel": "payer-action", "method": "GET"}
            ],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let events = OrderEvents::default();
    let mut receiver = events.subscribe();

    let created = orders::create_order(&client, &db.pool, &events, sample_request())
        .await
        .expect("create order");

    assert_eq!(created.id, "5O190127TN364715T");
    assert_eq!(created.status, OrderStatus::Created);

    let order = orders::store::get_order(&db.pool, &created.id)
        .await
        .expect("stored order");
    assert_eq!(order.status, OrderStatus::Created);

    let calls = orders::store::list_api_calls(&db.pool, &created.id)
        .await
        .expect("audit records");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].url, "/v2/checkout/orders");
    assert!(calls[0].request_body.is_some());
    assert!(calls[0].response_body.contains("5O190127TN364715T"));

    let event = receiver.try_recv().expect("created event emitted");
    assert!(matches!(event, OrderEvent::Created { order_id, .. } if order_id == created.id));
}

#[tokio::test]
async fn create_order_injects_configured_redirect_urls() {
    let db = setup_db().await;
    let server = MockServer::start().await;
    mock_token(&server).await;

    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders"))
        .and(body_partial_json(json!({
            "payment_source": {
                "paypal": {
                    "experience_context": {
                        "return_url": "https://shop.example.com/checkout/done",
                        "cancel_url": "https://shop.example.com/checkout/cancelled",
                    }
                }
            }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "ORDER-REDIRECT",
            "status": "CREATED",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let events = OrderEvents::default();

    orders::create_order(&client, &db.pool, &events, sample_request())
        .await
        .expect("create order with injected urls");
}

// ─────────────────────────────────────────────────────────────────────────────
// Capture
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn capture_completes_order_and_appends_audit() {
    let db = setup_db().await;
    let server = MockServer::start().await;
    mock_token(&server).await;

    orders::store::insert_order(&db.pool, "ORDER-1", OrderStatus::Approved)
        .await
        .expect("seed order");

    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders/ORDER-1/capture"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "ORDER-1",
            "status": "COMPLETED",
            "purchase_units": [{
                "reference_id": "ref-1",
                "payments": {
                    "captures": [{
                        "id": "3C679366HH908993F",
                        "status": "COMPLETED",
                        "amount": {"currency_code": "EUR", "value": "19.99"},
                        "final_capture": true,
                    }]
                }
            }],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let events = OrderEvents::default();

    let captured = orders::capture_order(&client, &db.pool, &events, "ORDER-1")
        .await
        .expect("capture order");
    assert_eq!(captured.status, OrderStatus::Completed);

    let order = orders::store::get_order(&db.pool, "ORDER-1")
        .await
        .expect("stored order");
    assert_eq!(order.status, OrderStatus::Completed);

    let calls = orders::store::list_api_calls(&db.pool, "ORDER-1")
        .await
        .expect("audit records");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].url, "/v2/checkout/orders/ORDER-1/capture");
    assert!(calls[0].request_body.is_none());

    let captures = orders::store::captures_for_order(&db.pool, "ORDER-1")
        .await
        .expect("captures from audit trail");
    assert_eq!(captures.len(), 1);
    assert_eq!(captures[0].id, "3C679366HH908993F");
}

#[tokio::test]
async fn capture_of_already_captured_order_is_typed_and_audited() {
    let db = setup_db().await;
    let server = MockServer::start().await;
    mock_token(&server).await;

    orders::store::insert_order(&db.pool, "ORDER-2", OrderStatus::Approved)
        .await
        .expect("seed order");

    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders/ORDER-2/capture"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "name": "UNPROCESSABLE_ENTITY",
            "message": "The requested action could not be performed.",
            "details": [{"issue": "ORDER_ALREADY_CAPTURED",
                         "description": "Order already captured."}],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let events = OrderEvents::default();

    let err = orders::capture_order(&client, &db.pool, &events, "ORDER-2")
        .await
        .expect_err("capture must fail");
    assert!(matches!(err, OrderError::AlreadyCaptured(id) if id == "ORDER-2"));

    // the provider error body still lands in the audit trail
    let calls = orders::store::list_api_calls(&db.pool, "ORDER-2")
        .await
        .expect("audit records");
    assert_eq!(calls.len(), 1);
    assert!(calls[0].response_body.contains("ORDER_ALREADY_CAPTURED"));
}

#[tokio::test]
async fn capture_of_unknown_order_never_reaches_provider() {
    let db = setup_db().await;
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "token-abc",
        })))
        .expect(0)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let events = OrderEvents::default();

    let err = orders::capture_order(&client, &db.pool, &events, "NO-SUCH-ORDER")
        .await
        .expect_err("capture must fail");
    assert!(matches!(err, OrderError::NotFound(id) if id == "NO-SUCH-ORDER"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Detail fetch and token caching
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn detail_fetch_appends_audit_without_touching_order_state() {
    let db = setup_db().await;
    let server = MockServer::start().await;
    mock_token(&server).await;

    orders::store::insert_order(&db.pool, "ORDER-3", OrderStatus::Created)
        .await
        .expect("seed order");

    Mock::given(method("GET"))
        .and(path("/v2/checkout/orders/ORDER-3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "ORDER-3",
            "status": "APPROVED",
            "payer": {"payer_id": "PAYER123", "email_address": "buyer@example.com"},
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);

    let detail = orders::get_order_details(&client, &db.pool, "ORDER-3")
        .await
        .expect("order detail");
    assert_eq!(detail.status, OrderStatus::Approved);
    assert_eq!(
        detail.payer.as_ref().map(|payer| payer.payer_id.as_str()),
        Some("PAYER123")
    );

    // local status is only advanced by capture or webhook dispatch
    let order = orders::store::get_order(&db.pool, "ORDER-3")
        .await
        .expect("stored order");
    assert_eq!(order.status, OrderStatus::Created);

    let calls = orders::store::list_api_calls(&db.pool, "ORDER-3")
        .await
        .expect("audit records");
    assert_eq!(calls.len(), 1);
}

#[tokio::test]
async fn detail_after_create_reports_the_created_order_id() {
    let db = setup_db().await;
    let server = MockServer::start().await;
    mock_token(&server).await;

    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "9XN31259MD6083021",
            "status": "CREATED",
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/checkout/orders/9XN31259MD6083021"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "9XN31259MD6083021",
            "status": "CREATED",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let events = OrderEvents::default();

    let created = orders::create_order(&client, &db.pool, &events, sample_request())
        .await
        .expect("create order");
    let detail = orders::get_order_details(&client, &db.pool, &created.id)
        .await
        .expect("detail for created order");

    assert_eq!(detail.id, created.id);
}

#[tokio::test]
async fn bearer_token_is_fetched_once_and_cached() {
    let db = setup_db().await;
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "token-abc",
            "expires_in": 32400,
        })))
        .expect(1)
        .mount(&server)
        .await;

    orders::store::insert_order(&db.pool, "ORDER-4", OrderStatus::Created)
        .await
        .expect("seed order");

    Mock::given(method("GET"))
        .and(path("/v2/checkout/orders/ORDER-4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "ORDER-4",
            "status": "CREATED",
        })))
        .expect(2)
        .mount(&server)
        .await;

    let client = test_client(&server);

    orders::get_order_details(&client, &db.pool, "ORDER-4")
        .await
        .expect("first detail call");
    orders::get_order_details(&client, &db.pool, "ORDER-4")
        .await
        .expect("second detail call");
}

// ─────────────────────────────────────────────────────────────────────────────
// Status lifecycle guard
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn order_status_never_moves_backwards() {
    let db = setup_db().await;

    orders::store::insert_order(&db.pool, "ORDER-5", OrderStatus::Completed)
        .await
        .expect("seed order");

    let err = orders::store::update_order_status(&db.pool, "ORDER-5", OrderStatus::Approved)
        .await
        .expect_err("backward transition must fail");
    assert!(matches!(err, StoreError::Conflict(_)));

    // re-applying the current status is a no-op, not a conflict
    let order = orders::store::update_order_status(&db.pool, "ORDER-5", OrderStatus::Completed)
        .await
        .expect("same-status update");
    assert_eq!(order.status, OrderStatus::Completed);
}
