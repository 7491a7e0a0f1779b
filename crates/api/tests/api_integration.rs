//! Integration tests for the API server.

use std::sync::Arc;
use std::sync::OnceLock;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use fulfillment::{InMemoryFulfiller, InMemoryPaymentProcessor};
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::InMemoryOrderStore;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

const WEBHOOK_SECRET: &str = "test-webhook-secret";

fn test_config() -> api::config::Config {
    api::config::Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        webhook_secret: WEBHOOK_SECRET.to_string(),
        public_base_url: "http://localhost:3000".to_string(),
        database_url: None,
    }
}

fn setup() -> (axum::Router, InMemoryFulfiller, InMemoryPaymentProcessor) {
    let store = InMemoryOrderStore::new();
    let (state, fulfiller, payment) = api::create_default_state(store, &test_config());
    let app = api::create_app(state, get_metrics_handle());
    (app, fulfiller, payment)
}

fn order_request_body() -> serde_json::Value {
    serde_json::json!({
        "recipient": {
            "name": "Ada Lovelace",
            "line1": "1 Analytical Way",
            "town_or_city": "London",
            "postal_or_zip_code": "N1 9GU",
            "country_code": "GB"
        },
        "shipping_method": "Standard",
        "payment_method_reference": "pm_captured",
        "items": [
            {
                "sku": "BOOK-A5",
                "copies": 1,
                "price_minor_units": 1500,
                "book_size": "A5-portrait",
                "spine_text": "Nora's Adventure",
                "source_asset_url": "https://assets.example/story-1.pdf"
            },
            {
                "sku": "BOOK-A4",
                "copies": 1,
                "price_minor_units": 2000,
                "source_asset_url": "https://assets.example/story-2.pdf"
            }
        ]
    })
}

async fn post_json(app: &axum::Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn get_json(app: &axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn webhook_uri(token: &str) -> String {
    format!("/webhooks/fulfillment/{token}")
}

fn in_progress_payload(fulfiller_order_id: &str) -> serde_json::Value {
    serde_json::json!({
        "id": fulfiller_order_id,
        "status": { "stage": "InProgress" },
        "shipments": []
    })
}

#[tokio::test]
async fn test_health_check() {
    let (app, _, _) = setup();

    let (status, json) = get_json(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_submit_order_creates_batch() {
    let (app, fulfiller, _) = setup();

    let (status, created) = post_json(&app, "/orders", order_request_body()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(created["order_reference"].as_str().is_some());
    assert_eq!(created["fulfiller_order_id"], "PD-0001");
    assert_eq!(created["purchase_ids"].as_array().unwrap().len(), 2);
    assert_eq!(fulfiller.submitted_count(), 1);

    let reference = created["order_reference"].as_str().unwrap();
    let (status, order) = get_json(&app, &format!("/orders/{reference}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["purchases"].as_array().unwrap().len(), 2);
    assert_eq!(order["print_orders"].as_array().unwrap().len(), 2);
    for purchase in order["purchases"].as_array().unwrap() {
        assert_eq!(purchase["status"], "Creating");
    }
}

#[tokio::test]
async fn test_webhook_with_wrong_token_is_not_found() {
    let (app, _, payment) = setup();

    let (status, _) = post_json(
        &app,
        &webhook_uri("wrong-secret"),
        in_progress_payload("PD-0001"),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(payment.request_count(), 0);
}

#[tokio::test]
async fn test_webhook_with_invalid_body_is_acknowledged() {
    let (app, _, _) = setup();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(webhook_uri(WEBHOOK_SECRET))
                .header("content-type", "application/json")
                .body(Body::from("this is not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["received"], true);
}

#[tokio::test]
async fn test_webhook_for_unknown_order_is_acknowledged() {
    let (app, _, payment) = setup();

    let (status, json) = post_json(
        &app,
        &webhook_uri(WEBHOOK_SECRET),
        in_progress_payload("PD-9999"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["received"], true);
    assert_eq!(payment.charge_count(), 0);
}

#[tokio::test]
async fn test_deferred_charge_fires_on_production_webhook() {
    let (app, _, payment) = setup();

    let (_, created) = post_json(&app, "/orders", order_request_body()).await;
    let reference = created["order_reference"].as_str().unwrap();
    let fulfiller_order_id = created["fulfiller_order_id"].as_str().unwrap();

    // No charge at submission time: payment is deferred.
    assert_eq!(payment.request_count(), 0);

    let (status, json) = post_json(
        &app,
        &webhook_uri(WEBHOOK_SECRET),
        in_progress_payload(fulfiller_order_id),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["received"], true);

    assert_eq!(payment.charge_count(), 1);
    assert_eq!(payment.charged_amount(fulfiller_order_id), Some(3500));

    let (_, order) = get_json(&app, &format!("/orders/{reference}")).await;
    for purchase in order["purchases"].as_array().unwrap() {
        assert_eq!(purchase["status"], "Pending");
        assert!(purchase["payment_reference"].as_str().is_some());
    }
    for print_order in order["print_orders"].as_array().unwrap() {
        assert_eq!(print_order["status"], "Pending");
    }
}

#[tokio::test]
async fn test_duplicate_webhook_delivery_charges_once() {
    let (app, _, payment) = setup();

    let (_, created) = post_json(&app, "/orders", order_request_body()).await;
    let fulfiller_order_id = created["fulfiller_order_id"].as_str().unwrap();

    for _ in 0..3 {
        let (status, _) = post_json(
            &app,
            &webhook_uri(WEBHOOK_SECRET),
            in_progress_payload(fulfiller_order_id),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    assert_eq!(payment.charge_count(), 1);
}

#[tokio::test]
async fn test_declined_charge_cancels_order() {
    let (app, fulfiller, payment) = setup();

    let (_, created) = post_json(&app, "/orders", order_request_body()).await;
    let reference = created["order_reference"].as_str().unwrap();
    let fulfiller_order_id = created["fulfiller_order_id"].as_str().unwrap();

    payment.fail_next_with(fulfillment::DeclineCode::CardDeclined);

    let (status, _) = post_json(
        &app,
        &webhook_uri(WEBHOOK_SECRET),
        in_progress_payload(fulfiller_order_id),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, order) = get_json(&app, &format!("/orders/{reference}")).await;
    for purchase in order["purchases"].as_array().unwrap() {
        assert_eq!(purchase["status"], "Cancelled");
    }
    for print_order in order["print_orders"].as_array().unwrap() {
        assert_eq!(print_order["status"], "Cancelled");
    }
    assert_eq!(fulfiller.cancellation_count(fulfiller_order_id), 1);
}

#[tokio::test]
async fn test_submission_failure_surfaces_as_bad_gateway() {
    let (app, fulfiller, payment) = setup();
    fulfiller.set_fail_on_submit(true);

    let (status, json) = post_json(&app, "/orders", order_request_body()).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(json["error"].as_str().is_some());
    assert_eq!(payment.request_count(), 0);
}

#[tokio::test]
async fn test_get_nonexistent_order() {
    let (app, _, _) = setup();
    let fake_reference = uuid::Uuid::new_v4();

    let (status, _) = get_json(&app, &format!("/orders/{fake_reference}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_order_reference_format() {
    let (app, _, _) = setup();

    let (status, _) = get_json(&app, "/orders/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_customer_order_history() {
    let (app, _, _) = setup();
    let customer_id = uuid::Uuid::new_v4().to_string();

    let mut body = order_request_body();
    body["customer_id"] = serde_json::Value::String(customer_id.clone());
    let (status, _) = post_json(&app, "/orders", body).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, history) = get_json(&app, &format!("/customers/{customer_id}/orders")).await;
    assert_eq!(status, StatusCode::OK);
    let entries = history.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    for entry in entries {
        assert_eq!(entry["purchase"]["product_type"], "Print");
    }
}

#[tokio::test]
async fn test_tracking_fields_surface_in_order_view() {
    let (app, _, _) = setup();

    let (_, created) = post_json(&app, "/orders", order_request_body()).await;
    let reference = created["order_reference"].as_str().unwrap();
    let fulfiller_order_id = created["fulfiller_order_id"].as_str().unwrap();

    let payload = serde_json::json!({
        "specversion": "1.0",
        "type": "com.fulfiller.order.status.stage.changed#Complete",
        "data": {
            "order": {
                "id": fulfiller_order_id,
                "status": { "stage": "Complete" },
                "shipments": [{
                    "carrier": { "name": "DHL" },
                    "tracking": { "number": "TRK-1", "url": "https://track.example/TRK-1" }
                }]
            }
        }
    });
    let (status, _) = post_json(&app, &webhook_uri(WEBHOOK_SECRET), payload).await;
    assert_eq!(status, StatusCode::OK);

    let (_, order) = get_json(&app, &format!("/orders/{reference}")).await;
    for print_order in order["print_orders"].as_array().unwrap() {
        assert_eq!(print_order["carrier"], "DHL");
        assert_eq!(print_order["tracking_number"], "TRK-1");
    }
}
