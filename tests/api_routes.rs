mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use common::*;
use serde_json::{json, Value};
use society_receipts::api::{router, AppState};
use tower::ServiceExt;

fn app(harness: &Harness) -> Router {
    router(AppState {
        pipeline: harness.pipeline.clone(),
        store: harness.store.clone(),
    })
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

fn empty(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn health_check_answers_ok() {
    let harness = HarnessBuilder::new(vec![]).build().await;
    let app = app(&harness);

    let (status, body) = send(&app, empty(Method::GET, "/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");
}

#[tokio::test]
async fn residents_and_months_are_listed() {
    let harness = HarnessBuilder::new(vec![john(), jane()]).build().await;
    let app = app(&harness);

    let (status, body) = send_json(&app, empty(Method::GET, "/api/residents")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["residents"][0]["displayName"], "John Doe (A-101)");
    assert_eq!(body["residents"][1]["unit"], "B-202");

    let (status, body) = send_json(&app, empty(Method::GET, "/api/months")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["months"].as_array().unwrap().len(), 12);
    assert_eq!(body["months"][0], body["current"]);
}

#[tokio::test]
async fn residents_refresh_reloads_directory() {
    let harness = HarnessBuilder::new(vec![john()]).build().await;
    let app = app(&harness);
    harness.store.state.lock().unwrap().residents.push(jane());

    let (_, cached) = send_json(&app, empty(Method::GET, "/api/residents")).await;
    assert_eq!(cached["residents"].as_array().unwrap().len(), 1);

    let (_, refreshed) = send_json(&app, empty(Method::GET, "/api/residents?refresh=true")).await;
    assert_eq!(refreshed["residents"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn receipt_round_trip_over_http() {
    let john = john();
    let harness = HarnessBuilder::new(vec![john.clone()]).build().await;
    let app = app(&harness);

    let (status, body) = send_json(&app, empty(Method::POST, "/api/sessions")).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["session"]["id"].as_str().unwrap().to_string();

    let upload = Request::builder()
        .method(Method::PUT)
        .uri(format!("/api/sessions/{}/image", id))
        .header(header::CONTENT_TYPE, "image/png")
        .body(Body::from(png_bytes(60, 120)))
        .unwrap();
    let (status, body) = send_json(&app, upload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session"]["hasImage"], true);

    let (status, body) = send_json(&app, empty(Method::POST, &format!("/api/sessions/{}/extract", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session"]["candidate"]["amount"], "3700");
    assert_eq!(body["session"]["selectedMonth"], "May 2025");
    assert_eq!(body["notice"]["level"], "info");

    let patch = Request::builder()
        .method(Method::PATCH)
        .uri(format!("/api/sessions/{}", id))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "residentId": john.id }).to_string()))
        .unwrap();
    let (status, body) = send_json(&app, patch).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session"]["selectedResident"], john.id.to_string());

    let (status, body) = send_json(&app, empty(Method::POST, &format!("/api/sessions/{}/save", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Payment saved successfully!");
    assert!(body["payment"]["screenshotUrl"].is_string());

    let (status, body) = send_json(&app, empty(Method::GET, "/api/payments")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payments"][0]["transaction_id"], "T25050205362948966034486");
    assert_eq!(body["payments"][0]["month_year"], "May 2025");

    let response = app
        .clone()
        .oneshot(empty(Method::GET, "/api/payments/export.csv"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/csv"));
    let csv = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let csv = String::from_utf8(csv.to_vec()).unwrap();
    assert!(csv.starts_with("payment_id,"));
    assert!(csv.contains("T25050205362948966034486"));
    assert!(csv.contains("John Doe,A-101"));
}

#[tokio::test]
async fn wrong_content_type_is_rejected_with_notice() {
    let harness = HarnessBuilder::new(vec![]).build().await;
    let app = app(&harness);
    let (_, body) = send_json(&app, empty(Method::POST, "/api/sessions")).await;
    let id = body["session"]["id"].as_str().unwrap().to_string();

    let upload = Request::builder()
        .method(Method::PUT)
        .uri(format!("/api/sessions/{}/image", id))
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from("hello"))
        .unwrap();
    let (status, body) = send_json(&app, upload).await;

    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["success"], false);
    assert_eq!(body["notice"]["title"], "Invalid file type");
    assert_eq!(body["notice"]["level"], "error");
}

#[tokio::test]
async fn save_with_invalid_amount_is_bad_request() {
    let john = john();
    let harness = HarnessBuilder::new(vec![john.clone()]).build().await;
    let app = app(&harness);
    let (_, body) = send_json(&app, empty(Method::POST, "/api/sessions")).await;
    let id = body["session"]["id"].as_str().unwrap().to_string();

    let patch = Request::builder()
        .method(Method::PATCH)
        .uri(format!("/api/sessions/{}", id))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({
                "candidate": { "amount": "abc" },
                "residentId": john.id,
                "monthYear": "May 2025"
            })
            .to_string(),
        ))
        .unwrap();
    send_json(&app, patch).await;

    let (status, body) = send_json(&app, empty(Method::POST, &format!("/api/sessions/{}/save", id))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["notice"]["title"], "Invalid amount");
    assert!(harness.store.payments().is_empty());
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let harness = HarnessBuilder::new(vec![]).build().await;
    let app = app(&harness);

    let uri = format!("/api/sessions/{}", uuid::Uuid::new_v4());
    let (status, body) = send_json(&app, empty(Method::GET, &uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    let (status, _) = send_json(&app, empty(Method::DELETE, &uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
