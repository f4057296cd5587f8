use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use codeblue::blob::MemoryBlobStore;
use codeblue::severity::KeywordScorer;
use codeblue::store::Store;
use codeblue::{app, AppState};

fn test_app() -> Router {
    let state = AppState::new(
        Store::memory(),
        Arc::new(MemoryBlobStore::new()),
        Arc::new(KeywordScorer),
        b"test-secret",
    );
    app(state)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    identity: Option<(&str, &str)>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((id, role)) = identity {
        builder = builder.header("x-user-id", id).header("x-user-role", role);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn send_raw(
    app: &Router,
    uri: &str,
) -> (StatusCode, Option<String>, Vec<u8>) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, content_type, bytes.to_vec())
}

async fn register(app: &Router, body: Value) -> String {
    let (status, user) = send(app, "POST", "/api/users", None, Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    user["id"].as_str().unwrap().to_string()
}

/// Patient + licensed hospital + compatible driver, one triggered
/// emergency. Returns (patient, hospital, emergency id).
async fn dispatched_case(app: &Router) -> (String, String, String) {
    let patient = register(app, json!({"name": "Asha", "role": "patient"})).await;
    let hospital = register(
        app,
        json!({
            "name": "City General",
            "role": "hospital",
            "licenseNumber": "H1",
            "location": {"lat": 28.61, "lng": 77.21}
        }),
    )
    .await;
    register(
        app,
        json!({
            "name": "Unit 7",
            "role": "driver",
            "linkedHospitalLicense": "H1",
            "location": {"lat": 28.62, "lng": 77.22}
        }),
    )
    .await;
    let (status, created) = send(
        app,
        "POST",
        "/api/emergencies",
        Some((&patient, "patient")),
        Some(json!({
            "location": {"lat": 28.60, "lng": 77.20},
            "symptoms": "heavy bleeding"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["emergency"]["id"].as_str().unwrap().to_string();
    (patient, hospital, id)
}

#[tokio::test]
async fn test_upload_then_view_with_token() {
    let app = test_app();
    let (patient, _, emergency) = dispatched_case(&app).await;

    let (status, uploaded) = send(
        &app,
        "POST",
        &format!("/api/emergencies/{emergency}/documents"),
        Some((&patient, "patient")),
        Some(json!({
            "fileName": "scan.png",
            "contentType": "image/png",
            "type": "scan",
            "data": STANDARD.encode(b"png-bytes")
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let token = uploaded["viewToken"].as_str().unwrap();

    let (status, content_type, bytes) =
        send_raw(&app, &format!("/api/documents/view?token={token}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("image/png"));
    assert_eq!(bytes, b"png-bytes");
}

#[tokio::test]
async fn test_intake_report_listed_for_hospital() {
    let app = test_app();
    let (_, hospital, emergency) = dispatched_case(&app).await;

    // The trigger attached a generated intake report; the assigned
    // hospital can list and read it.
    let (status, listed) = send(
        &app,
        "GET",
        &format!("/api/emergencies/{emergency}/documents"),
        Some((&hospital, "hospital")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["type"], "report");

    let token = listed[0]["viewToken"].as_str().unwrap();
    let (status, content_type, bytes) =
        send_raw(&app, &format!("/api/documents/view?token={token}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("text/plain"));
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.contains("heavy bleeding"));
}

#[tokio::test]
async fn test_garbage_token_is_unauthorized() {
    let app = test_app();
    dispatched_case(&app).await;
    let (status, _, _) = send_raw(&app, "/api/documents/view?token=not.a.token").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_upload_to_foreign_emergency_is_forbidden() {
    let app = test_app();
    let (_, _, emergency) = dispatched_case(&app).await;
    let other = register(&app, json!({"name": "Ravi", "role": "patient"})).await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/emergencies/{emergency}/documents"),
        Some((&other, "patient")),
        Some(json!({
            "fileName": "x.txt",
            "contentType": "text/plain",
            "type": "other",
            "data": STANDARD.encode(b"x")
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "forbidden");
}

#[tokio::test]
async fn test_listing_requires_participation() {
    let app = test_app();
    let (_, _, emergency) = dispatched_case(&app).await;
    let outsider = register(
        &app,
        json!({"name": "Other Hospital", "role": "hospital", "licenseNumber": "H9"}),
    )
    .await;

    let (status, _) = send(
        &app,
        "GET",
        &format!("/api/emergencies/{emergency}/documents"),
        Some((&outsider, "hospital")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_invalid_base64_is_rejected() {
    let app = test_app();
    let (patient, _, emergency) = dispatched_case(&app).await;
    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/emergencies/{emergency}/documents"),
        Some((&patient, "patient")),
        Some(json!({
            "fileName": "x.bin",
            "contentType": "application/octet-stream",
            "type": "other",
            "data": "!!! not base64 !!!"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_failed");
}
