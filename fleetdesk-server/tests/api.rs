use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use fleetdesk_server::app;
use fleetdesk_server::state::AppState;

fn make_test_app() -> Router {
    app(AppState::in_memory())
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn create_car(app: &Router, label: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/resources",
        Some(json!({ "label": label, "kind": "car" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "create resource: {}", body);
    body["id"].as_str().unwrap().to_string()
}

async fn request_booking(app: &Router, start: &str, end: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/bookings",
        Some(json!({
            "requester": "ana@example.com",
            "window": { "kind": "range", "start": start, "end": end },
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "create booking: {}", body);
    assert_eq!(body["status"], "pending");
    body["id"].as_str().unwrap().to_string()
}

async fn assign_and_approve(app: &Router, booking: &str, resource: &str) {
    let (status, body) = send(
        app,
        Method::POST,
        &format!("/bookings/{}/assign", booking),
        Some(json!({ "resource_id": resource })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "assign: {}", body);

    let (status, body) = send(app, Method::POST, &format!("/bookings/{}/approve", booking), None).await;
    assert_eq!(status, StatusCode::OK, "approve: {}", body);
    assert_eq!(body["status"], "approved");
}

#[tokio::test]
async fn test_health() {
    let app = make_test_app();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_overlapping_assignment_is_409_with_conflict_body() {
    let app = make_test_app();
    let r1 = create_car(&app, "R1").await;

    let a = request_booking(&app, "2025-03-20T09:00:00Z", "2025-03-20T10:00:00Z").await;
    assign_and_approve(&app, &a, &r1).await;

    let b = request_booking(&app, "2025-03-20T09:30:00Z", "2025-03-20T10:30:00Z").await;
    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/bookings/{}/assign", b),
        Some(json!({ "resource_id": r1 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");
    assert_eq!(body["conflict"]["kind"], "schedule_overlap");
    assert_eq!(body["conflict"]["booking_id"], a.as_str());

    let (_, body) = send(&app, Method::GET, &format!("/bookings/{}", b), None).await;
    assert_eq!(body["status"], "pending", "conflict leaves B untouched");
}

#[tokio::test]
async fn test_maintenance_resource_is_unavailable_for_any_window() {
    let app = make_test_app();
    let r2 = create_car(&app, "R2").await;
    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/resources/{}/status", r2),
        Some(json!({ "status": "maintenance" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    for (start, end) in [
        ("2025-03-20T09:00", "2025-03-20T10:00"),
        ("2031-01-01T00:00", "2031-01-02T00:00"),
    ] {
        let (status, body) = send(
            &app,
            Method::GET,
            &format!("/availability?resource_id={}&start={}&end={}", r2, start, end),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["verdict"], "conflict");
        assert_eq!(body["conflict"]["kind"], "resource_unavailable");
    }
}

#[tokio::test]
async fn test_lifecycle_errors_map_to_status_codes() {
    let app = make_test_app();
    let booking = request_booking(&app, "2025-03-20T09:00:00Z", "2025-03-20T10:00:00Z").await;

    let (status, body) = send(&app, Method::POST, &format!("/bookings/{}/approve", booking), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "no_resource_assigned");
    assert_eq!(body["booking_id"], booking.as_str());

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/bookings/{}/reject", booking),
        Some(json!({ "reason": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "missing_reason");

    let (status, _) = send(&app, Method::POST, &format!("/bookings/{}/cancel", booking), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::POST, &format!("/bookings/{}/cancel", booking), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "invalid_transition");
    assert_eq!(body["status"], "cancelled");
    assert_eq!(body["transition"], "cancel");

    let (status, body) = send(&app, Method::GET, "/bookings/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "booking_not_found");
    assert_eq!(body["booking_id"], "nope");
}

#[tokio::test]
async fn test_history_pages() {
    let app = make_test_app();
    for i in 0..12 {
        let booking = request_booking(
            &app,
            &format!("2025-03-{:02}T09:00:00Z", i + 1),
            &format!("2025-03-{:02}T10:00:00Z", i + 1),
        )
        .await;
        send(
            &app,
            Method::POST,
            &format!("/bookings/{}/reject", booking),
            Some(json!({ "reason": "no drivers" })),
        )
        .await;
    }

    let (status, body) = send(&app, Method::GET, "/history?status=rejected&page=2&page_size=5", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 12);
    assert_eq!(body["page"], 2);
    assert_eq!(body["items"].as_array().unwrap().len(), 5);

    let (_, body) = send(&app, Method::GET, "/history?status=rejected&page=9&page_size=5", None).await;
    assert!(body["items"].as_array().unwrap().is_empty());

    let (status, body) = send(&app, Method::GET, "/history?status=pending", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_input");
}

#[tokio::test]
async fn test_assignment_map_and_checkout() {
    let app = make_test_app();
    let r1 = create_car(&app, "R1").await;
    let booking = request_booking(&app, "2025-03-20T09:00:00Z", "2025-03-20T10:00:00Z").await;
    assign_and_approve(&app, &booking, &r1).await;

    let (_, body) = send(&app, Method::GET, "/assignments", None).await;
    assert_eq!(body[r1.as_str()], json!([booking]));

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/resources/{}/in-use", r1),
        Some(json!({ "in_use": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["in_use"], true);

    let other = request_booking(&app, "2025-03-21T09:00:00Z", "2025-03-21T10:00:00Z").await;
    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/bookings/{}/assign", other),
        Some(json!({ "resource_id": r1 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["conflict"]["kind"], "checked_out");
}
