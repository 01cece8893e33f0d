//! HTTP control surface, exercised through the router without a socket

mod helpers;

use ambience_ap::api::{create_router, AppContext};
use axum::body::Body;
use axum::http::StatusCode;
use http::{Method, Request};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;

use helpers::*;

async fn make_request(
    app: &axum::Router,
    method: Method,
    path: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(path);
    let body = match body {
        Some(json) => {
            request = request.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn setup() -> (axum::Router, TestEngine) {
    let test = started_engine("/").await;
    settle().await;
    let router = create_router(AppContext {
        engine: test.engine.clone(),
    });
    (router, test)
}

#[tokio::test(start_paused = true)]
async fn test_health() {
    let (app, _test) = setup().await;
    let (status, body) = make_request(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["module"], "ambience-ap");
}

#[tokio::test(start_paused = true)]
async fn test_status_snapshot() {
    let (app, _test) = setup().await;
    let (status, body) = make_request(&app, Method::GET, "/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "phase": "playing",
            "current_loop": "main",
            "page": "main",
            "muted": false,
            "effects_suppressed": false,
            "visualizer_active": true,
            "audio": "available",
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_toggles() {
    let (app, test) = setup().await;

    let (_, body) = make_request(&app, Method::POST, "/mute/toggle", None).await;
    assert_eq!(body, json!({ "muted": true }));
    assert!(test.engine.status().muted);

    let (_, body) = make_request(&app, Method::POST, "/effects/toggle", None).await;
    assert_eq!(body, json!({ "suppressed": true }));

    let (_, body) = make_request(&app, Method::POST, "/mute/toggle", None).await;
    assert_eq!(body, json!({ "muted": false }));
}

#[tokio::test(start_paused = true)]
async fn test_click() {
    let (app, _test) = setup().await;

    let (status, body) = make_request(&app, Method::POST, "/click", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "played");

    let (_, body) = make_request(&app, Method::POST, "/click", Some(json!({ "volume": 0.2 }))).await;
    assert_eq!(body["outcome"], "cooling_down");

    let (status, _) = make_request(&app, Method::POST, "/click", Some(json!({ "volume": 2.0 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test(start_paused = true)]
async fn test_link_interception() {
    let (app, test) = setup().await;
    let mut rx = test.engine.subscribe_events();

    let (status, body) = make_request(
        &app,
        Method::POST,
        "/navigation/link",
        Some(json!({ "href": "/login" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "action": "navigate", "path": "/login", "page": "login" }));
    assert_eq!(test.engine.status().current_loop.as_deref(), Some("login"));

    let navigated = drain_events(&mut rx).into_iter().any(|e| {
        matches!(e, ambience_common::AmbienceEvent::NavigateRequested { ref path, .. } if path == "/login")
    });
    assert!(navigated);

    // The host reporting the completed navigation changes nothing further
    let (_, body) = make_request(
        &app,
        Method::POST,
        "/navigation/location",
        Some(json!({ "path": "/login" })),
    )
    .await;
    assert_eq!(body, json!({ "changed": false, "page": "login" }));
}

#[tokio::test(start_paused = true)]
async fn test_untracked_links_fall_through() {
    let (app, test) = setup().await;

    for request in [
        json!({ "href": "https://example.com/about" }),
        json!({ "href": "/create", "target": "_blank" }),
    ] {
        let (_, body) = make_request(&app, Method::POST, "/navigation/link", Some(request)).await;
        assert_eq!(body, json!({ "action": "default" }));
    }
    assert_eq!(test.engine.status().current_loop.as_deref(), Some("main"));
}

#[tokio::test(start_paused = true)]
async fn test_location_change_transitions() {
    let (app, test) = setup().await;

    let (_, body) = make_request(
        &app,
        Method::POST,
        "/navigation/location",
        Some(json!({ "path": "/create" })),
    )
    .await;
    assert_eq!(body, json!({ "changed": true, "page": "create" }));

    let (_, body) = make_request(&app, Method::GET, "/status", None).await;
    assert_eq!(body["phase"], "transitioning");

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(test.engine.status().current_loop.as_deref(), Some("create"));

    let (status, _) = make_request(
        &app,
        Method::POST,
        "/navigation/location",
        Some(json!({ "path": "create" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
