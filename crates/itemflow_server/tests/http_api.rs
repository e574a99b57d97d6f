use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use itemflow_core::db::open_db_in_memory;
use itemflow_core::{ProcessorConfig, SqliteItemRepository};
use itemflow_server::{router, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> (Router, AppState) {
    let repo = SqliteItemRepository::try_new(open_db_in_memory().unwrap()).unwrap();
    let state = AppState::new(repo, ProcessorConfig::default());
    (router(state.clone()), state)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, value)
}

fn item_body(name: &str, email: &str) -> Value {
    json!({
        "id": 1,
        "name": name,
        "description": "Test Desc",
        "status": "NEW",
        "email": email,
    })
}

#[tokio::test]
async fn health_returns_pong() {
    let (app, _) = app();
    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("pong".to_string()));
}

#[tokio::test]
async fn create_then_list_and_get() {
    let (app, _) = app();

    let (status, created) = send(
        &app,
        Method::POST,
        "/api/items",
        Some(item_body("Test Name", "test@example.com")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["email"], "test@example.com");
    let id = created["id"].as_i64().unwrap();

    let (status, listed) = send(&app, Method::GET, "/api/items", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed[0]["name"], "Test Name");

    let (status, fetched) = send(&app, Method::GET, &format!("/api/items/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["name"], "Test Name");
}

#[tokio::test]
async fn create_with_invalid_email_is_bad_request() {
    let (app, _) = app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/items",
        Some(item_body("Test Name", "bad-email")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"][0].as_str().unwrap().contains("bad-email"));

    let (_, listed) = send(&app, Method::GET, "/api/items", None).await;
    assert_eq!(listed, json!([]));
}

#[tokio::test]
async fn create_with_malformed_body_is_bad_request() {
    let (app, _) = app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/items",
        Some(json!({ "name": "missing email" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"].is_array());
}

#[tokio::test]
async fn get_missing_item_is_not_found() {
    let (app, _) = app();
    let (status, _) = send(&app, Method::GET, "/api/items/99", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_existing_item_replaces_fields() {
    let (app, _) = app();
    let (_, created) = send(
        &app,
        Method::POST,
        "/api/items",
        Some(item_body("Test Name", "test@example.com")),
    )
    .await;
    let id = created["id"].as_i64().unwrap();

    let (status, updated) = send(
        &app,
        Method::PUT,
        &format!("/api/items/{id}"),
        Some(item_body("Renamed", "renamed@example.com")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["id"], id);
    assert_eq!(updated["name"], "Renamed");
    assert_eq!(updated["email"], "renamed@example.com");
}

#[tokio::test]
async fn update_missing_item_is_not_found() {
    let (app, _) = app();
    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/items/999",
        Some(item_body("Test Name", "test@example.com")),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_with_invalid_email_is_bad_request() {
    let (app, _) = app();
    let (_, created) = send(
        &app,
        Method::POST,
        "/api/items",
        Some(item_body("Test Name", "test@example.com")),
    )
    .await;
    let id = created["id"].as_i64().unwrap();

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/items/{id}"),
        Some(item_body("Test Name", "nope")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_returns_no_content_even_when_missing() {
    let (app, _) = app();
    let (_, created) = send(
        &app,
        Method::POST,
        "/api/items",
        Some(item_body("Test Name", "test@example.com")),
    )
    .await;
    let id = created["id"].as_i64().unwrap();

    let (status, _) = send(&app, Method::DELETE, &format!("/api/items/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::DELETE, &format!("/api/items/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, Method::GET, &format!("/api/items/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn process_marks_every_item_processed() {
    let (app, state) = app();
    for (name, email) in [
        ("Test Name", "test@example.com"),
        ("Test Name2", "test2@example.com"),
    ] {
        send(&app, Method::POST, "/api/items", Some(item_body(name, email))).await;
    }

    let (status, processed) = send(&app, Method::GET, "/api/items/process", None).await;
    assert_eq!(status, StatusCode::OK);
    let processed = processed.as_array().unwrap();
    assert_eq!(processed.len(), 2);
    assert!(processed.iter().all(|item| item["status"] == "PROCESSED"));
    assert_eq!(state.processor().processed_total(), 2);

    let (_, listed) = send(&app, Method::GET, "/api/items", None).await;
    assert!(listed
        .as_array()
        .unwrap()
        .iter()
        .all(|item| item["status"] == "PROCESSED"));
}
