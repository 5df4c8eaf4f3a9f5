mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::FakeDurableStore;

// ---------------------------------------------------------------------------
// POST /api/save-doc
// ---------------------------------------------------------------------------

#[tokio::test]
async fn save_doc_uses_database_when_connected() {
    let durable = FakeDurableStore::connected();
    let (app, _state) = common::test_app(durable.clone());
    let server = TestServer::new(app).unwrap();

    let resp = server
        .post("/api/save-doc")
        .json(&json!({ "room": "r1", "content": "hello" }))
        .await;
    resp.assert_status_ok();

    let body: Value = resp.json();
    assert_eq!(body["message"], "Document saved to database");
    assert_eq!(body["documentId"], "1");
    assert!(body["timestamp"].is_string());
    assert_eq!(durable.row_count(), 1);
}

#[tokio::test]
async fn save_doc_falls_back_to_memory_when_disconnected() {
    let durable = FakeDurableStore::disconnected();
    let (app, _state) = common::test_app(durable.clone());
    let server = TestServer::new(app).unwrap();

    let resp = server
        .post("/api/save-doc")
        .json(&json!({ "room": "r1", "content": "hello" }))
        .await;
    resp.assert_status_ok();

    let body: Value = resp.json();
    assert_eq!(
        body["message"],
        "Document saved to memory (database not available)"
    );
    assert_eq!(body["documentId"], "mem-r1");
    assert_eq!(durable.row_count(), 0);

    // Still readable while the database is down
    let resp = server.get("/api/docs/r1").await;
    resp.assert_status_ok();
    let doc: Value = resp.json();
    assert_eq!(doc["content"], "hello");
    assert_eq!(doc["tier"], "volatile");
}

#[tokio::test]
async fn save_doc_returns_to_database_after_reconnect() {
    let durable = FakeDurableStore::disconnected();
    let (app, _state) = common::test_app(durable.clone());
    let server = TestServer::new(app).unwrap();

    let resp = server
        .post("/api/save-doc")
        .json(&json!({ "room": "r1", "content": "hello" }))
        .await;
    assert_eq!(resp.json::<Value>()["documentId"], "mem-r1");

    durable.set_connected(true);

    let resp = server
        .post("/api/save-doc")
        .json(&json!({ "room": "r1", "content": "hello2" }))
        .await;
    resp.assert_status_ok();
    assert_eq!(resp.json::<Value>()["message"], "Document saved to database");

    let doc: Value = server.get("/api/docs/r1").await.json();
    assert_eq!(doc["content"], "hello2");
    assert_eq!(doc["tier"], "durable");
}

#[tokio::test]
async fn save_doc_twice_keeps_one_document() {
    let durable = FakeDurableStore::connected();
    let (app, _state) = common::test_app(durable.clone());
    let server = TestServer::new(app).unwrap();

    let first: Value = server
        .post("/api/save-doc")
        .json(&json!({ "room": "r1", "content": "hello" }))
        .await
        .json();
    let second: Value = server
        .post("/api/save-doc")
        .json(&json!({ "room": "r1", "content": "hello2" }))
        .await
        .json();

    assert_eq!(first["documentId"], second["documentId"]);
    assert_eq!(durable.row_count(), 1);

    let doc: Value = server.get("/api/docs/r1").await.json();
    assert_eq!(doc["room"], "r1");
    assert_eq!(doc["content"], "hello2");
    assert!(doc["updatedAt"].is_string());
}

#[tokio::test]
async fn save_doc_keeps_nul_bytes() {
    let durable = FakeDurableStore::connected();
    let (app, _state) = common::test_app(durable.clone());
    let server = TestServer::new(app).unwrap();

    let resp = server
        .post("/api/save-doc")
        .json(&json!({ "room": "r1", "content": "a\0b" }))
        .await;
    resp.assert_status_ok();
    assert_eq!(resp.json::<Value>()["message"], "Document saved to database");

    let doc: Value = server.get("/api/docs/r1").await.json();
    assert_eq!(doc["content"], "a\0b");
}

#[tokio::test]
async fn save_doc_missing_fields_is_bad_request() {
    let durable = FakeDurableStore::connected();
    let (app, _state) = common::test_app(durable.clone());
    let server = TestServer::new(app).unwrap();

    let resp = server
        .post("/api/save-doc")
        .json(&json!({ "content": "hello" }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = resp.json();
    assert_eq!(body["error"], "Bad request");
    assert_eq!(body["message"], "room is required");

    let resp = server
        .post("/api/save-doc")
        .json(&json!({ "room": "r1" }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(resp.json::<Value>()["message"], "content is required");

    let resp = server
        .post("/api/save-doc")
        .json(&json!({ "room": "", "content": "hello" }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    assert_eq!(durable.row_count(), 0);
}

#[tokio::test]
async fn save_doc_malformed_body_is_bad_request() {
    let (app, _state) = common::test_app(FakeDurableStore::connected());

    let resp = app
        .oneshot(
            Request::post("/api/save-doc")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "Bad request");
}

#[tokio::test]
async fn save_doc_rejected_write_is_service_unavailable() {
    let durable = FakeDurableStore::connected();
    durable.reject_writes();
    let (app, _state) = common::test_app(durable);
    let server = TestServer::new(app).unwrap();

    let resp = server
        .post("/api/save-doc")
        .json(&json!({ "room": "r1", "content": "hello" }))
        .await;
    resp.assert_status(StatusCode::SERVICE_UNAVAILABLE);

    let body: Value = resp.json();
    assert_eq!(body["error"], "Service unavailable");
    assert_eq!(body["message"], "Document could not be saved");
    assert!(body["details"]
        .as_str()
        .unwrap()
        .contains("value too long for type"));

    // No silent downgrade
    server.get("/api/docs/r1").await.assert_status_not_found();
}

// ---------------------------------------------------------------------------
// GET /api/health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_database_state() {
    let durable = FakeDurableStore::connected();
    let (app, _state) = common::test_app(durable.clone());
    let server = TestServer::new(app).unwrap();

    let body: Value = server.get("/api/health").await.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["dbState"], "connected");
    assert!(body["timestamp"].is_string());

    durable.set_connected(false);
    let body: Value = server.get("/api/health").await.json();
    assert_eq!(body["dbState"], "memory");
}

// ---------------------------------------------------------------------------
// GET /api/docs/{room}
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_doc_unknown_room_is_not_found() {
    let (app, _state) = common::test_app(FakeDurableStore::connected());
    let server = TestServer::new(app).unwrap();

    let resp = server.get("/api/docs/nowhere").await;
    resp.assert_status_not_found();
    assert_eq!(resp.json::<Value>()["error"], "Not found");
}

// ---------------------------------------------------------------------------
// Plumbing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_endpoint_responds() {
    let (app, _state) = common::test_app(FakeDurableStore::connected());
    let server = TestServer::new(app).unwrap();

    let resp = server.get("/test").await;
    resp.assert_status_ok();
    resp.assert_text("Server is working");
}

#[tokio::test]
async fn editor_and_static_files_are_served() {
    let dir = common::static_dir("editor");
    std::fs::write(dir.join("editor.html"), "<h1>editor</h1>").unwrap();
    std::fs::write(dir.join("app.js"), "console.log(1);").unwrap();

    let state = common::test_state(FakeDurableStore::connected(), common::test_config(dir));
    let server = TestServer::new(docsync_server::app(state)).unwrap();

    let resp = server.get("/editor.html").await;
    resp.assert_status_ok();
    resp.assert_text("<h1>editor</h1>");

    let resp = server.get("/app.js").await;
    resp.assert_status_ok();
    resp.assert_text("console.log(1);");
}

#[tokio::test]
async fn editor_missing_is_not_found() {
    let (app, _state) = common::test_app(FakeDurableStore::connected());
    let server = TestServer::new(app).unwrap();

    let resp = server.get("/editor.html").await;
    resp.assert_status_not_found();
    resp.assert_text("Editor file not found");
}

#[tokio::test]
async fn editor_is_served_as_stored_bytes() {
    let dir = common::static_dir("editor-bytes");
    let raw: &[u8] = &[0xff, 0xfe, b'<', b'p', b'>'];
    std::fs::write(dir.join("editor.html"), raw).unwrap();

    let state = common::test_state(FakeDurableStore::connected(), common::test_config(dir));
    let resp = docsync_server::app(state)
        .oneshot(Request::get("/editor.html").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()[header::CONTENT_TYPE],
        "text/html; charset=utf-8"
    );
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], raw);
}

#[tokio::test]
async fn editor_unreadable_is_server_error() {
    let dir = common::static_dir("editor-unreadable");
    // A directory where the file should be fails to read without being missing
    std::fs::create_dir(dir.join("editor.html")).unwrap();

    let state = common::test_state(FakeDurableStore::connected(), common::test_config(dir));
    let server = TestServer::new(docsync_server::app(state)).unwrap();

    let resp = server.get("/editor.html").await;
    resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    resp.assert_text("Error loading editor");
}

#[tokio::test]
async fn cors_echoes_allowed_origin_only() {
    let (app, _state) = common::test_app(FakeDurableStore::connected());

    let resp = app
        .clone()
        .oneshot(
            Request::get("/api/health")
                .header(header::ORIGIN, common::ALLOWED_ORIGIN)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        common::ALLOWED_ORIGIN
    );
    assert_eq!(
        resp.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS],
        "true"
    );

    let resp = app
        .oneshot(
            Request::get("/api/health")
                .header(header::ORIGIN, "http://evil.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(resp
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}
