use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use tower::ServiceExt;

use pageshelf::auth::{self, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use pageshelf::clock::{Clock, ManualClock};
use pageshelf::{Authenticator, SecretSet};
use pageshelf_registry::{MemoryKvStorage, MemoryStorage, RateLimitConfig, Registry};
use pageshelf_server::config::ServerConfig;
use pageshelf_server::{AppState, create_router};

const NOW: u64 = 1_700_000_000_000;
const SECRET: &str = "test-secret";

// -- Helpers --------------------------------------------------------------

struct TestApp {
    router: axum::Router,
    clock: Arc<ManualClock>,
}

fn build_app(secret: &str, limit: u64, config: ServerConfig) -> TestApp {
    let clock = Arc::new(ManualClock::new(NOW));
    let registry = Registry::builder(
        Arc::new(MemoryStorage::new()),
        Arc::new(MemoryKvStorage::with_clock(clock.clone())),
    )
    .with_clock(clock.clone())
    .with_rate_limit(RateLimitConfig {
        window_seconds: 60,
        limit,
    })
    .build();

    let authenticator = Authenticator::new(SecretSet::from_csv(secret), 300_000, clock.clone())
        .require_signature(config.require_signature);
    let state = AppState {
        registry: Arc::new(registry),
        authenticator: Arc::new(authenticator),
        config,
    };

    TestApp {
        router: create_router(state),
        clock,
    }
}

fn default_app() -> TestApp {
    build_app(SECRET, 60, ServerConfig::default())
}

fn signed_post(uri: &str, body: serde_json::Value, timestamp: u64) -> Request<Body> {
    let body = serde_json::to_vec(&body).unwrap();
    let ts = timestamp.to_string();
    let signature = auth::sign(SECRET, "POST", uri, &ts, &body);

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(TIMESTAMP_HEADER, ts)
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &TestApp, request: Request<Body>) -> axum::response::Response {
    app.router.clone().oneshot(request).await.unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn text_body(response: axum::response::Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

async fn publish_html(app: &TestApp, slug: &str, html: &str) -> serde_json::Value {
    let response = send(
        app,
        signed_post(
            "/api/publish/html",
            serde_json::json!({"tenant": "alice", "slug": slug, "html": html, "htmlTTL": 60}),
            app.clock.now_millis(),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    json_body(response).await
}

// -- Tests ----------------------------------------------------------------

#[tokio::test]
async fn health_returns_200() {
    let app = default_app();
    let response = send(&app, get("/health")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn publish_then_serve_page() {
    let app = default_app();
    let json = publish_html(&app, "index", "<h1>Hi</h1>").await;
    assert_eq!(json["data"]["pageId"], format!("alice:index:{NOW}"));
    assert_eq!(json["data"]["url"], "/p/alice/");

    let response = send(&app, get("/p/alice/")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/html; charset=utf-8"
    );
    assert_eq!(
        response.headers()[header::CACHE_CONTROL],
        "public, max-age=30, must-revalidate"
    );
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(text_body(response).await, "<h1>Hi</h1>");

    let response = send(&app, get("/api/pages/alice:index")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text_body(response).await, "<h1>Hi</h1>");
}

#[tokio::test]
async fn multi_file_publish_serves_assets() {
    let app = default_app();
    let response = send(
        &app,
        signed_post(
            "/api/publish",
            serde_json::json!({
                "tenant": "alice",
                "slug": "docs",
                "htmlTTL": 120,
                "files": [
                    {"path": "index.html", "content": "<link href=\"/css/site.css\">"},
                    {"path": "css/site.css", "content": "body{}"},
                    {"path": "logo.png", "content": "iVBORw==", "encoding": "base64"}
                ]
            }),
            NOW,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers()["x-ratelimit-remaining"], "59");

    let response = send(&app, get("/p/alice/docs/css/site.css")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "public, max-age=120");
    assert_eq!(text_body(response).await, "body{}");

    let response = send(&app, get("/p/alice/docs/logo.png")).await;
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");

    // asset requested without its slug, found through the referer
    let request = Request::builder()
        .uri("/p/alice/site.css")
        .header(header::REFERER, "https://pages.example.com/p/alice/docs/")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text_body(response).await, "body{}");
}

#[tokio::test]
async fn unsigned_and_stale_requests_are_rejected() {
    let app = default_app();

    let unsigned = Request::builder()
        .method("POST")
        .uri("/api/publish/html")
        .body(Body::from(r#"{"tenant":"alice","html":"x"}"#))
        .unwrap();
    let response = send(&app, unsigned).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["status"], 401);

    let stale = signed_post(
        "/api/publish/html",
        serde_json::json!({"tenant": "alice", "html": "x"}),
        NOW - 301_000,
    );
    assert_eq!(send(&app, stale).await.status(), StatusCode::UNAUTHORIZED);

    // signature over a different path does not carry over
    let mut wrong_path = signed_post(
        "/api/publish",
        serde_json::json!({"tenant": "alice", "html": "x"}),
        NOW,
    );
    *wrong_path.uri_mut() = "/api/publish/html".parse().unwrap();
    assert_eq!(send(&app, wrong_path).await.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(send(&app, get("/p/alice/")).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn validation_errors_are_400() {
    let app = default_app();

    let response = send(
        &app,
        signed_post("/api/publish/html", serde_json::json!({"html": "x"}), NOW),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &app,
        signed_post("/api/publish", serde_json::json!({"tenant": "alice", "files": []}), NOW),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &app,
        signed_post(
            "/api/rollback",
            serde_json::json!({"tenant": "alice", "version": "latest"}),
            NOW,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rollback_and_version_listing() {
    let app = default_app();
    let first = publish_html(&app, "docs", "one").await;
    app.clock.advance_millis(10);
    publish_html(&app, "docs", "two").await;

    let response = send(&app, get("/api/versions/alice/docs")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    let versions: Vec<u64> = json["data"]["versions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["version"].as_u64().unwrap())
        .collect();
    assert_eq!(versions, vec![NOW + 10, NOW]);

    let v1 = first["data"]["version"].as_u64().unwrap();
    let response = send(
        &app,
        signed_post(
            "/api/rollback",
            serde_json::json!({"tenant": "alice", "slug": "docs", "version": v1}),
            app.clock.now_millis(),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, get("/p/alice/docs")).await;
    assert_eq!(response.headers()["x-page-version"], v1.to_string());
    assert_eq!(text_body(response).await, "one");

    let response = send(
        &app,
        signed_post(
            "/api/rollback",
            serde_json::json!({"tenant": "alice", "slug": "docs", "version": 1}),
            app.clock.now_millis(),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn expired_page_is_gone() {
    let app = default_app();
    let response = send(
        &app,
        signed_post(
            "/api/publish/html",
            serde_json::json!({"tenant": "alice", "html": "bye", "deleteAfterSeconds": 600}),
            NOW,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    app.clock.advance_secs(601);
    let response = send(&app, get("/p/alice")).await;
    assert_eq!(response.status(), StatusCode::GONE);

    let json = json_body(send(&app, get("/api/versions/alice/index")).await).await;
    assert!(json["data"]["versions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn publish_is_rate_limited() {
    let app = build_app(SECRET, 1, ServerConfig::default());
    publish_html(&app, "index", "one").await;

    let response = send(
        &app,
        signed_post(
            "/api/publish/html",
            serde_json::json!({"tenant": "alice", "html": "two"}),
            NOW,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()[header::RETRY_AFTER], "60");
}

#[tokio::test]
async fn protected_version_listing_requires_signature() {
    let config = ServerConfig {
        protect_version_listing: true,
        ..ServerConfig::default()
    };
    let app = build_app(SECRET, 60, config);

    let response = send(&app, get("/api/versions/alice/index")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let ts = NOW.to_string();
    let signature = auth::sign(SECRET, "GET", "/api/versions/alice/index", &ts, b"");
    let request = Request::builder()
        .uri("/api/versions/alice/index")
        .header(TIMESTAMP_HEADER, ts)
        .header(SIGNATURE_HEADER, signature)
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, request).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn no_secret_bypasses_auth() {
    let app = build_app("", 60, ServerConfig::default());
    let request = Request::builder()
        .method("POST")
        .uri("/api/publish/html")
        .body(Body::from(r#"{"tenant":"alice","html":"open"}"#))
        .unwrap();

    assert_eq!(send(&app, request).await.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn required_signature_without_secret_rejects_mutations() {
    let config = ServerConfig {
        require_signature: true,
        ..ServerConfig::default()
    };
    let app = build_app("", 60, config);

    let request = Request::builder()
        .method("POST")
        .uri("/api/publish/html")
        .body(Body::from(r#"{"tenant":"alice","html":"open"}"#))
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["status"], 401);

    // reads stay public
    assert_eq!(send(&app, get("/health")).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn empty_body_is_400() {
    let app = default_app();
    let ts = NOW.to_string();
    let signature = auth::sign(SECRET, "POST", "/api/publish", &ts, b"");
    let request = Request::builder()
        .method("POST")
        .uri("/api/publish")
        .header(TIMESTAMP_HEADER, ts)
        .header(SIGNATURE_HEADER, signature)
        .body(Body::empty())
        .unwrap();

    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "Bad request: request body is empty");
}
