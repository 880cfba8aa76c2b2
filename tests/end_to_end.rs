//! Integration tests for the `tower::Service` adapter.
//!
//! These tests drive [`DispatchService`] through `tower::ServiceExt::oneshot`,
//! both directly and mounted as an axum fallback service, with streaming
//! request bodies.
//!
//! ## Test Coverage
//!
//! - `test_full_scenario`: Static, parameter and wildcard routes, 404, 405 and
//!   automatic OPTIONS through the adapter
//! - `test_mounted_as_axum_fallback`: The engine serves whatever axum does not
//! - `test_body_is_buffered_for_handlers`: Request bodies reach the handler
//! - `test_body_over_limit_is_413`: `max_body_size` is enforced before dispatch
//! - `test_request_timeout_is_408`: A slow chain is cancelled once `request_timeout` elapses
//! - `test_concurrent_requests_share_the_pool`: Contexts are reused across tasks
//! - `test_versioned_api`: Version detection and deprecation headers end to end

use axum::body::Body;
use axum_dispatch::{Config, Context, DispatchService, Next, Router, middleware};
use http::{Method, Request, Response, StatusCode, header};
use http_body_util::BodyExt;
use std::{sync::Arc, time::Duration};
use tower::ServiceExt;

fn test_config(extra: &str) -> Config {
    let toml_str = format!(
        r#"
[router]
trim_trailing_slash = true
max_body_size = "1KiB"
{extra}

[logging]
format = "json"
        "#
    );
    toml_str.parse().expect("Failed to parse test config TOML")
}

fn app(config: Config) -> DispatchService {
    let mut router = Router::new(config).unwrap();
    router
        .use_middleware(middleware::recover())
        .unwrap()
        .use_middleware(middleware::request_id())
        .unwrap()
        .use_middleware(middleware::logger())
        .unwrap();
    router
        .get("/users/me", |ctx: &mut Context| ctx.text(StatusCode::OK, "me"))
        .unwrap()
        .get("/users/:id", |ctx: &mut Context| {
            let id = ctx.param("id").unwrap_or_default().to_owned();
            ctx.json(StatusCode::OK, &serde_json::json!({ "id": id }));
        })
        .unwrap()
        .post("/users", |ctx: &mut Context| {
            let body = String::from_utf8_lossy(ctx.body()).into_owned();
            ctx.text(StatusCode::CREATED, body);
        })
        .unwrap()
        .get("/files/*path", |ctx: &mut Context| {
            let path = ctx.param("path").unwrap_or_default().to_owned();
            ctx.text(StatusCode::OK, path);
        })
        .unwrap();
    router.freeze().unwrap().into_service()
}

fn request(method: Method, uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(body.into())
        .unwrap()
}

async fn body_string(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8_lossy(&bytes).into_owned()
}

#[tokio::test]
async fn test_full_scenario() {
    let service = app(test_config(""));

    let response = service
        .clone()
        .oneshot(request(Method::GET, "/users/me", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(body_string(response).await, "me");

    let response = service
        .clone()
        .oneshot(request(Method::GET, "/users/42", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    assert_eq!(body_string(response).await, r#"{"id":"42"}"#);

    let response = service
        .clone()
        .oneshot(request(Method::GET, "/files/a/b/c.txt", Body::empty()))
        .await
        .unwrap();
    assert_eq!(body_string(response).await, "a/b/c.txt");

    let response = service
        .clone()
        .oneshot(request(Method::GET, "/nowhere", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = service
        .clone()
        .oneshot(request(Method::DELETE, "/users/42", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()[header::ALLOW], "GET");

    let response = service
        .oneshot(request(Method::OPTIONS, "/users/42", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(response.headers()[header::ALLOW], "GET, OPTIONS");
}

#[tokio::test]
async fn test_mounted_as_axum_fallback() {
    let service = app(test_config(""));
    let axum_app = axum::Router::new()
        .route("/native", axum::routing::get(|| async { "native" }))
        .fallback_service(service);

    let response = axum_app
        .clone()
        .oneshot(request(Method::GET, "/native", Body::empty()))
        .await
        .unwrap();
    assert_eq!(body_string(response).await, "native");

    let response = axum_app
        .oneshot(request(Method::GET, "/users/7", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, r#"{"id":"7"}"#);
}

#[tokio::test]
async fn test_body_is_buffered_for_handlers() {
    let service = app(test_config(""));

    let response = service
        .oneshot(request(Method::POST, "/users", r#"{"name":"ada"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_string(response).await, r#"{"name":"ada"}"#);
}

#[tokio::test]
async fn test_body_over_limit_is_413() {
    let service = app(test_config(""));

    let response = service
        .oneshot(request(Method::POST, "/users", vec![b'x'; 4096]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_request_timeout_is_408() {
    let mut router = Router::new(test_config("request_timeout = \"50ms\"")).unwrap();
    router
        .use_middleware(middleware::from_fn(|ctx: &mut Context, next: Next<'_>| {
            // Simulates slow middleware ahead of the handler.
            std::thread::sleep(Duration::from_millis(200));
            next.run(ctx);
        }))
        .unwrap()
        .get("/slow", |ctx: &mut Context| ctx.text(StatusCode::OK, "too late"))
        .unwrap();
    let service = router.freeze().unwrap().into_service();

    let response = service
        .oneshot(request(Method::GET, "/slow", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
}

#[tokio::test]
async fn test_concurrent_requests_share_the_pool() {
    let service = app(test_config(""));

    let mut tasks = Vec::new();
    for i in 0..32 {
        let service = service.clone();
        tasks.push(tokio::spawn(async move {
            let uri = format!("/users/{i}");
            let response = service
                .oneshot(request(Method::GET, &uri, Body::empty()))
                .await
                .unwrap();
            (i, body_string(response).await)
        }));
    }
    for task in tasks {
        let (i, body) = task.await.unwrap();
        assert_eq!(body, format!(r#"{{"id":"{i}"}}"#));
    }

    let pool = service.engine().pool();
    assert!(pool.created() <= 32);
    assert!(pool.idle() >= 1);
}

#[tokio::test]
async fn test_versioned_api() {
    let config = test_config(
        r#"
[versioning]
default_version = "v2"
allowed_versions = ["v1", "v2"]

[versioning.deprecations.v1]
sunset = "2030-01-01T00:00:00Z"
"#,
    );
    let mut router = Router::new(config).unwrap();
    router
        .version("v1")
        .get("/items", |ctx: &mut Context| ctx.text(StatusCode::OK, "old items"))
        .unwrap();
    router
        .version("v2")
        .get("/items", |ctx: &mut Context| ctx.text(StatusCode::OK, "new items"))
        .unwrap();
    let service = DispatchService::new(Arc::new(router.freeze().unwrap()));

    let response = service
        .clone()
        .oneshot(request(Method::GET, "/v1/items", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.headers()["deprecation"], "true");
    assert_eq!(body_string(response).await, "old items");

    let response = service
        .oneshot(request(Method::GET, "/items", Body::empty()))
        .await
        .unwrap();
    assert!(response.headers().get("deprecation").is_none());
    assert_eq!(body_string(response).await, "new items");
}
