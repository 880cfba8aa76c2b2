//! Panics, cancellation, structured errors and dispatch hooks.

use super::*;
use crate::{
    DiagnosticEvent, DiagnosticKind, DispatchHooks, Error, Router, middleware,
    middleware::REQUEST_ID_HEADER,
};
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;

fn panicking(_: &mut Context) {
    panic!("database exploded");
}

fn recording_sink() -> (
    Arc<Mutex<Vec<DiagnosticEvent>>>,
    impl Fn(DiagnosticEvent) + Send + Sync + 'static,
) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = {
        let events = events.clone();
        move |event: DiagnosticEvent| events.lock().push(event)
    };
    (events, sink)
}

#[test]
#[traced_test]
fn test_unrecovered_panic_becomes_500_and_diagnostic() {
    let (events, sink) = recording_sink();
    let mut router = Router::with_diagnostics(create_base_config(), sink).unwrap();
    router.get("/boom", panicking).unwrap();
    let engine = router.freeze().unwrap();

    let response = engine.dispatch(get_request("/boom"));
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_string(&response), "Internal Server Error");
    assert!(logs_contain("Handler panicked: database exploded"));

    let events = events.lock();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind(), DiagnosticKind::HandlerPanic);
    assert_eq!(events[0].field("method"), Some("GET"));
    assert_eq!(events[0].field("path"), Some("/boom"));
    assert_eq!(events[0].field("panic"), Some("database exploded"));
}

#[test]
fn test_verbose_errors_expose_panic_message() {
    let config = create_config_with_toml("[router]\nverbose_errors = true");
    let mut router = Router::new(config).unwrap();
    router.get("/boom", panicking).unwrap();
    let engine = router.freeze().unwrap();

    let response = engine.dispatch(get_request("/boom"));
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_string(&response),
        "Internal Server Error: database exploded"
    );
}

#[test]
fn test_recover_middleware_keeps_outer_middleware_running() {
    let (events, sink) = recording_sink();
    let mut router = Router::with_diagnostics(create_base_config(), sink).unwrap();
    router
        .use_middleware(middleware::request_id())
        .unwrap()
        .use_middleware(middleware::recover())
        .unwrap()
        .get("/boom", panicking)
        .unwrap();
    let engine = router.freeze().unwrap();

    let response = engine.dispatch(get_request("/boom"));
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    // request_id wraps recover, so its post-processing still ran.
    assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    assert!(events.lock().is_empty());
}

#[test]
fn test_context_is_released_after_panic() {
    let mut router = Router::new(create_base_config()).unwrap();
    router
        .get("/boom", panicking)
        .unwrap()
        .get("/ok", |ctx: &mut Context| {
            let clean = !ctx.is_aborted() && !ctx.is_committed();
            ctx.text(StatusCode::OK, clean.to_string());
        })
        .unwrap();
    let engine = router.freeze().unwrap();

    engine.dispatch(get_request("/boom"));
    engine.dispatch(get_request("/boom"));
    let response = engine.dispatch(get_request("/ok"));
    assert_eq!(body_string(&response), "true");
    assert_eq!(engine.pool().created(), 1);
    assert_eq!(engine.pool().idle(), 1);
}

#[test]
fn test_abort_with_error_renders_json() {
    let mut router = Router::new(create_base_config()).unwrap();
    router
        .post("/users", |ctx: &mut Context| {
            if ctx.body().is_empty() {
                ctx.abort_with_error(Error::invalid_input("request body is required"));
                return;
            }
            ctx.text(StatusCode::CREATED, "created");
        })
        .unwrap();
    let engine = router.freeze().unwrap();

    let response = engine.dispatch(request(Method::POST, "/users"));
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()["content-type"], "application/json");
    let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body["error_code"], "INVALID_INPUT");
    assert_eq!(body["message"], "request body is required");
}

#[test]
fn test_cancelled_request_is_408() {
    let mut router = Router::new(create_base_config()).unwrap();
    router.get("/slow", reply("done")).unwrap();
    let engine = router.freeze().unwrap();

    let token = CancellationToken::new();
    token.cancel();
    let response = engine.dispatch_with_cancellation(get_request("/slow"), token);
    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    assert_eq!(body_string(&response), "Request Timeout");
}

#[test]
fn test_cancellation_mid_chain_runs_entered_middleware() {
    let token = CancellationToken::new();
    let trigger = token.clone();

    let mut router = Router::new(create_base_config()).unwrap();
    router
        .use_middleware(from_fn(|ctx: &mut Context, next: Next<'_>| {
            next.run(ctx);
            ctx.response_headers_mut()
                .insert("x-cleanup", http::HeaderValue::from_static("ran"));
        }))
        .unwrap()
        .use_middleware(from_fn(move |ctx: &mut Context, next: Next<'_>| {
            trigger.cancel();
            next.run(ctx);
        }))
        .unwrap()
        .get("/slow", reply("handler ran"))
        .unwrap();
    let engine = router.freeze().unwrap();

    let response = engine.dispatch_with_cancellation(get_request("/slow"), token);
    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    assert_eq!(response.headers()["x-cleanup"], "ran");
    assert_ne!(body_string(&response), "handler ran");
}

#[test]
fn test_uncancelled_token_does_not_interfere() {
    let mut router = Router::new(create_base_config()).unwrap();
    router.get("/fast", reply("fast")).unwrap();
    let engine = router.freeze().unwrap();

    let response = engine.dispatch_with_cancellation(get_request("/fast"), CancellationToken::new());
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(&response), "fast");
}

#[derive(Default)]
struct RecordingHooks {
    started: Mutex<Vec<String>>,
    finished: Mutex<Vec<(String, u16)>>,
}

impl DispatchHooks for RecordingHooks {
    fn on_start(&self, ctx: &Context) {
        self.started.lock().push(ctx.path().to_owned());
    }

    fn on_finish(&self, ctx: &Context, status: StatusCode, elapsed: Duration) {
        assert!(elapsed < Duration::from_secs(5));
        let route = ctx
            .route()
            .map(|r| r.pattern().to_string())
            .unwrap_or_else(|| "-".into());
        self.finished.lock().push((route, status.as_u16()));
    }
}

#[test]
fn test_hooks_bracket_every_dispatch() {
    let hooks = Arc::new(RecordingHooks::default());
    let mut router = Router::new(create_base_config()).unwrap();
    router
        .hooks(hooks.clone())
        .unwrap()
        .get("/users/:id", echo_param("id"))
        .unwrap()
        .get("/boom", panicking)
        .unwrap();
    let engine = router.freeze().unwrap();

    engine.dispatch(get_request("/users/1"));
    engine.dispatch(get_request("/missing"));
    engine.dispatch(get_request("/boom"));

    assert_eq!(
        *hooks.started.lock(),
        vec!["/users/1", "/missing", "/boom"]
    );
    assert_eq!(
        *hooks.finished.lock(),
        vec![
            ("/users/:id".to_string(), 200),
            ("-".to_string(), 404),
            ("/boom".to_string(), 500),
        ]
    );
}
