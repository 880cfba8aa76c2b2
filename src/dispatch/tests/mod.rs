//! Test helpers for dispatch tests.
//!
//! These tests drive [`Engine::dispatch`](crate::Engine::dispatch) directly
//! with buffered requests; the `tower::Service` adapter is covered by the
//! integration tests in `tests/`.
//!
//! ## Available Helpers
//!
//! - Configuration builders: `create_base_config()`, `create_config_with_toml()`
//! - Request helpers: `request()`, `get_request()`
//! - Response helpers: `body_string()`
//! - Handlers and middleware: `reply()`, `echo_param()`, `mark()`, `trace_of()`

use crate::{Config, Context, Middleware, Next, middleware::from_fn};
use bytes::Bytes;
use http::{Method, Request, Response, StatusCode};

pub(crate) mod failures;
pub(crate) mod groups;

// ============================================================================
// Configuration Helpers
// ============================================================================

const BASE_CONFIG_TOML: &str = r#"
[router]
trim_trailing_slash = true
max_idle_contexts = 16

[logging]
format = "json"
"#;

/// Base configuration. Parsed from TOML so tests never depend on `RUST_ENV`.
pub(crate) fn create_base_config() -> Config {
    BASE_CONFIG_TOML
        .parse()
        .expect("Failed to parse test config TOML")
}

/// Base configuration with additional TOML sections injected.
pub(crate) fn create_config_with_toml(additional_toml: &str) -> Config {
    let toml_str = format!(
        r#"
{additional_toml}

[logging]
format = "json"
        "#
    );
    toml_str.parse().expect("Failed to parse test config TOML")
}

// ============================================================================
// Request Helpers
// ============================================================================

pub(crate) fn request(method: Method, uri: &str) -> Request<Bytes> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Bytes::new())
        .unwrap()
}

pub(crate) fn get_request(uri: &str) -> Request<Bytes> {
    request(Method::GET, uri)
}

// ============================================================================
// Response Helpers
// ============================================================================

pub(crate) fn body_string(response: &Response<Bytes>) -> String {
    String::from_utf8_lossy(response.body()).to_string()
}

// ============================================================================
// Test Handlers
// ============================================================================

/// Handler answering 200 with a fixed body.
pub(crate) fn reply(body: &'static str) -> impl Fn(&mut Context) + Send + Sync + 'static {
    move |ctx: &mut Context| ctx.text(StatusCode::OK, body)
}

/// Handler answering 200 with the value of a path parameter.
pub(crate) fn echo_param(name: &'static str) -> impl Fn(&mut Context) + Send + Sync + 'static {
    move |ctx: &mut Context| {
        let value = ctx.param(name).unwrap_or("<none>").to_owned();
        ctx.text(StatusCode::OK, value);
    }
}

/// Middleware recording `name` in the `trace` entry of the context.
pub(crate) fn mark(name: &'static str) -> impl Middleware {
    from_fn(move |ctx: &mut Context, next: Next<'_>| {
        match ctx.get_mut::<Vec<&'static str>>("trace") {
            Some(trace) => trace.push(name),
            None => ctx.set("trace", vec![name]),
        }
        next.run(ctx);
    })
}

/// Handler answering 200 with the recorded trace joined by `>`.
pub(crate) fn trace_of(ctx: &mut Context) {
    let trace = ctx
        .get::<Vec<&'static str>>("trace")
        .map(|t| t.join(">"))
        .unwrap_or_default();
    ctx.text(StatusCode::OK, trace);
}
