//! # axum-dispatch
//!
//! A request-routing and dispatch engine for HTTP services: maps a method and
//! path to a middleware chain and handler, binds path parameters without
//! allocating, resolves API versions and negotiates content, all configured
//! through simple TOML.
//!
//! # Quick Start
//!
//! ```rust
//! use axum_dispatch::{Config, Context, Result, Router, middleware};
//! use bytes::Bytes;
//! use http::{Method, Request, StatusCode};
//!
//! fn main() -> Result<()> {
//!     let config = Config::default(); // Loads from config/{RUST_ENV}.toml
//!     config.setup_tracing();
//!
//!     let mut router = Router::new(config)?;
//!     router
//!         .use_middleware(middleware::recover())?
//!         .use_middleware(middleware::request_id())?
//!         .use_middleware(middleware::logger())?;
//!
//!     router.get("/users/me", |ctx: &mut Context| ctx.text(StatusCode::OK, "me"))?;
//!     router.get("/users/:id", |ctx: &mut Context| {
//!         let id = ctx.param("id").unwrap_or_default().to_owned();
//!         ctx.json(StatusCode::OK, &serde_json::json!({ "id": id }));
//!     })?;
//!
//!     let engine = router.freeze()?;
//!
//!     let response = engine.dispatch(Request::get("/users/42").body(Bytes::new()).unwrap());
//!     assert_eq!(response.status(), StatusCode::OK);
//!
//!     let response = engine.dispatch(
//!         Request::builder()
//!             .method(Method::POST)
//!             .uri("/users/42")
//!             .body(Bytes::new())
//!             .unwrap(),
//!     );
//!     assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
//!     assert_eq!(response.headers()["allow"], "GET");
//!     Ok(())
//! }
//! ```
//!
//! To serve it, convert the engine into a `tower::Service` with
//! [`Engine::into_service`] and mount it as an axum fallback service.
//!
//! # What You Get
//!
//! | Feature | Description |
//! |---------|-------------|
//! | Route matching | Static hash index behind a bloom filter, per-method trie with backtracking |
//! | Priority | Static beats parameter beats wildcard at every level |
//! | Parameters | Up to 8 bound inline, zero heap allocation |
//! | Context pool | Request contexts reused across requests |
//! | Middleware | Onion model, composed once when the router is frozen |
//! | Groups | Nested prefixes and middleware |
//! | Versioning | Accept, path, header and query detection, deprecation headers |
//! | Negotiation | RFC 7231 `Accept`, `Accept-Charset`, `Accept-Encoding`, `Accept-Language` |
//! | Diagnostics | Structured events for forwarded-header spoofing, header injection and more |
//!
//! # Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`Router`] / [`Engine`] | Registration and dispatch |
//! | [`matcher`] | Patterns, constraints and route tables |
//! | [`middleware`] | Built-in middleware ([`middleware::recover`], [`middleware::logger`], ...) |
//! | [`negotiate`] | Content negotiation |
//! | [`Config`] | Configuration loading and validation |
//! | [`Error`] | Error types and handling |
//!
//! # Configuration
//!
//! ```rust
//! use axum_dispatch::Config;
//! use std::time::Duration;
//!
//! // From string (useful for tests)
//! let config: Config = r#"
//!     [router]
//!     trim_trailing_slash = true
//!     max_body_size = "64KiB"
//!
//!     [versioning]
//!     default_version = "v1"
//!     allowed_versions = ["v1", "v2"]
//! "#.parse().unwrap();
//! assert!(config.validate().is_ok());
//!
//! // With builder methods
//! let config = Config::default()
//!     .with_verbose_errors(true)
//!     .with_request_timeout(Duration::from_secs(30));
//! ```
//!
//! # Error Handling
//!
//! Registration errors are returned synchronously. Dispatch never fails:
//! every request ends with a response. Handlers report errors with
//! [`Context::abort_with_error`], which renders a structured JSON body:
//!
//! ```json
//! {
//!   "error_code": "INVALID_INPUT",
//!   "message": "missing required field"
//! }
//! ```
mod chain;
mod config;
mod context;
mod diagnostics;
mod dispatch;
mod error;
mod group;
mod params;
mod pool;
mod service;
mod utils;
mod version;

pub mod matcher;
pub mod middleware;
pub mod negotiate;

pub use chain::{Handler, Middleware, Next};
pub use config::*;
pub use context::Context;
pub use diagnostics::*;
pub use dispatch::*;
pub use error::*;
pub use group::Group;
pub use matcher::{Constraint, RouteEntry};
pub use params::{ParamStorage, Params, ParamsRef};
pub use pool::ContextPool;
pub use service::DispatchService;
pub use utils::*;
pub use version::*;

pub type Result<T> = std::result::Result<T, Error>;
