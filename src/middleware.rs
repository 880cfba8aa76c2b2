//! Built-in middleware and closure adapters.
//!
//! | Middleware | Purpose |
//! |------------|---------|
//! | [`from_fn`] | Wraps a closure `Fn(&mut Context, Next)` |
//! | [`recover`] | Catches panics of the rest of the chain, answers 500 |
//! | [`request_id`] | Preserves or generates `x-request-id`, echoes it back |
//! | [`logger`] | Logs method, path, status and latency after the chain ran |
//!
//! Panics that escape every [`recover`] are still caught at the dispatch
//! boundary, which additionally raises a `HandlerPanic` diagnostic.

use {
    crate::{
        chain::{Middleware, Next},
        context::Context,
        utils::new_request_id,
    },
    http::{HeaderName, HeaderValue},
    std::{
        any::Any,
        fmt,
        panic::{AssertUnwindSafe, catch_unwind},
        time::Instant,
    },
};

/// Header carrying the request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Key under which [`request_id`] stores the id in the context.
pub const REQUEST_ID_KEY: &str = "request_id";

/// Middleware built from a closure. See [`from_fn`].
pub struct FnMiddleware<F> {
    f: F,
}

/// Creates a middleware from a closure.
///
/// ```rust
/// use axum_dispatch::{Context, Next, middleware::from_fn};
///
/// let timing = from_fn(|ctx: &mut Context, next: Next<'_>| {
///     let started = std::time::Instant::now();
///     next.run(ctx);
///     ctx.set("elapsed", started.elapsed());
/// });
/// # let _ = timing;
/// ```
pub fn from_fn<F>(f: F) -> FnMiddleware<F>
where
    F: Fn(&mut Context, Next<'_>) + Send + Sync + 'static,
{
    FnMiddleware { f }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&mut Context, Next<'_>) + Send + Sync + 'static,
{
    fn handle(&self, ctx: &mut Context, next: Next<'_>) {
        (self.f)(ctx, next)
    }
}

impl<F> fmt::Debug for FnMiddleware<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnMiddleware").finish_non_exhaustive()
    }
}

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unable to downcast the panic payload".to_string()
    }
}

/// Catches panics raised by the remainder of the chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct Recover;

/// Creates a [`Recover`] middleware. Put it first so it covers everything.
pub fn recover() -> Recover {
    Recover
}

impl Middleware for Recover {
    fn handle(&self, ctx: &mut Context, next: Next<'_>) {
        let outcome = catch_unwind(AssertUnwindSafe(|| next.run(ctx)));
        if let Err(payload) = outcome {
            let message = panic_message(&*payload);
            tracing::error!(
                method = %ctx.method(),
                path = %ctx.path(),
                "Handler panicked: {}",
                message
            );
            ctx.write_panic(&message);
        }
    }
}

/// Propagates a request id.
#[derive(Debug, Clone)]
pub struct RequestId {
    header: HeaderName,
}

/// Creates a [`RequestId`] middleware using the `x-request-id` header.
///
/// An incoming id is kept; otherwise a UUIDv7 is generated. The id is stored
/// in the context under [`REQUEST_ID_KEY`] and set on the response.
pub fn request_id() -> RequestId {
    RequestId {
        header: HeaderName::from_static(REQUEST_ID_HEADER),
    }
}

impl RequestId {
    /// Uses another header name.
    pub fn with_header(mut self, header: HeaderName) -> Self {
        self.header = header;
        self
    }
}

impl Middleware for RequestId {
    fn handle(&self, ctx: &mut Context, next: Next<'_>) {
        let id = ctx
            .headers()
            .get(&self.header)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
            .unwrap_or_else(new_request_id);

        ctx.set(REQUEST_ID_KEY, id.clone());
        next.run(ctx);

        if let Ok(value) = HeaderValue::from_str(&id) {
            ctx.response_headers_mut().insert(self.header.clone(), value);
        }
    }
}

/// Logs every request once the chain has run.
#[derive(Debug, Clone, Copy, Default)]
pub struct Logger;

/// Creates a [`Logger`] middleware.
pub fn logger() -> Logger {
    Logger
}

impl Middleware for Logger {
    fn handle(&self, ctx: &mut Context, next: Next<'_>) {
        let started = Instant::now();
        next.run(ctx);
        let latency = started.elapsed();

        let request_id = ctx
            .get::<String>(REQUEST_ID_KEY)
            .map(String::as_str)
            .unwrap_or("unknown");

        tracing::info!(
            method = %ctx.method(),
            path = %ctx.path(),
            route = ctx.route().map(|r| r.pattern().as_str()).unwrap_or("-"),
            status = ctx.status().as_u16(),
            latency_us = latency.as_micros() as u64,
            request_id = %request_id,
            "request completed"
        );
    }
}
