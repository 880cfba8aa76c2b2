//! Middleware chain execution.
//!
//! A chain is the ordered list of middleware in front of a terminal handler.
//! It is composed once when the router is frozen (global, then groups from
//! outer to inner, then route middleware) and shared by every request that
//! hits the route.
//!
//! Execution follows the onion model: a middleware receives the context and
//! a [`Next`] continuation. Calling [`Next::run`] runs the rest of the chain
//! and returns, so code after the call sees the finished response. Not
//! calling it short-circuits everything behind.
//!
//! ```rust
//! use axum_dispatch::{Context, Next, middleware::from_fn};
//! use http::StatusCode;
//!
//! let require_token = from_fn(|ctx: &mut Context, next: Next<'_>| {
//!     if ctx.header("authorization").is_none() {
//!         ctx.abort_with_status(StatusCode::UNAUTHORIZED);
//!         return;
//!     }
//!     next.run(ctx);
//! });
//! # let _ = require_token;
//! ```

use {
    crate::context::Context,
    http::StatusCode,
    std::{fmt, sync::Arc},
};

/// Terminal request handler.
pub type Handler = Arc<dyn Fn(&mut Context) + Send + Sync>;

/// A link of a middleware chain.
pub trait Middleware: Send + Sync + 'static {
    /// Handles the request. Call `next.run(ctx)` to continue the chain.
    fn handle(&self, ctx: &mut Context, next: Next<'_>);
}

impl<M: Middleware + ?Sized> Middleware for Arc<M> {
    fn handle(&self, ctx: &mut Context, next: Next<'_>) {
        (**self).handle(ctx, next)
    }
}

/// Continuation handed to a middleware.
///
/// Consumed by [`Next::run`], so the remainder of a chain runs at most once
/// per link.
pub struct Next<'a> {
    links: &'a [Arc<dyn Middleware>],
    handler: &'a Handler,
}

impl Next<'_> {
    /// Runs the remainder of the chain.
    ///
    /// Does nothing when the request was aborted. When the request was
    /// cancelled, the chain stops here and an unwritten response becomes
    /// 408 Request Timeout. Either way, control returns to the caller so its
    /// post-processing still runs.
    pub fn run(self, ctx: &mut Context) {
        if ctx.is_cancelled() {
            ctx.stop_cancelled(StatusCode::REQUEST_TIMEOUT);
            return;
        }
        if ctx.is_aborted() {
            return;
        }

        ctx.advance_cursor();
        match self.links.split_first() {
            Some((link, rest)) => link.handle(
                ctx,
                Next {
                    links: rest,
                    handler: self.handler,
                },
            ),
            None => (self.handler)(ctx),
        }
    }

    /// Number of links left before the handler.
    pub fn remaining(&self) -> usize {
        self.links.len()
    }
}

/// A composed, immutable middleware chain.
#[derive(Clone)]
pub(crate) struct Chain {
    links: Arc<[Arc<dyn Middleware>]>,
    handler: Handler,
}

impl Chain {
    pub(crate) fn new(links: Vec<Arc<dyn Middleware>>, handler: Handler) -> Self {
        Self {
            links: links.into(),
            handler,
        }
    }

    pub(crate) fn handler(&self) -> &Handler {
        &self.handler
    }

    pub(crate) fn len(&self) -> usize {
        self.links.len()
    }

    pub(crate) fn run(&self, ctx: &mut Context) {
        Next {
            links: &self.links,
            handler: &self.handler,
        }
        .run(ctx)
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("middleware", &self.links.len())
            .finish()
    }
}
