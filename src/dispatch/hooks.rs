use {
    crate::context::Context,
    http::StatusCode,
    std::{sync::Arc, time::Duration},
};

/// Callbacks bracketing every dispatch, for tracing and metrics exporters.
///
/// `on_start` runs once the request is loaded into its context, before
/// version resolution and matching. `on_finish` runs after the response was
/// produced, including for 404, 405 and recovered panics.
///
/// ```rust
/// use axum_dispatch::{Context, DispatchHooks};
/// use http::StatusCode;
/// use std::{sync::atomic::{AtomicU64, Ordering}, time::Duration};
///
/// #[derive(Default)]
/// struct ServerErrors(AtomicU64);
///
/// impl DispatchHooks for ServerErrors {
///     fn on_finish(&self, _ctx: &Context, status: StatusCode, _elapsed: Duration) {
///         if status.is_server_error() {
///             self.0.fetch_add(1, Ordering::Relaxed);
///         }
///     }
/// }
/// ```
pub trait DispatchHooks: Send + Sync {
    fn on_start(&self, ctx: &Context) {
        let _ = ctx;
    }

    fn on_finish(&self, ctx: &Context, status: StatusCode, elapsed: Duration) {
        let _ = (ctx, status, elapsed);
    }
}

impl<H: DispatchHooks + ?Sized> DispatchHooks for Arc<H> {
    fn on_start(&self, ctx: &Context) {
        (**self).on_start(ctx)
    }

    fn on_finish(&self, ctx: &Context, status: StatusCode, elapsed: Duration) {
        (**self).on_finish(ctx, status, elapsed)
    }
}
