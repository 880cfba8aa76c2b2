//! `tower::Service` adapter for the engine.
//!
//! [`DispatchService`] buffers the request body (up to `max_body_size`), runs
//! the synchronous dispatch on the blocking thread pool and enforces the
//! request timeout through the engine's cancellation support. It can be used
//! as an axum fallback service or served directly with hyper:
//!
//! ```rust,no_run
//! use axum_dispatch::{Config, Context, Router};
//! use http::StatusCode;
//!
//! # async fn run() -> axum_dispatch::Result<()> {
//! let mut router = Router::new(Config::default())?;
//! router.get("/hello", |ctx: &mut Context| ctx.text(StatusCode::OK, "Hello, World!"))?;
//! let engine = router.freeze()?;
//!
//! let app = axum::Router::new().fallback_service(engine.into_service());
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(
//!     listener,
//!     app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
//! )
//! .await?;
//! # Ok(())
//! # }
//! ```

use {
    crate::Engine,
    axum::body::Body,
    http::{Request, Response, StatusCode, header},
    http_body::Body as HttpBody,
    http_body_util::{BodyExt, LengthLimitError, Limited},
    std::{
        convert::Infallible,
        fmt,
        future::Future,
        pin::Pin,
        sync::Arc,
        task::{Context, Poll},
    },
    tokio_util::sync::CancellationToken,
    tower::Service,
};

/// Service running every request through an [`Engine`].
#[derive(Clone)]
pub struct DispatchService {
    engine: Arc<Engine>,
}

impl DispatchService {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }
}

impl fmt::Debug for DispatchService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchService")
            .field("engine", &self.engine)
            .finish()
    }
}

impl<B> Service<Request<B>> for DispatchService
where
    B: HttpBody + Send + 'static,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<B>) -> Self::Future {
        let engine = self.engine.clone();

        Box::pin(async move {
            let (parts, body) = request.into_parts();
            let body = match Limited::new(body, engine.max_body_size()).collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(err) => {
                    let status = if err.downcast_ref::<LengthLimitError>().is_some() {
                        StatusCode::PAYLOAD_TOO_LARGE
                    } else {
                        StatusCode::BAD_REQUEST
                    };
                    tracing::warn!(
                        method = %parts.method,
                        path = %parts.uri.path(),
                        status = status.as_u16(),
                        error = %err,
                        "Failed to read request body"
                    );
                    return Ok(plain(status));
                }
            };
            let request = Request::from_parts(parts, body);

            // Dropping this future (client gone) cancels the dispatch.
            let token = CancellationToken::new();
            let _guard = token.clone().drop_guard();

            let task_engine = engine.clone();
            let task_token = token.clone();
            let mut task = tokio::task::spawn_blocking(move || {
                task_engine.dispatch_with_cancellation(request, task_token)
            });

            let joined = match engine.request_timeout() {
                Some(timeout) => {
                    tokio::select! {
                        joined = &mut task => joined,
                        _ = tokio::time::sleep(timeout) => {
                            tracing::warn!(
                                timeout = %humantime::format_duration(timeout),
                                "Request timed out, cancelling dispatch"
                            );
                            token.cancel();
                            task.await
                        }
                    }
                }
                None => task.await,
            };

            let response = match joined {
                Ok(response) => response.map(Body::from),
                Err(err) => {
                    tracing::error!(error = %err, "Dispatch task failed");
                    plain(StatusCode::INTERNAL_SERVER_ERROR)
                }
            };
            Ok(response)
        })
    }
}

fn plain(status: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::from(status.canonical_reason().unwrap_or_default()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        http::HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
