use {
    super::DispatchHooks,
    crate::{
        Error, Result,
        chain::Chain,
        context::Context,
        diagnostics::{DiagnosticEvent, DiagnosticKind, Diagnostics},
        matcher::{Lookup, RouteEntry, RouteTable, allow_header},
        middleware::panic_message,
        pool::ContextPool,
        service::DispatchService,
        version::{Deprecation, VersionRequest, VersionResolver},
    },
    axum::extract::ConnectInfo,
    bytes::Bytes,
    http::{HeaderValue, Method, Request, Response, StatusCode},
    std::{
        collections::{BTreeMap, HashMap},
        fmt,
        net::SocketAddr,
        panic::{AssertUnwindSafe, catch_unwind},
        sync::Arc,
        time::{Duration, Instant},
    },
    tokio_util::sync::CancellationToken,
};

pub(crate) struct EngineParts {
    pub(crate) base: RouteTable,
    pub(crate) versions: BTreeMap<Arc<str>, RouteTable>,
    pub(crate) names: HashMap<Arc<str>, Arc<RouteEntry>>,
    pub(crate) resolver: Option<VersionResolver>,
    pub(crate) pool: ContextPool,
    pub(crate) fallback: Chain,
    pub(crate) options: Chain,
    pub(crate) hooks: Option<Arc<dyn DispatchHooks>>,
    pub(crate) diagnostics: Diagnostics,
    pub(crate) trim_trailing_slash: bool,
    pub(crate) handle_method_not_allowed: bool,
    pub(crate) request_timeout: Option<Duration>,
    pub(crate) max_body_size: usize,
}

/// Serving phase of the dispatch engine.
///
/// Route tables are immutable and shared without locks; the engine is
/// `Send + Sync` and is typically wrapped in an `Arc` or converted into a
/// `tower::Service` with [`into_service`](Self::into_service).
///
/// Dispatch never fails: unmatched requests become 404 or 405, and a panic
/// that no [`recover`](crate::middleware::recover) middleware caught becomes
/// a 500 and a `HandlerPanic` diagnostic.
pub struct Engine {
    parts: EngineParts,
}

impl Engine {
    pub(crate) fn from_parts(parts: EngineParts) -> Self {
        Self { parts }
    }

    /// Dispatches a request with a fully buffered body.
    pub fn dispatch(&self, request: Request<Bytes>) -> Response<Bytes> {
        self.run(request, None)
    }

    /// Dispatches a request that can be cancelled from another task.
    ///
    /// Cancellation is observed each time a middleware continues the chain:
    /// the remaining links and the handler are skipped, middleware already
    /// entered still finishes, and an unwritten response becomes
    /// 408 Request Timeout.
    pub fn dispatch_with_cancellation(
        &self,
        request: Request<Bytes>,
        token: CancellationToken,
    ) -> Response<Bytes> {
        self.run(request, Some(token))
    }

    fn run(&self, request: Request<Bytes>, token: Option<CancellationToken>) -> Response<Bytes> {
        let started = Instant::now();
        let span = tracing::info_span!(
            "dispatch",
            method = %request.method(),
            path = %request.uri().path(),
        );
        let _enter = span.enter();

        let is_head = request.method() == Method::HEAD;
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0);

        let mut ctx = self.parts.pool.acquire();
        ctx.load(request, peer);
        ctx.set_cancellation(token);
        if let Some(hooks) = &self.parts.hooks {
            hooks.on_start(&ctx);
        }

        let mut deprecation = None;
        let outcome = catch_unwind(AssertUnwindSafe(|| self.route(&mut ctx, &mut deprecation)));
        if let Err(payload) = outcome {
            let message = panic_message(&*payload);
            tracing::error!(
                method = %ctx.method(),
                path = %ctx.path(),
                "Handler panicked: {}",
                message
            );
            self.parts.diagnostics.emit_with(|| {
                DiagnosticEvent::new(DiagnosticKind::HandlerPanic, "handler panicked")
                    .with_field("method", ctx.method())
                    .with_field("path", ctx.path())
                    .with_field("panic", &message)
            });
            ctx.write_panic(&message);
        }

        let mut response = ctx.take_response();
        if let Some(deprecation) = deprecation {
            let headers = response.headers_mut();
            for (name, value) in deprecation.headers() {
                headers.insert(name.clone(), value.clone());
            }
        }
        if is_head {
            *response.body_mut() = Bytes::new();
        }

        let status = response.status();
        let elapsed = started.elapsed();
        if let Some(hooks) = &self.parts.hooks {
            hooks.on_finish(&ctx, status, elapsed);
        }
        tracing::debug!(
            status = status.as_u16(),
            route = ctx.route().map(|r| r.pattern().as_str()).unwrap_or("-"),
            version = ctx.version().unwrap_or("-"),
            elapsed_us = elapsed.as_micros() as u64,
            "Dispatch finished"
        );
        response
    }

    fn route(&self, ctx: &mut Context, deprecation: &mut Option<Arc<Deprecation>>) {
        let versioned = match &self.parts.resolver {
            Some(resolver) => {
                let resolved = {
                    let uri = ctx.uri();
                    resolver.resolve(&VersionRequest::new(
                        ctx.method(),
                        uri.path(),
                        uri.query(),
                        ctx.headers(),
                    ))
                };
                if let Some(range) = resolved.strip_range() {
                    ctx.strip_route_path(range);
                }
                *deprecation = resolved.shared_deprecation().cloned();
                let version = resolved.shared_version().clone();
                let table = self.parts.versions.get(&*version);
                ctx.set_version(version);
                table
            }
            None => None,
        };

        if self.parts.trim_trailing_slash {
            ctx.trim_trailing_slash();
        }

        let lookup = match versioned {
            Some(table) => match ctx.match_in(table) {
                Lookup::NotFound => ctx.match_in(&self.parts.base),
                Lookup::MethodNotAllowed(mut allowed) => match ctx.match_in(&self.parts.base) {
                    Lookup::Found(route) => Lookup::Found(route),
                    Lookup::MethodNotAllowed(base) => {
                        allowed.extend(base);
                        Lookup::MethodNotAllowed(allowed)
                    }
                    Lookup::NotFound => Lookup::MethodNotAllowed(allowed),
                },
                found => found,
            },
            None => ctx.match_in(&self.parts.base),
        };

        match lookup {
            Lookup::Found(route) => {
                ctx.set_route(route.clone());
                route.chain().run(ctx);
            }
            Lookup::MethodNotAllowed(mut allowed) if ctx.method() == Method::OPTIONS => {
                allowed.push(Method::OPTIONS);
                ctx.preset(StatusCode::NO_CONTENT, allow_value(&allowed));
                self.parts.options.run(ctx);
            }
            Lookup::MethodNotAllowed(allowed) => {
                if self.parts.handle_method_not_allowed {
                    ctx.preset(StatusCode::METHOD_NOT_ALLOWED, allow_value(&allowed));
                } else {
                    ctx.preset(StatusCode::NOT_FOUND, None);
                }
                self.parts.fallback.run(ctx);
            }
            Lookup::NotFound => {
                ctx.preset(StatusCode::NOT_FOUND, None);
                self.parts.fallback.run(ctx);
            }
        }
    }

    /// Builds the path of a named route.
    ///
    /// ```rust
    /// use axum_dispatch::{Config, Context, Route, Router};
    /// use http::{Method, StatusCode};
    ///
    /// # fn main() -> axum_dispatch::Result<()> {
    /// let mut router = Router::new(Config::default())?;
    /// router.add(
    ///     Route::new(Method::GET, "/users/:id/files/*path", |ctx: &mut Context| {
    ///         ctx.text(StatusCode::OK, "file")
    ///     })
    ///     .name("files.show"),
    /// )?;
    /// let engine = router.freeze()?;
    ///
    /// let url = engine.url_for("files.show", &[("id", "42"), ("path", "a/b.txt")])?;
    /// assert_eq!(url, "/users/42/files/a/b.txt");
    /// # Ok(())
    /// # }
    /// ```
    pub fn url_for(&self, name: &str, params: &[(&str, &str)]) -> Result<String> {
        let route = self
            .parts
            .names
            .get(name)
            .ok_or_else(|| Error::invalid_input(format!("no route is named `{name}`")))?;
        route.pattern().expand(params)
    }

    /// Every registered route: unversioned ones first, then per version in
    /// lexical order, each in registration order.
    pub fn routes(&self) -> impl Iterator<Item = &RouteEntry> {
        self.parts
            .base
            .routes()
            .chain(self.parts.versions.values().flat_map(|table| table.routes()))
            .map(|route| &**route)
    }

    /// Versions that have their own route table.
    pub fn versions(&self) -> impl Iterator<Item = &str> {
        self.parts.versions.keys().map(|v| &**v)
    }

    /// The version resolver, to swap the version configuration at runtime.
    pub fn resolver(&self) -> Option<&VersionResolver> {
        self.parts.resolver.as_ref()
    }

    pub fn pool(&self) -> &ContextPool {
        &self.parts.pool
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.parts.request_timeout
    }

    pub fn max_body_size(&self) -> usize {
        self.parts.max_body_size
    }

    /// Wraps the engine in a `tower::Service` taking streaming bodies.
    pub fn into_service(self) -> DispatchService {
        DispatchService::new(Arc::new(self))
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("routes", &self.routes().count())
            .field("versions", &self.versions().collect::<Vec<_>>())
            .field("pool", &self.parts.pool)
            .field("request_timeout", &self.parts.request_timeout)
            .field("max_body_size", &self.parts.max_body_size)
            .finish()
    }
}

fn allow_value(methods: &[Method]) -> Option<HeaderValue> {
    HeaderValue::from_str(&allow_header(methods)).ok()
}
