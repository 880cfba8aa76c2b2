use {
    super::{DispatchHooks, Engine, Route, engine::EngineParts},
    crate::{
        Config, Error, Result,
        chain::{Chain, Handler, Middleware},
        context::{Context, ContextSettings},
        diagnostics::{DiagnosticEvent, DiagnosticKind, DiagnosticSink, Diagnostics},
        group::{Group, GroupId, GroupTree, join_path},
        matcher::{Pattern, RouteEntry, RouteTable},
        params::INLINE_PARAMS,
        pool::ContextPool,
        version::{VersionConfig, VersionResolver},
    },
    http::Method,
    std::{
        collections::{BTreeMap, HashMap, HashSet},
        fmt,
        sync::Arc,
    },
};

/// Registration phase of the dispatch engine.
///
/// Routes, groups and middleware are added to a `Router`, then
/// [`freeze`](Self::freeze) compiles everything into an immutable
/// [`Engine`]. Once frozen, every registration call fails with
/// [`ErrorKind::RouterFrozen`](crate::ErrorKind::RouterFrozen).
///
/// ```rust
/// use axum_dispatch::{Config, Context, Router, middleware};
/// use bytes::Bytes;
/// use http::{Request, StatusCode};
///
/// # fn main() -> axum_dispatch::Result<()> {
/// let mut router = Router::new(Config::default())?;
/// router.use_middleware(middleware::recover())?;
/// router.get("/users/me", |ctx: &mut Context| ctx.text(StatusCode::OK, "me"))?;
/// router.get("/users/:id", |ctx: &mut Context| {
///     let id = ctx.param("id").unwrap_or_default().to_owned();
///     ctx.text(StatusCode::OK, id);
/// })?;
///
/// let engine = router.freeze()?;
/// let response = engine.dispatch(Request::get("/users/42").body(Bytes::new()).unwrap());
/// assert_eq!(response.body().as_ref(), b"42");
/// # Ok(())
/// # }
/// ```
pub struct Router {
    config: Config,
    diagnostics: Diagnostics,
    middleware: Vec<Arc<dyn Middleware>>,
    groups: GroupTree,
    base: RouteTable,
    versions: BTreeMap<Arc<str>, RouteTable>,
    names: HashSet<Arc<str>>,
    fallback: Option<Handler>,
    hooks: Option<Arc<dyn DispatchHooks>>,
    versioning: Option<VersionConfig>,
    frozen: bool,
}

impl Router {
    /// Creates a router from a validated configuration.
    pub fn new(config: Config) -> Result<Self> {
        Self::build(config, Diagnostics::disabled())
    }

    /// Creates a router reporting anomalies to `sink`.
    pub fn with_diagnostics(config: Config, sink: impl DiagnosticSink + 'static) -> Result<Self> {
        Self::build(config, Diagnostics::new(sink))
    }

    fn build(config: Config, diagnostics: Diagnostics) -> Result<Self> {
        config.validate()?;
        let versioning = config
            .versioning
            .as_ref()
            .map(|v| v.to_version_config())
            .transpose()?;

        Ok(Self {
            config,
            diagnostics,
            middleware: Vec::new(),
            groups: GroupTree::default(),
            base: RouteTable::new(),
            versions: BTreeMap::new(),
            names: HashSet::new(),
            fallback: None,
            hooks: None,
            versioning,
            frozen: false,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Replaces the version configuration, typically to attach a custom
    /// detector or observers that TOML cannot express.
    pub fn versioning(&mut self, config: VersionConfig) -> Result<&mut Self> {
        self.ensure_open("set the version configuration")?;
        self.versioning = Some(config);
        Ok(self)
    }

    /// Adds global middleware. It wraps every route, the fallback and the
    /// automatic OPTIONS responses, regardless of registration order.
    pub fn use_middleware(&mut self, middleware: impl Middleware) -> Result<&mut Self> {
        self.ensure_open("add middleware")?;
        self.middleware.push(Arc::new(middleware));
        Ok(self)
    }

    /// Sets the handler for unmatched requests. The response status is
    /// preset to 404 or 405 (with `Allow`) before it runs.
    pub fn fallback<H>(&mut self, handler: H) -> Result<&mut Self>
    where
        H: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.ensure_open("set the fallback")?;
        self.fallback = Some(Arc::new(handler));
        Ok(self)
    }

    pub fn hooks(&mut self, hooks: impl DispatchHooks + 'static) -> Result<&mut Self> {
        self.ensure_open("set dispatch hooks")?;
        self.hooks = Some(Arc::new(hooks));
        Ok(self)
    }

    /// Creates a top-level group.
    pub fn group(&mut self, prefix: &str) -> Group<'_> {
        let id = self.child_group(None, prefix, None);
        Group::new(self, id)
    }

    /// Creates a top-level group whose routes belong to API `version`.
    ///
    /// The version must be accepted by the version configuration, which is
    /// checked when the first route is registered.
    pub fn version(&mut self, version: &str) -> Group<'_> {
        let id = self.child_group(None, "", Some(Arc::from(version)));
        Group::new(self, id)
    }

    /// Registers a fully described route.
    pub fn add(&mut self, route: Route) -> Result<&mut Self> {
        self.register(None, route)?;
        Ok(self)
    }

    pub fn route<H>(&mut self, method: Method, path: &str, handler: H) -> Result<&mut Self>
    where
        H: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add(Route::new(method, path, handler))
    }

    pub fn get<H>(&mut self, path: &str, handler: H) -> Result<&mut Self>
    where
        H: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.route(Method::GET, path, handler)
    }

    pub fn post<H>(&mut self, path: &str, handler: H) -> Result<&mut Self>
    where
        H: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.route(Method::POST, path, handler)
    }

    pub fn put<H>(&mut self, path: &str, handler: H) -> Result<&mut Self>
    where
        H: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.route(Method::PUT, path, handler)
    }

    pub fn patch<H>(&mut self, path: &str, handler: H) -> Result<&mut Self>
    where
        H: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.route(Method::PATCH, path, handler)
    }

    pub fn delete<H>(&mut self, path: &str, handler: H) -> Result<&mut Self>
    where
        H: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.route(Method::DELETE, path, handler)
    }

    pub fn head<H>(&mut self, path: &str, handler: H) -> Result<&mut Self>
    where
        H: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.route(Method::HEAD, path, handler)
    }

    pub fn options<H>(&mut self, path: &str, handler: H) -> Result<&mut Self>
    where
        H: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.route(Method::OPTIONS, path, handler)
    }

    /// Compiles the registered routes into an [`Engine`].
    ///
    /// Middleware chains are composed here, once per route: global
    /// middleware, then group middleware from the outermost group inwards,
    /// then the route's own. The router stays frozen afterwards.
    pub fn freeze(&mut self) -> Result<Engine> {
        self.ensure_open("freeze")?;
        self.frozen = true;

        let router = &self.config.router;
        if router.enable_h2c {
            self.diagnostics.emit_with(|| {
                DiagnosticEvent::new(
                    DiagnosticKind::H2cEnabled,
                    "cleartext HTTP/2 (h2c) is enabled; it bypasses TLS and is vulnerable to request smuggling behind proxies",
                )
                .with_field("setting", "router.enable_h2c")
            });
        }

        let global = self.middleware.clone();
        let groups = &self.groups;
        let compose = |entry: &RouteEntry| {
            let mut links = global.clone();
            if let Some(group) = entry.group() {
                groups.collect_middleware(group, &mut links);
            }
            links.extend(entry.own_middleware().iter().cloned());
            Chain::new(links, entry.handler().clone())
        };

        let mut base = std::mem::take(&mut self.base);
        base.freeze(compose);
        let mut versions = std::mem::take(&mut self.versions);
        for table in versions.values_mut() {
            table.freeze(compose);
        }

        let max_params = versions
            .values()
            .map(RouteTable::max_params)
            .fold(base.max_params(), usize::max);

        let mut names = HashMap::new();
        for entry in base.routes().chain(versions.values().flat_map(|table| table.routes())) {
            if let Some(name) = entry.name() {
                names.insert(Arc::<str>::from(name), entry.clone());
            }
        }

        let settings = Arc::new(ContextSettings {
            trusted_proxies: router.trusted_proxies.clone(),
            max_forwarded_hops: router.max_forwarded_hops,
            verbose_errors: router.verbose_errors,
            diagnostics: self.diagnostics.clone(),
        });
        let pool = ContextPool::new(
            settings,
            router.max_idle_contexts,
            router.pool_prewarm,
            max_params,
        );

        let fallback = Chain::new(
            global.clone(),
            self.fallback.take().unwrap_or_else(|| Arc::new(write_status_reason)),
        );
        let options = Chain::new(global, Arc::new(|_: &mut Context| {}));

        tracing::info!(
            routes = base.len() + versions.values().map(RouteTable::len).sum::<usize>(),
            versions = versions.len(),
            groups = self.groups.len(),
            middleware = self.middleware.len(),
            "Router frozen"
        );

        Ok(Engine::from_parts(EngineParts {
            base,
            versions,
            names,
            resolver: self.versioning.take().map(VersionResolver::new),
            pool,
            fallback,
            options,
            hooks: self.hooks.take(),
            diagnostics: self.diagnostics.clone(),
            trim_trailing_slash: router.trim_trailing_slash,
            handle_method_not_allowed: router.handle_method_not_allowed,
            request_timeout: router.request_timeout,
            max_body_size: usize::try_from(router.max_body_size.as_u64()).unwrap_or(usize::MAX),
        }))
    }

    // ------------------------------------------------------------------
    // Group plumbing
    // ------------------------------------------------------------------

    pub(crate) fn groups(&self) -> &GroupTree {
        &self.groups
    }

    pub(crate) fn child_group(
        &mut self,
        parent: Option<GroupId>,
        prefix: &str,
        version: Option<Arc<str>>,
    ) -> GroupId {
        self.groups.add(parent, prefix, version)
    }

    pub(crate) fn group_middleware(
        &mut self,
        group: GroupId,
        middleware: Arc<dyn Middleware>,
    ) -> Result<()> {
        self.ensure_open("add group middleware")?;
        self.groups.push_middleware(group, middleware);
        Ok(())
    }

    pub(crate) fn register(&mut self, group: Option<GroupId>, route: Route) -> Result<()> {
        let Route {
            method,
            path,
            handler,
            name,
            constraints,
            middleware,
            version,
        } = route;

        if self.frozen {
            tracing::error!(%method, path = %path, "Route registered after the router was frozen");
            return Err(Error::frozen(format!(
                "cannot register {method} {path}: the router is frozen"
            )));
        }

        let full_path = match group {
            Some(id) => join_path(self.groups.prefix(id), &path),
            None => path,
        };
        let version = match version {
            Some(version) => Some(self.accept_version(&version)?),
            None => match group.and_then(|id| self.groups.version(id)).cloned() {
                Some(version) => Some(self.accept_version(&version)?),
                None => None,
            },
        };

        let pattern = Pattern::parse(&full_path, self.config.router.trim_trailing_slash)?;
        let mut entry = RouteEntry::new(method, pattern, handler)
            .with_version(version.clone())
            .with_group(group)
            .with_middleware(middleware);

        for (param, constraint) in constraints {
            let index = entry
                .param_names()
                .iter()
                .position(|name| **name == *param)
                .ok_or_else(|| {
                    Error::invalid_pattern(format!(
                        "constraint on unknown parameter `{param}` of `{}`",
                        entry.pattern()
                    ))
                })?;
            entry = entry.with_constraint(index, constraint);
        }

        let name: Option<Arc<str>> = name.map(Arc::from);
        if let Some(name) = &name {
            if self.names.contains(name) {
                return Err(Error::duplicate_route(format!(
                    "route name `{name}` is already used"
                )));
            }
        }
        let entry = entry.with_name(name.clone());

        tracing::debug!(
            method = %entry.method(),
            pattern = %entry.pattern(),
            version = version.as_deref().unwrap_or("-"),
            "Route registered"
        );

        let table = match version {
            Some(version) => self.versions.entry(version).or_default(),
            None => &mut self.base,
        };
        let id = table.insert(entry)?;
        let route = table.entry(id);
        let count = route.param_names().len();
        if count > INLINE_PARAMS {
            tracing::warn!(
                method = %route.method(),
                pattern = %route.pattern(),
                params = count,
                "Route has more than {} parameters; bindings will be heap allocated",
                INLINE_PARAMS
            );
            self.diagnostics.emit_with(|| {
                DiagnosticEvent::new(
                    DiagnosticKind::HighParamCount,
                    format!("route has {count} parameters"),
                )
                .with_field("method", route.method())
                .with_field("pattern", route.pattern())
                .with_field("count", count)
            });
        }
        if let Some(name) = name {
            self.names.insert(name);
        }
        Ok(())
    }

    /// Canonical form of a route's version tag.
    fn accept_version(&self, version: &str) -> Result<Arc<str>> {
        let config = self.versioning.as_ref().ok_or_else(|| {
            Error::config(format!(
                "route version `{version}` requires a [versioning] configuration"
            ))
        })?;
        config.accept(version).ok_or_else(|| {
            Error::config(format!(
                "route version `{version}` is not an allowed API version"
            ))
        })
    }

    fn ensure_open(&self, action: &str) -> Result<()> {
        if self.frozen {
            tracing::error!("Cannot {} after the router was frozen", action);
            return Err(Error::frozen(format!(
                "cannot {action}: the router is frozen"
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.base.len())
            .field("versions", &self.versions.keys().collect::<Vec<_>>())
            .field("groups", &self.groups.len())
            .field("middleware", &self.middleware.len())
            .field("frozen", &self.frozen)
            .finish()
    }
}

/// Default fallback: the canonical reason phrase of the preset status.
fn write_status_reason(ctx: &mut Context) {
    let status = ctx.status();
    ctx.text(status, status.canonical_reason().unwrap_or_default());
}
