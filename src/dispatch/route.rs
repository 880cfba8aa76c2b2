use {
    crate::{
        chain::{Handler, Middleware},
        context::Context,
        matcher::Constraint,
    },
    http::Method,
    std::{fmt, sync::Arc},
};

/// Full description of a route, for registrations that need more than a
/// method, a path and a handler.
///
/// ```rust
/// use axum_dispatch::{Config, Constraint, Context, Route, Router, middleware};
/// use http::{Method, StatusCode};
///
/// # fn main() -> axum_dispatch::Result<()> {
/// let mut router = Router::new(Config::default())?;
/// router.add(
///     Route::new(Method::GET, "/users/:id", |ctx: &mut Context| {
///         ctx.text(StatusCode::OK, "user");
///     })
///     .name("users.show")
///     .constraint("id", Constraint::Numeric)
///     .middleware(middleware::logger()),
/// )?;
/// # Ok(())
/// # }
/// ```
pub struct Route {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) handler: Handler,
    pub(crate) name: Option<String>,
    pub(crate) constraints: Vec<(String, Constraint)>,
    pub(crate) middleware: Vec<Arc<dyn Middleware>>,
    pub(crate) version: Option<String>,
}

impl Route {
    pub fn new<H>(method: Method, path: impl Into<String>, handler: H) -> Self
    where
        H: Fn(&mut Context) + Send + Sync + 'static,
    {
        Self::from_handler(method, path, Arc::new(handler))
    }

    pub(crate) fn from_handler(method: Method, path: impl Into<String>, handler: Handler) -> Self {
        Self {
            method,
            path: path.into(),
            handler,
            name: None,
            constraints: Vec::new(),
            middleware: Vec::new(),
            version: None,
        }
    }

    /// Names the route for [`Engine::url_for`](crate::Engine::url_for).
    /// Names are unique across the router.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Restricts the values `param` may bind. A request whose value fails
    /// the constraint is answered 404.
    pub fn constraint(mut self, param: impl Into<String>, constraint: Constraint) -> Self {
        self.constraints.push((param.into(), constraint));
        self
    }

    /// Adds middleware running inside the global and group middleware.
    pub fn middleware(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Registers the route under an API version instead of the group's.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("name", &self.name)
            .field("constraints", &self.constraints.len())
            .field("middleware", &self.middleware.len())
            .field("version", &self.version)
            .finish()
    }
}
