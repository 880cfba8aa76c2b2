//! Route groups.
//!
//! A group contributes a path prefix and middleware to every route registered
//! through it. Groups nest: a child's prefix is appended to its parent's and
//! its middleware runs inside the parent's.
//!
//! ```rust
//! use axum_dispatch::{Config, Context, Router, middleware};
//! use http::StatusCode;
//!
//! # fn main() -> axum_dispatch::Result<()> {
//! let mut router = Router::new(Config::default())?;
//! let mut api = router.group("/api");
//! api.use_middleware(middleware::request_id())?;
//! api.get("/health", |ctx: &mut Context| ctx.text(StatusCode::OK, "ok"))?;
//!
//! let mut users = api.group("/users");
//! users.get("/:id", |ctx: &mut Context| {
//!     let id = ctx.param("id").unwrap_or_default().to_owned();
//!     ctx.text(StatusCode::OK, id);
//! })?;
//! # Ok(())
//! # }
//! ```
//!
//! Groups are only ever created as children of the router or of another
//! group, so the tree cannot contain cycles. Middleware is collected from the
//! tree when the router is frozen, which means middleware added to a group
//! after some of its routes were registered still applies to them.

use {
    crate::{
        Result,
        chain::{Handler, Middleware},
        context::Context,
        dispatch::{Route, Router},
    },
    http::Method,
    std::{fmt, sync::Arc},
};

/// Index of a group in its router's [`GroupTree`].
pub(crate) type GroupId = usize;

struct GroupNode {
    prefix: String,
    middleware: Vec<Arc<dyn Middleware>>,
    parent: Option<GroupId>,
    version: Option<Arc<str>>,
}

/// Arena holding every group of a router.
#[derive(Default)]
pub(crate) struct GroupTree {
    nodes: Vec<GroupNode>,
}

impl GroupTree {
    /// Adds a child of `parent` and returns its id. The stored prefix is the
    /// effective one, parent prefix included.
    pub(crate) fn add(
        &mut self,
        parent: Option<GroupId>,
        prefix: &str,
        version: Option<Arc<str>>,
    ) -> GroupId {
        let (base, inherited) = match parent {
            Some(id) => (self.nodes[id].prefix.as_str(), self.nodes[id].version.clone()),
            None => ("", None),
        };
        let prefix = join_prefix(base, prefix);
        self.nodes.push(GroupNode {
            prefix,
            middleware: Vec::new(),
            parent,
            version: version.or(inherited),
        });
        self.nodes.len() - 1
    }

    pub(crate) fn push_middleware(&mut self, id: GroupId, middleware: Arc<dyn Middleware>) {
        self.nodes[id].middleware.push(middleware);
    }

    pub(crate) fn prefix(&self, id: GroupId) -> &str {
        &self.nodes[id].prefix
    }

    pub(crate) fn version(&self, id: GroupId) -> Option<&Arc<str>> {
        self.nodes[id].version.as_ref()
    }

    /// Appends the middleware of `id` and its ancestors, outermost first.
    pub(crate) fn collect_middleware(&self, id: GroupId, out: &mut Vec<Arc<dyn Middleware>>) {
        let mut lineage = Vec::new();
        let mut current = Some(id);
        while let Some(id) = current {
            lineage.push(id);
            current = self.nodes[id].parent;
        }
        for id in lineage.into_iter().rev() {
            out.extend(self.nodes[id].middleware.iter().cloned());
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }
}

/// Joins a group prefix and a relative prefix into `/a/b` form, without a
/// trailing slash. The root prefix is the empty string.
fn join_prefix(base: &str, prefix: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        return base.to_owned();
    }
    let mut joined = String::with_capacity(base.len() + prefix.len() + 1);
    joined.push_str(base);
    joined.push('/');
    joined.push_str(prefix);
    joined
}

/// Joins a group prefix and a route path.
pub(crate) fn join_path(prefix: &str, path: &str) -> String {
    if prefix.is_empty() {
        return path.to_owned();
    }
    if path == "/" || path.is_empty() {
        return prefix.to_owned();
    }
    let mut joined = String::with_capacity(prefix.len() + path.len() + 1);
    joined.push_str(prefix);
    if !path.starts_with('/') {
        joined.push('/');
    }
    joined.push_str(path);
    joined
}

/// Registration handle for a group.
///
/// Borrows the router mutably, so routes can only be added while no other
/// group handle is alive. Every method fails once the router is frozen.
pub struct Group<'r> {
    router: &'r mut Router,
    id: GroupId,
}

impl<'r> Group<'r> {
    pub(crate) fn new(router: &'r mut Router, id: GroupId) -> Self {
        Self { router, id }
    }

    /// Effective prefix of this group.
    pub fn prefix(&self) -> &str {
        self.router.groups().prefix(self.id)
    }

    /// Version every route of this group is registered under, if any.
    pub fn version(&self) -> Option<&str> {
        self.router.groups().version(self.id).map(|v| &**v)
    }

    /// Adds middleware wrapping every route of this group and its subgroups.
    pub fn use_middleware(&mut self, middleware: impl Middleware) -> Result<&mut Self> {
        self.router.group_middleware(self.id, Arc::new(middleware))?;
        Ok(self)
    }

    /// Creates a nested group.
    pub fn group(&mut self, prefix: &str) -> Group<'_> {
        let id = self.router.child_group(Some(self.id), prefix, None);
        Group::new(self.router, id)
    }

    /// Registers a fully described route under this group.
    pub fn add(&mut self, route: Route) -> Result<&mut Self> {
        self.router.register(Some(self.id), route)?;
        Ok(self)
    }

    pub fn route<H>(&mut self, method: Method, path: &str, handler: H) -> Result<&mut Self>
    where
        H: Fn(&mut Context) + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        self.add(Route::from_handler(method, path, handler))
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
}

impl fmt::Debug for Group<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("prefix", &self.prefix())
            .field("version", &self.version())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{chain::Next, middleware::from_fn};

    fn named(name: &'static str) -> Arc<dyn Middleware> {
        Arc::new(from_fn(move |ctx: &mut Context, next: Next<'_>| {
            ctx.set(name, true);
            next.run(ctx);
        }))
    }

    #[test]
    fn test_join_prefix() {
        assert_eq!(join_prefix("", "/api"), "/api");
        assert_eq!(join_prefix("", "api/"), "/api");
        assert_eq!(join_prefix("/api", "/v1/"), "/api/v1");
        assert_eq!(join_prefix("/api", "/"), "/api");
        assert_eq!(join_prefix("", ""), "");
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("", "/users"), "/users");
        assert_eq!(join_path("/api", "/users"), "/api/users");
        assert_eq!(join_path("/api", "users"), "/api/users");
        assert_eq!(join_path("/api", "/"), "/api");
        assert_eq!(join_path("", "/"), "/");
    }

    #[test]
    fn test_nested_prefix_and_version() {
        let mut tree = GroupTree::default();
        let api = tree.add(None, "/api", Some(Arc::from("v2")));
        let users = tree.add(Some(api), "/users", None);
        let admin = tree.add(Some(users), "admin", Some(Arc::from("v3")));

        assert_eq!(tree.prefix(users), "/api/users");
        assert_eq!(tree.prefix(admin), "/api/users/admin");
        assert_eq!(tree.version(users).map(|v| &**v), Some("v2"));
        assert_eq!(tree.version(admin).map(|v| &**v), Some("v3"));
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn test_middleware_outer_to_inner() {
        let mut tree = GroupTree::default();
        let outer = tree.add(None, "/a", None);
        let inner = tree.add(Some(outer), "/b", None);
        let sibling = tree.add(Some(outer), "/c", None);
        tree.push_middleware(inner, named("inner"));
        tree.push_middleware(outer, named("outer"));
        tree.push_middleware(sibling, named("sibling"));

        let mut links = Vec::new();
        tree.collect_middleware(inner, &mut links);
        assert_eq!(links.len(), 2);

        let mut links = Vec::new();
        tree.collect_middleware(outer, &mut links);
        assert_eq!(links.len(), 1);
    }
}
