use {
    super::{constraint::Constraint, pattern::Pattern},
    crate::{
        chain::{Chain, Handler, Middleware},
        group::GroupId,
        params::{Params, ParamStorage, ParamsRef},
    },
    http::Method,
    std::{fmt, sync::Arc},
};

/// A registered route.
///
/// Entries are created during registration and become immutable once the
/// router is frozen. Handlers see the matched entry through
/// [`Context::route`](crate::Context::route).
#[derive(Clone)]
pub struct RouteEntry {
    method: Method,
    pattern: Pattern,
    param_names: Box<[Box<str>]>,
    constraints: Vec<(usize, Constraint)>,
    name: Option<Arc<str>>,
    version: Option<Arc<str>>,
    storage: ParamStorage,
    group: Option<GroupId>,
    middleware: Vec<Arc<dyn Middleware>>,
    chain: Chain,
}

impl RouteEntry {
    pub(crate) fn new(method: Method, pattern: Pattern, handler: Handler) -> Self {
        let param_names = pattern.param_names().into_boxed_slice();
        let storage = ParamStorage::for_count(param_names.len());
        Self {
            method,
            pattern,
            param_names,
            constraints: Vec::new(),
            name: None,
            version: None,
            storage,
            group: None,
            middleware: Vec::new(),
            chain: Chain::new(Vec::new(), handler),
        }
    }

    pub(crate) fn with_name(mut self, name: Option<Arc<str>>) -> Self {
        self.name = name;
        self
    }

    pub(crate) fn with_version(mut self, version: Option<Arc<str>>) -> Self {
        self.version = version;
        self
    }

    pub(crate) fn with_group(mut self, group: Option<GroupId>) -> Self {
        self.group = group;
        self
    }

    pub(crate) fn with_middleware(mut self, middleware: Vec<Arc<dyn Middleware>>) -> Self {
        self.middleware = middleware;
        self
    }

    /// Attaches a constraint to the parameter at `index`.
    pub(crate) fn with_constraint(mut self, index: usize, constraint: Constraint) -> Self {
        self.constraints.push((index, constraint));
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Parameter and wildcard names in pattern order.
    pub fn param_names(&self) -> &[Box<str>] {
        &self.param_names
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// How this route's bindings are stored.
    pub fn storage(&self) -> ParamStorage {
        self.storage
    }

    /// Number of middleware in front of the handler, once composed.
    pub fn middleware_count(&self) -> usize {
        self.chain.len()
    }

    pub(crate) fn group(&self) -> Option<GroupId> {
        self.group
    }

    pub(crate) fn own_middleware(&self) -> &[Arc<dyn Middleware>] {
        &self.middleware
    }

    pub(crate) fn handler(&self) -> &Handler {
        self.chain.handler()
    }

    pub(crate) fn chain(&self) -> &Chain {
        &self.chain
    }

    pub(crate) fn set_chain(&mut self, chain: Chain) {
        self.chain = chain;
    }

    /// Checks every constraint against the bindings of a match.
    pub(crate) fn accepts(&self, params: &Params, path: &str) -> bool {
        if self.constraints.is_empty() {
            return true;
        }
        let view = ParamsRef::new(&self.param_names, params, path);
        self.constraints.iter().all(|(index, constraint)| {
            view.get_index(*index)
                .is_some_and(|value| constraint.check(value))
        })
    }
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("method", &self.method)
            .field("pattern", &self.pattern.as_str())
            .field("name", &self.name)
            .field("version", &self.version)
            .field("constraints", &self.constraints)
            .field("storage", &self.storage)
            .finish()
    }
}
