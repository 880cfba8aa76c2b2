use {
    super::{
        bloom::BloomFilter,
        route::RouteEntry,
        tree::{Node, RouteId, start_position},
    },
    crate::{Error, Result, chain::Chain, params::Params},
    http::Method,
    std::{
        collections::{HashMap, HashSet},
        sync::Arc,
    },
};

/// Outcome of a table lookup.
#[derive(Debug)]
pub enum Lookup<'t> {
    /// A route matched; parameters were bound.
    Found(&'t Arc<RouteEntry>),
    /// The path matches routes of other methods only, listed in canonical order.
    MethodNotAllowed(Vec<Method>),
    /// Nothing matches the path.
    NotFound,
}

#[derive(Default)]
struct MethodTable {
    statics: HashMap<Box<str>, RouteId>,
    tree: Node,
}

/// Routes of one API version, compiled for lookup.
///
/// Literal-only patterns go into a per-method hash index fronted by a bloom
/// filter over every static path. Patterns with parameters go into a
/// per-method trie.
#[derive(Default)]
pub struct RouteTable {
    methods: Vec<(Method, MethodTable)>,
    routes: Vec<Arc<RouteEntry>>,
    shapes: HashSet<(Method, String)>,
    bloom: Option<BloomFilter>,
    max_params: usize,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a route. Fails if a route of the same method and shape exists.
    pub(crate) fn insert(&mut self, entry: RouteEntry) -> Result<RouteId> {
        let shape = entry.pattern().shape();
        if !self.shapes.insert((entry.method().clone(), shape)) {
            return Err(Error::duplicate_route(format!(
                "{} {} conflicts with an existing route",
                entry.method(),
                entry.pattern()
            )));
        }

        let id = self.routes.len();
        let table = self.method_table_mut(entry.method());
        if entry.pattern().is_static() {
            table
                .statics
                .insert(Box::from(entry.pattern().as_str()), id);
        } else if let Some(existing) = table.tree.insert(entry.pattern().segments(), id) {
            return Err(Error::duplicate_route(format!(
                "{} {} conflicts with route #{existing}",
                entry.method(),
                entry.pattern()
            )));
        }

        self.max_params = self.max_params.max(entry.param_names().len());
        self.routes.push(Arc::new(entry));
        Ok(id)
    }

    pub(crate) fn entry(&self, id: RouteId) -> &Arc<RouteEntry> {
        &self.routes[id]
    }

    /// Builds the bloom filter and composes every route's chain.
    pub(crate) fn freeze<F>(&mut self, mut compose: F)
    where
        F: FnMut(&RouteEntry) -> Chain,
    {
        let statics = self.methods.iter().map(|(_, t)| t.statics.len()).sum();
        let mut bloom = BloomFilter::with_capacity(statics);
        for (_, table) in &self.methods {
            for path in table.statics.keys() {
                bloom.insert(path);
            }
        }
        self.bloom = Some(bloom);

        for slot in &mut self.routes {
            let chain = compose(&**slot);
            Arc::make_mut(slot).set_chain(chain);
        }
    }

    /// Resolves `(method, path)`, binding parameters into `params`.
    ///
    /// A HEAD request with no HEAD route falls back to the GET route.
    pub(crate) fn lookup(&self, method: &Method, path: &str, params: &mut Params) -> Lookup<'_> {
        if let Some(entry) = self.find(method, path, params) {
            return Lookup::Found(entry);
        }
        if method == Method::HEAD {
            if let Some(entry) = self.find(&Method::GET, path, params) {
                return Lookup::Found(entry);
            }
        }

        let mut allowed: Vec<Method> = self
            .methods
            .iter()
            .map(|(m, _)| m)
            .filter(|m| *m != method)
            .filter(|m| self.find(m, path, params).is_some())
            .cloned()
            .collect();
        params.clear();

        if allowed.is_empty() {
            return Lookup::NotFound;
        }
        allowed.sort_by_key(method_rank);
        Lookup::MethodNotAllowed(allowed)
    }

    fn find(&self, method: &Method, path: &str, params: &mut Params) -> Option<&Arc<RouteEntry>> {
        params.clear();
        let table = self.method_table(method)?;

        let maybe_static = self.bloom.as_ref().is_none_or(|b| b.may_contain(path));
        if maybe_static {
            if let Some(&id) = table.statics.get(path) {
                return Some(&self.routes[id]);
            }
        }

        let id = table.tree.find(path, start_position(path), params)?;
        let entry = &self.routes[id];
        if entry.accepts(params, path) {
            Some(entry)
        } else {
            params.clear();
            None
        }
    }

    fn method_table(&self, method: &Method) -> Option<&MethodTable> {
        self.methods
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, t)| t)
    }

    fn method_table_mut(&mut self, method: &Method) -> &mut MethodTable {
        let index = match self.methods.iter().position(|(m, _)| m == method) {
            Some(index) => index,
            None => {
                self.methods.push((method.clone(), MethodTable::default()));
                self.methods.len() - 1
            }
        };
        &mut self.methods[index].1
    }

    /// Registered routes in registration order.
    pub fn routes(&self) -> impl Iterator<Item = &Arc<RouteEntry>> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Largest parameter count of any route in the table.
    pub fn max_params(&self) -> usize {
        self.max_params
    }
}

fn method_rank(method: &Method) -> (u8, String) {
    let rank = match *method {
        Method::GET => 0,
        Method::HEAD => 1,
        Method::POST => 2,
        Method::PUT => 3,
        Method::PATCH => 4,
        Method::DELETE => 5,
        Method::OPTIONS => 6,
        Method::CONNECT => 7,
        Method::TRACE => 8,
        _ => 9,
    };
    (rank, method.as_str().to_owned())
}

/// Formats methods for an `Allow` header, in canonical order.
pub(crate) fn allow_header(methods: &[Method]) -> String {
    let mut methods: Vec<&Method> = methods.iter().collect();
    methods.sort_by_key(|m| method_rank(m));
    methods.dedup();
    methods
        .iter()
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
