//! Per-request state handed to handlers and middleware.
//!
//! A [`Context`] holds the request, the matched route and its parameter
//! bindings, the chain cursor and abort flag, a typed key/value store for
//! passing data between middleware, and the response being written.
//!
//! Contexts are pooled and reused across requests (see [`ContextPool`](crate::ContextPool)).
//! Handlers only ever receive `&mut Context` for the duration of one call, so
//! a context cannot be kept past the request; anything needed afterwards must
//! be copied out.

use {
    crate::{
        Error,
        diagnostics::{DiagnosticEvent, DiagnosticKind, Diagnostics},
        matcher::{Lookup, RouteEntry, RouteTable},
        negotiate,
        params::{Params, ParamsRef},
    },
    bytes::Bytes,
    http::{
        Extensions, HeaderMap, HeaderName, HeaderValue, Method, Request, Response, StatusCode,
        Uri, header,
    },
    serde::Serialize,
    std::{
        any::Any,
        borrow::Cow,
        collections::HashMap,
        fmt,
        net::{IpAddr, SocketAddr},
        ops::Range,
        sync::Arc,
    },
    tokio_util::sync::CancellationToken,
};

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const TEXT_HTML: &str = "text/html; charset=utf-8";
const APPLICATION_JSON: &str = "application/json";
const OCTET_STREAM: &str = "application/octet-stream";

/// Engine-wide settings every context needs at request time.
#[derive(Debug, Clone)]
pub(crate) struct ContextSettings {
    pub(crate) trusted_proxies: Vec<IpAddr>,
    pub(crate) max_forwarded_hops: usize,
    pub(crate) verbose_errors: bool,
    pub(crate) diagnostics: Diagnostics,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            trusted_proxies: Vec::new(),
            max_forwarded_hops: 10,
            verbose_errors: false,
            diagnostics: Diagnostics::disabled(),
        }
    }
}

type Store = HashMap<Cow<'static, str>, Box<dyn Any + Send + Sync>>;

/// Request/response state for one request.
pub struct Context {
    // Request
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    extensions: Extensions,
    body: Bytes,
    peer: Option<SocketAddr>,
    route_path: String,

    // Match
    route: Option<Arc<RouteEntry>>,
    params: Params,
    version: Option<Arc<str>>,

    // Chain
    cursor: usize,
    aborted: bool,
    cancel: Option<CancellationToken>,

    // Response
    status: StatusCode,
    response_headers: HeaderMap,
    response_body: Bytes,
    committed: bool,

    store: Store,
    settings: Arc<ContextSettings>,
}

impl Context {
    pub(crate) fn new(settings: Arc<ContextSettings>) -> Self {
        Self {
            method: Method::GET,
            uri: Uri::default(),
            headers: HeaderMap::new(),
            extensions: Extensions::new(),
            body: Bytes::new(),
            peer: None,
            route_path: String::new(),
            route: None,
            params: Params::new(),
            version: None,
            cursor: 0,
            aborted: false,
            cancel: None,
            status: StatusCode::OK,
            response_headers: HeaderMap::new(),
            response_body: Bytes::new(),
            committed: false,
            store: HashMap::new(),
            settings,
        }
    }

    // ------------------------------------------------------------------
    // Request
    // ------------------------------------------------------------------

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Request path as received, before version stripping or trimming.
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Path the route was matched against.
    pub fn route_path(&self) -> &str {
        &self.route_path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Value of a request header, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Raw request body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Address of the directly connected peer, when the transport provides it.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// First value of query parameter `name`, percent-decoded.
    pub fn query(&self, name: &str) -> Option<Cow<'_, str>> {
        self.query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// All query parameters in order, percent-decoded.
    pub fn query_pairs(&self) -> impl Iterator<Item = (Cow<'_, str>, Cow<'_, str>)> + '_ {
        url::form_urlencoded::parse(self.uri.query().unwrap_or_default().as_bytes())
    }

    /// Value bound to path parameter `name`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params().get(name)
    }

    /// All path parameter bindings of the matched route.
    pub fn params(&self) -> ParamsRef<'_> {
        match &self.route {
            Some(route) => ParamsRef::new(route.param_names(), &self.params, &self.route_path),
            None => ParamsRef::empty(),
        }
    }

    /// The matched route, `None` in fallback handlers.
    pub fn route(&self) -> Option<&RouteEntry> {
        self.route.as_deref()
    }

    pub fn route_name(&self) -> Option<&str> {
        self.route.as_ref()?.name()
    }

    /// API version the request was resolved to, when versioning is enabled.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Picks the best of `offers` for the request's `Accept` header.
    pub fn negotiate<'o>(&self, offers: &[&'o str]) -> Option<&'o str> {
        negotiate::media_type(self.header("accept"), offers)
    }

    /// Picks the best of `offers` for the request's `Accept-Charset` header.
    pub fn negotiate_charset<'o>(&self, offers: &[&'o str]) -> Option<&'o str> {
        negotiate::charset(self.header("accept-charset"), offers)
    }

    /// Picks the best of `offers` for the request's `Accept-Encoding` header.
    pub fn negotiate_encoding<'o>(&self, offers: &[&'o str]) -> Option<&'o str> {
        negotiate::encoding(self.header("accept-encoding"), offers)
    }

    /// Picks the best of `offers` for the request's `Accept-Language` header.
    pub fn negotiate_language<'o>(&self, offers: &[&'o str]) -> Option<&'o str> {
        negotiate::language(self.header("accept-language"), offers)
    }

    /// Client address, honouring `X-Forwarded-For` from trusted proxies.
    ///
    /// The chain is walked from the right and the first address that is not a
    /// trusted proxy wins. A chain longer than the configured hop limit, or
    /// one containing an unparseable entry, is ignored and reported as
    /// [`DiagnosticKind::XffSuspicious`].
    pub fn client_ip(&self) -> Option<IpAddr> {
        let peer = self.peer.map(|addr| addr.ip());
        if !peer.is_some_and(|ip| self.is_trusted(ip)) {
            return peer;
        }
        let Some(chain) = self.header("x-forwarded-for") else {
            return peer;
        };

        let hops = chain.split(',').count();
        if hops > self.settings.max_forwarded_hops {
            self.settings.diagnostics.emit_with(|| {
                DiagnosticEvent::new(
                    DiagnosticKind::XffSuspicious,
                    "X-Forwarded-For chain exceeds the hop limit",
                )
                .with_field("hops", hops)
                .with_field("limit", self.settings.max_forwarded_hops)
            });
            return peer;
        }

        let mut client = None;
        for entry in chain.rsplit(',') {
            let Ok(ip) = entry.trim().parse::<IpAddr>() else {
                self.settings.diagnostics.emit_with(|| {
                    DiagnosticEvent::new(
                        DiagnosticKind::XffSuspicious,
                        "X-Forwarded-For chain contains an invalid address",
                    )
                    .with_field("entry", entry.trim().escape_debug())
                });
                return peer;
            };
            client = Some(ip);
            if !self.is_trusted(ip) {
                break;
            }
        }
        client.or(peer)
    }

    /// Request scheme, honouring `X-Forwarded-Proto` from trusted proxies.
    ///
    /// Values other than `http` and `https` are ignored and reported as
    /// [`DiagnosticKind::InvalidProto`].
    pub fn scheme(&self) -> &'static str {
        let direct = match self.uri.scheme_str() {
            Some(s) if s.eq_ignore_ascii_case("https") => "https",
            _ => "http",
        };
        if !self.peer.is_some_and(|addr| self.is_trusted(addr.ip())) {
            return direct;
        }
        let Some(proto) = self.header("x-forwarded-proto") else {
            return direct;
        };

        let proto = proto.trim();
        if proto.eq_ignore_ascii_case("https") {
            "https"
        } else if proto.eq_ignore_ascii_case("http") {
            "http"
        } else {
            self.settings.diagnostics.emit_with(|| {
                DiagnosticEvent::new(
                    DiagnosticKind::InvalidProto,
                    "X-Forwarded-Proto is neither http nor https",
                )
                .with_field("value", proto.escape_debug())
            });
            direct
        }
    }

    fn is_trusted(&self, ip: IpAddr) -> bool {
        self.settings.trusted_proxies.contains(&ip)
    }

    // ------------------------------------------------------------------
    // Key/value store
    // ------------------------------------------------------------------

    /// Stores a value for later middleware or the handler.
    pub fn set<T>(&mut self, key: impl Into<Cow<'static, str>>, value: T)
    where
        T: Any + Send + Sync,
    {
        self.store.insert(key.into(), Box::new(value));
    }

    /// Returns the value stored under `key` if it has type `T`.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.store.get(key)?.downcast_ref()
    }

    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.store.get_mut(key)?.downcast_mut()
    }

    /// Removes and returns the value under `key`. A value of another type
    /// stays in place.
    pub fn remove<T: Any>(&mut self, key: &str) -> Option<T> {
        let (key, value) = self.store.remove_entry(key)?;
        match value.downcast::<T>() {
            Ok(value) => Some(*value),
            Err(value) => {
                self.store.insert(key, value);
                None
            }
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.store.contains_key(key)
    }

    // ------------------------------------------------------------------
    // Response
    // ------------------------------------------------------------------

    /// Status of the response being written. 200 until something sets it.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
        self.committed = true;
    }

    pub fn response_headers(&self) -> &HeaderMap {
        &self.response_headers
    }

    pub fn response_headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.response_headers
    }

    pub fn response_body(&self) -> &Bytes {
        &self.response_body
    }

    /// Returns true once a status or body was written.
    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Sets a response header from untrusted text.
    ///
    /// Values containing CR or LF are rejected and reported as
    /// [`DiagnosticKind::HeaderInjection`].
    pub fn set_header(&mut self, name: &str, value: &str) -> crate::Result<()> {
        if name.contains(['\r', '\n']) || value.contains(['\r', '\n']) {
            self.settings.diagnostics.emit_with(|| {
                DiagnosticEvent::new(
                    DiagnosticKind::HeaderInjection,
                    "rejected response header containing CR or LF",
                )
                .with_field("header", name.escape_debug())
                .with_field("path", self.uri.path())
            });
            return Err(Error::invalid_input(format!(
                "header `{}` contains CR or LF",
                name.escape_debug()
            )));
        }

        let name = HeaderName::from_bytes(name.as_bytes())?;
        let value = HeaderValue::from_str(value)?;
        self.response_headers.insert(name, value);
        Ok(())
    }

    /// Writes a plain text response.
    pub fn text(&mut self, status: StatusCode, body: impl Into<String>) {
        self.write(status, TEXT_PLAIN, Bytes::from(body.into()));
    }

    /// Writes an HTML response.
    pub fn html(&mut self, status: StatusCode, body: impl Into<String>) {
        self.write(status, TEXT_HTML, Bytes::from(body.into()));
    }

    /// Writes a JSON response. A value that fails to serialize becomes a 500.
    pub fn json<T: Serialize + ?Sized>(&mut self, status: StatusCode, value: &T) {
        match serde_json::to_vec(value) {
            Ok(body) => self.write(status, APPLICATION_JSON, Bytes::from(body)),
            Err(err) => {
                self.write_error(&Error::internal(format!("failed to serialize response: {err}")))
            }
        }
    }

    /// Writes a binary response.
    pub fn bytes(&mut self, status: StatusCode, body: impl Into<Bytes>) {
        self.write(status, OCTET_STREAM, body.into());
    }

    fn write(&mut self, status: StatusCode, content_type: &'static str, body: Bytes) {
        self.status = status;
        self.response_headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        self.response_body = body;
        self.committed = true;
    }

    fn write_error(&mut self, error: &Error) {
        let status = error.status_code();
        let response = error.to_error_response();

        tracing::error!(
            error_code = %response.error_code,
            message = %response.message,
            status = %status.as_u16(),
            "Error occurred"
        );

        let body = serde_json::to_vec(&response).unwrap_or_default();
        self.write(status, APPLICATION_JSON, Bytes::from(body));
    }

    // ------------------------------------------------------------------
    // Chain control
    // ------------------------------------------------------------------

    /// Stops the chain. Links after the current one are not run.
    pub fn abort(&mut self) {
        self.aborted = true;
    }

    /// Stops the chain and responds with `status` and an empty body.
    pub fn abort_with_status(&mut self, status: StatusCode) {
        self.response_body = Bytes::new();
        self.response_headers.remove(header::CONTENT_TYPE);
        self.set_status(status);
        self.aborted = true;
    }

    /// Stops the chain and responds with the JSON rendering of `error`.
    pub fn abort_with_error(&mut self, error: Error) {
        self.write_error(&error);
        self.aborted = true;
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Returns true if the client went away or the request timed out.
    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Number of chain links entered so far, the handler included.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    // ------------------------------------------------------------------
    // Engine side
    // ------------------------------------------------------------------

    pub(crate) fn advance_cursor(&mut self) {
        self.cursor += 1;
    }

    pub(crate) fn set_cancellation(&mut self, token: Option<CancellationToken>) {
        self.cancel = token;
    }

    pub(crate) fn stop_cancelled(&mut self, status: StatusCode) {
        self.aborted = true;
        if !self.committed {
            self.text(status, status.canonical_reason().unwrap_or_default());
        }
    }

    pub(crate) fn reserve_params(&mut self, capacity: usize) {
        self.params.reserve_heap(capacity);
    }

    pub(crate) fn load(&mut self, request: Request<Bytes>, peer: Option<SocketAddr>) {
        let (parts, body) = request.into_parts();
        self.method = parts.method;
        self.uri = parts.uri;
        self.headers = parts.headers;
        self.extensions = parts.extensions;
        self.body = body;
        self.peer = peer;
        self.route_path.clear();
        self.route_path.push_str(self.uri.path());
    }

    /// Removes `range` (a version segment) from the path used for matching.
    pub(crate) fn strip_route_path(&mut self, range: Range<usize>) {
        if range.end <= self.route_path.len() {
            self.route_path.replace_range(range, "");
        }
        if self.route_path.is_empty() {
            self.route_path.push('/');
        }
    }

    pub(crate) fn trim_trailing_slash(&mut self) {
        if self.route_path.len() > 1 && self.route_path.ends_with('/') {
            self.route_path.pop();
        }
    }

    pub(crate) fn match_in<'t>(&mut self, table: &'t RouteTable) -> Lookup<'t> {
        table.lookup(&self.method, &self.route_path, &mut self.params)
    }

    pub(crate) fn set_route(&mut self, route: Arc<RouteEntry>) {
        self.route = Some(route);
    }

    pub(crate) fn set_version(&mut self, version: Arc<str>) {
        self.version = Some(version);
    }

    /// Presets the response of an unmatched request before the fallback runs.
    pub(crate) fn preset(&mut self, status: StatusCode, allow: Option<HeaderValue>) {
        self.status = status;
        if let Some(allow) = allow {
            self.response_headers.insert(header::ALLOW, allow);
        }
    }

    /// Writes the 500 used when a panic reaches the dispatch boundary.
    pub(crate) fn write_panic(&mut self, message: &str) {
        let body = if self.settings.verbose_errors {
            format!("Internal Server Error: {message}")
        } else {
            "Internal Server Error".to_string()
        };
        self.response_headers.clear();
        self.text(StatusCode::INTERNAL_SERVER_ERROR, body);
        self.aborted = true;
    }

    pub(crate) fn take_response(&mut self) -> Response<Bytes> {
        let mut response = Response::new(std::mem::take(&mut self.response_body));
        *response.status_mut() = self.status;
        *response.headers_mut() = std::mem::take(&mut self.response_headers);
        response
    }

    /// Clears every request-derived field. Buffers keep their capacity.
    pub(crate) fn reset(&mut self) {
        self.method = Method::GET;
        self.uri = Uri::default();
        self.headers.clear();
        self.extensions.clear();
        self.body = Bytes::new();
        self.peer = None;
        self.route_path.clear();

        self.route = None;
        self.params.clear();
        self.version = None;

        self.cursor = 0;
        self.aborted = false;
        self.cancel = None;

        self.status = StatusCode::OK;
        self.response_headers.clear();
        self.response_body = Bytes::new();
        self.committed = false;

        self.store.clear();
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("method", &self.method)
            .field("path", &self.uri.path())
            .field("route", &self.route.as_ref().map(|r| r.pattern().as_str()))
            .field("params", &self.params())
            .field("version", &self.version)
            .field("status", &self.status)
            .field("aborted", &self.aborted)
            .finish()
    }
}
