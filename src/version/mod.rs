//! API version detection and deprecation metadata.
//!
//! A [`VersionConfig`] is an immutable snapshot describing how versions are
//! detected and which are allowed or deprecated. The [`VersionResolver`]
//! holds the current snapshot behind an atomically swapped pointer and
//! resolves every request against it.
//!
//! Detection order is fixed and the first hit wins:
//!
//! 1. the custom detector, when one is set
//! 2. `Accept` (`version=2` parameter or `application/vnd.{vendor}.v2+json`)
//! 3. the first path segment (`/v2/users`)
//! 4. the version header (`X-API-Version: 2`)
//! 5. the query parameter (`?version=2`)
//! 6. the default version
//!
//! Strategies 2 to 5 only run when enabled. Tokens are normalized to lower
//! case and a bare number `2` becomes `v2`.
//!
//! # Example
//!
//! ```rust
//! use axum_dispatch::{Deprecation, VersionConfig, VersionStrategy};
//! use chrono::{TimeZone, Utc};
//!
//! let config = VersionConfig::builder("v2")
//!     .strategies([VersionStrategy::Header, VersionStrategy::Query])
//!     .allow(["v1", "v2"])
//!     .deprecate(
//!         "v1",
//!         Deprecation::new(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap())
//!             .with_link("https://example.com/migrate"),
//!     )
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.default_version(), "v2");
//! assert!(config.deprecation("v1").is_some());
//! ```

mod resolver;

pub use resolver::{ResolvedVersion, VersionResolver, VersionSource};

use {
    crate::{Error, Result, utils::http_date},
    chrono::{DateTime, Utc},
    http::{HeaderMap, HeaderName, HeaderValue, Method, header},
    serde::Deserialize,
    std::{borrow::Cow, collections::HashMap, fmt, sync::Arc},
};

/// A built-in detection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionStrategy {
    Accept,
    Path,
    Header,
    Query,
}

impl VersionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionStrategy::Accept => "accept",
            VersionStrategy::Path => "path",
            VersionStrategy::Header => "header",
            VersionStrategy::Query => "query",
        }
    }
}

impl fmt::Display for VersionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sunset date and migration link of a deprecated version.
///
/// Every response served under a deprecated version carries:
///
/// ```text
/// Sunset: Tue, 01 Jan 2030 00:00:00 GMT
/// Deprecation: true
/// Link: <https://example.com/migrate>; rel="deprecation"
/// ```
#[derive(Debug, Clone)]
pub struct Deprecation {
    sunset: DateTime<Utc>,
    link: Option<String>,
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl Deprecation {
    pub fn new(sunset: DateTime<Utc>) -> Self {
        Self {
            sunset,
            link: None,
            headers: Vec::new(),
        }
    }

    /// Sets the migration guide advertised in the `Link` header.
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn sunset(&self) -> DateTime<Utc> {
        self.sunset
    }

    pub fn link(&self) -> Option<&str> {
        self.link.as_deref()
    }

    /// Response headers, rendered once when the config is built.
    pub(crate) fn headers(&self) -> &[(HeaderName, HeaderValue)] {
        &self.headers
    }

    fn render(&mut self) -> Result<()> {
        let mut headers = vec![
            (
                HeaderName::from_static("sunset"),
                HeaderValue::from_str(&http_date(&self.sunset))?,
            ),
            (
                HeaderName::from_static("deprecation"),
                HeaderValue::from_static("true"),
            ),
        ];
        if let Some(link) = &self.link {
            let value = HeaderValue::from_str(&format!("<{link}>; rel=\"deprecation\""))
                .map_err(|err| Error::config(format!("invalid deprecation link `{link}`: {err}")))?;
            headers.push((header::LINK, value));
        }
        self.headers = headers;
        Ok(())
    }
}

/// Request data a version detector can look at.
#[derive(Debug, Clone, Copy)]
pub struct VersionRequest<'r> {
    method: &'r Method,
    path: &'r str,
    query: Option<&'r str>,
    headers: &'r HeaderMap,
}

impl<'r> VersionRequest<'r> {
    pub fn new(
        method: &'r Method,
        path: &'r str,
        query: Option<&'r str>,
        headers: &'r HeaderMap,
    ) -> Self {
        Self {
            method,
            path,
            query,
            headers,
        }
    }

    pub fn method(&self) -> &'r Method {
        self.method
    }

    pub fn path(&self) -> &'r str {
        self.path
    }

    pub fn query(&self) -> Option<&'r str> {
        self.query
    }

    pub fn headers(&self) -> &'r HeaderMap {
        self.headers
    }

    /// Value of a header, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&'r str> {
        self.headers.get(name)?.to_str().ok()
    }
}

/// Receives version resolution events, typically to feed metrics.
///
/// All methods default to doing nothing.
pub trait VersionObserver: Send + Sync {
    /// A version was detected and accepted.
    fn on_detected(&self, version: &str, method: &Method) {
        let _ = (version, method);
    }

    /// Nothing was detected; the default version is used.
    fn on_missing(&self, method: &Method) {
        let _ = method;
    }

    /// A token was detected but is not allowed; the default version is used.
    fn on_invalid(&self, attempted: &str, method: &Method) {
        let _ = (attempted, method);
    }
}

impl<O: VersionObserver + ?Sized> VersionObserver for Arc<O> {
    fn on_detected(&self, version: &str, method: &Method) {
        (**self).on_detected(version, method)
    }

    fn on_missing(&self, method: &Method) {
        (**self).on_missing(method)
    }

    fn on_invalid(&self, attempted: &str, method: &Method) {
        (**self).on_invalid(attempted, method)
    }
}

type CustomDetector = Arc<dyn Fn(&VersionRequest<'_>) -> Option<String> + Send + Sync>;

/// Immutable version detection settings.
#[derive(Clone)]
pub struct VersionConfig {
    default: Arc<str>,
    strategies: Vec<VersionStrategy>,
    header_name: HeaderName,
    query_param: String,
    vendor: Option<String>,
    allowed: Vec<Arc<str>>,
    deprecations: HashMap<Arc<str>, Arc<Deprecation>>,
    detector: Option<CustomDetector>,
    observers: Vec<Arc<dyn VersionObserver>>,
    strip_path_version: bool,
}

impl VersionConfig {
    /// Starts a configuration with `default` as the fallback version.
    pub fn builder(default: impl Into<String>) -> VersionConfigBuilder {
        VersionConfigBuilder::new(default.into())
    }

    pub fn default_version(&self) -> &str {
        &self.default
    }

    /// Enabled built-in strategies.
    pub fn strategies(&self) -> &[VersionStrategy] {
        &self.strategies
    }

    pub fn is_enabled(&self, strategy: VersionStrategy) -> bool {
        self.strategies.contains(&strategy)
    }

    pub fn header_name(&self) -> &HeaderName {
        &self.header_name
    }

    pub fn query_param(&self) -> &str {
        &self.query_param
    }

    pub fn vendor(&self) -> Option<&str> {
        self.vendor.as_deref()
    }

    /// The allow-list. Empty means every well-formed token is accepted.
    pub fn allowed_versions(&self) -> impl Iterator<Item = &str> {
        self.allowed.iter().map(|v| &**v)
    }

    /// Returns true if `version` would be accepted.
    pub fn is_allowed(&self, version: &str) -> bool {
        self.accept(version).is_some()
    }

    pub fn deprecation(&self, version: &str) -> Option<&Deprecation> {
        let version = normalize(version)?;
        self.deprecations.get(&*version).map(|d| &**d)
    }

    pub fn strip_path_version(&self) -> bool {
        self.strip_path_version
    }

    /// Canonical form of `token` if it is acceptable.
    ///
    /// Reuses the shared string of a known version so that accepted tokens do
    /// not allocate.
    pub(crate) fn accept(&self, token: &str) -> Option<Arc<str>> {
        let token = normalize(token)?;
        if !self.allowed.is_empty() {
            return self.allowed.iter().find(|v| ***v == *token).cloned();
        }
        if *self.default == *token {
            return Some(self.default.clone());
        }
        Some(Arc::from(token.as_ref()))
    }

    pub(crate) fn deprecation_for(&self, version: &str) -> Option<Arc<Deprecation>> {
        self.deprecations.get(version).cloned()
    }

    pub(crate) fn default_arc(&self) -> &Arc<str> {
        &self.default
    }

    pub(crate) fn detector(&self) -> Option<&CustomDetector> {
        self.detector.as_ref()
    }

    pub(crate) fn observers(&self) -> &[Arc<dyn VersionObserver>] {
        &self.observers
    }
}

impl fmt::Debug for VersionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionConfig")
            .field("default", &self.default)
            .field("strategies", &self.strategies)
            .field("header_name", &self.header_name)
            .field("query_param", &self.query_param)
            .field("vendor", &self.vendor)
            .field("allowed", &self.allowed)
            .field("deprecated", &self.deprecations.keys().collect::<Vec<_>>())
            .field("custom_detector", &self.detector.is_some())
            .field("observers", &self.observers.len())
            .field("strip_path_version", &self.strip_path_version)
            .finish()
    }
}

/// Builder for [`VersionConfig`]. Validation happens in [`build`](Self::build).
pub struct VersionConfigBuilder {
    default: String,
    strategies: Vec<VersionStrategy>,
    header_name: String,
    query_param: String,
    vendor: Option<String>,
    allowed: Vec<String>,
    deprecations: Vec<(String, Deprecation)>,
    detector: Option<CustomDetector>,
    observers: Vec<Arc<dyn VersionObserver>>,
    strip_path_version: bool,
}

impl VersionConfigBuilder {
    fn new(default: String) -> Self {
        Self {
            default,
            strategies: vec![
                VersionStrategy::Accept,
                VersionStrategy::Path,
                VersionStrategy::Header,
                VersionStrategy::Query,
            ],
            header_name: "X-API-Version".into(),
            query_param: "version".into(),
            vendor: None,
            allowed: Vec::new(),
            deprecations: Vec::new(),
            detector: None,
            observers: Vec::new(),
            strip_path_version: true,
        }
    }

    /// Replaces the enabled built-in strategies.
    pub fn strategies(mut self, strategies: impl IntoIterator<Item = VersionStrategy>) -> Self {
        self.strategies = strategies.into_iter().collect();
        self
    }

    pub fn header_name(mut self, name: impl Into<String>) -> Self {
        self.header_name = name.into();
        self
    }

    pub fn query_param(mut self, name: impl Into<String>) -> Self {
        self.query_param = name.into();
        self
    }

    /// Requires `application/vnd.{vendor}.vN` media types to name this vendor.
    pub fn vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = Some(vendor.into());
        self
    }

    /// Restricts accepted versions.
    pub fn allow<I>(mut self, versions: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.allowed.extend(versions.into_iter().map(Into::into));
        self
    }

    pub fn deprecate(mut self, version: impl Into<String>, deprecation: Deprecation) -> Self {
        self.deprecations.push((version.into(), deprecation));
        self
    }

    /// Runs before every built-in strategy.
    pub fn custom_detector<F>(mut self, detector: F) -> Self
    where
        F: Fn(&VersionRequest<'_>) -> Option<String> + Send + Sync + 'static,
    {
        self.detector = Some(Arc::new(detector));
        self
    }

    pub fn observer(mut self, observer: impl VersionObserver + 'static) -> Self {
        self.observers.push(Arc::new(observer));
        self
    }

    /// Whether `/v2/users` is matched as `/users` once `v2` was detected in
    /// the path.
    pub fn strip_path_version(mut self, strip: bool) -> Self {
        self.strip_path_version = strip;
        self
    }

    pub fn build(self) -> Result<VersionConfig> {
        let default = normalize(&self.default).ok_or_else(|| {
            Error::config(format!(
                "invalid default API version `{}`. Use a token such as `v1`.",
                self.default
            ))
        })?;
        let default: Arc<str> = Arc::from(default.as_ref());

        for (i, strategy) in self.strategies.iter().enumerate() {
            if self.strategies[..i].contains(strategy) {
                return Err(Error::config(format!(
                    "version strategy `{strategy}` is listed more than once"
                )));
            }
        }

        let header_name = HeaderName::from_bytes(self.header_name.as_bytes()).map_err(|err| {
            Error::config(format!(
                "invalid version header name `{}`: {err}",
                self.header_name
            ))
        })?;

        if self.query_param.trim().is_empty() {
            return Err(Error::config("version query parameter cannot be empty"));
        }

        let mut allowed: Vec<Arc<str>> = Vec::with_capacity(self.allowed.len());
        for version in &self.allowed {
            let normalized = normalize(version)
                .ok_or_else(|| Error::config(format!("invalid allowed API version `{version}`")))?;
            if *normalized == *default {
                allowed.push(default.clone());
            } else if !allowed.iter().any(|v| **v == *normalized) {
                allowed.push(Arc::from(normalized.as_ref()));
            }
        }
        if !allowed.is_empty() && !allowed.contains(&default) {
            return Err(Error::config(format!(
                "default API version `{default}` is not in allowed_versions"
            )));
        }

        let mut deprecations = HashMap::with_capacity(self.deprecations.len());
        for (version, mut deprecation) in self.deprecations {
            let normalized = normalize(&version)
                .ok_or_else(|| Error::config(format!("invalid deprecated API version `{version}`")))?;
            if !allowed.is_empty() && !allowed.iter().any(|v| **v == *normalized) {
                return Err(Error::config(format!(
                    "deprecated API version `{version}` is not in allowed_versions"
                )));
            }
            deprecation.render()?;
            deprecations.insert(Arc::from(normalized.as_ref()), Arc::new(deprecation));
        }

        Ok(VersionConfig {
            default,
            strategies: self.strategies,
            header_name,
            query_param: self.query_param,
            vendor: self.vendor.map(|v| v.to_ascii_lowercase()),
            allowed,
            deprecations,
            detector: self.detector,
            observers: self.observers,
            strip_path_version: self.strip_path_version,
        })
    }
}

/// Canonical form of a version token: trimmed, lower case, bare numbers
/// prefixed with `v`. Returns `None` for empty or malformed tokens.
pub(crate) fn normalize(token: &str) -> Option<Cow<'_, str>> {
    let token = token.trim();
    if token.is_empty()
        || token.len() > 32
        || !token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_'))
    {
        return None;
    }
    if token.bytes().all(|b| b.is_ascii_digit()) {
        return Some(Cow::Owned(format!("v{token}")));
    }
    if token.bytes().any(|b| b.is_ascii_uppercase()) {
        return Some(Cow::Owned(token.to_ascii_lowercase()));
    }
    Some(Cow::Borrowed(token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use chrono::TimeZone;

    fn sunset() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("v2").as_deref(), Some("v2"));
        assert_eq!(normalize(" V2 ").as_deref(), Some("v2"));
        assert_eq!(normalize("2").as_deref(), Some("v2"));
        assert_eq!(normalize("2024-01-01").as_deref(), Some("2024-01-01"));
        assert_eq!(normalize(""), None);
        assert_eq!(normalize("v 2"), None);
        assert_eq!(normalize("v2\r\n"), Some(Cow::Borrowed("v2")));
    }

    #[test]
    fn test_build_defaults() {
        let config = VersionConfig::builder("1").build().unwrap();
        assert_eq!(config.default_version(), "v1");
        assert_eq!(config.strategies().len(), 4);
        assert_eq!(config.header_name().as_str(), "x-api-version");
        assert_eq!(config.query_param(), "version");
        assert!(config.strip_path_version());
        assert!(config.is_allowed("v7"));
    }

    #[test]
    fn test_build_rejects_bad_settings() {
        let cases = [
            VersionConfig::builder(""),
            VersionConfig::builder("v1").strategies([VersionStrategy::Path, VersionStrategy::Path]),
            VersionConfig::builder("v1").header_name("bad header"),
            VersionConfig::builder("v1").query_param(" "),
            VersionConfig::builder("v3").allow(["v1", "v2"]),
            VersionConfig::builder("v1")
                .allow(["v1"])
                .deprecate("v0", Deprecation::new(sunset())),
            VersionConfig::builder("v1").deprecate(
                "v1",
                Deprecation::new(sunset()).with_link("https://example.com/\nx"),
            ),
        ];
        for builder in cases {
            assert_eq!(builder.build().unwrap_err().kind(), ErrorKind::Configuration);
        }
    }

    #[test]
    fn test_allow_list_normalized() {
        let config = VersionConfig::builder("v1")
            .allow(["1", "V2"])
            .build()
            .unwrap();
        assert_eq!(config.allowed_versions().collect::<Vec<_>>(), vec!["v1", "v2"]);
        assert!(config.is_allowed("2"));
        assert!(!config.is_allowed("v3"));
        assert!(Arc::ptr_eq(&config.accept("V1").unwrap(), config.default_arc()));
    }

    #[test]
    fn test_deprecation_headers() {
        let config = VersionConfig::builder("v2")
            .deprecate(
                "v1",
                Deprecation::new(sunset()).with_link("https://example.com/migrate"),
            )
            .build()
            .unwrap();
        let deprecation = config.deprecation("V1").unwrap();
        assert_eq!(deprecation.sunset(), sunset());
        let headers: Vec<(String, String)> = deprecation
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap().to_string()))
            .collect();
        assert_eq!(
            headers,
            vec![
                ("sunset".into(), "Tue, 01 Jan 2030 00:00:00 GMT".into()),
                ("deprecation".into(), "true".into()),
                (
                    "link".into(),
                    "<https://example.com/migrate>; rel=\"deprecation\"".into()
                ),
            ]
        );
    }

    #[test]
    fn test_deprecation_without_link() {
        let config = VersionConfig::builder("v2")
            .deprecate("v1", Deprecation::new(sunset()))
            .build()
            .unwrap();
        assert_eq!(config.deprecation("v1").unwrap().headers().len(), 2);
    }
}
