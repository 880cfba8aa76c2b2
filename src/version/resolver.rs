use {
    super::{Deprecation, VersionConfig, VersionRequest, VersionStrategy},
    arc_swap::ArcSwap,
    http::header,
    regex::Regex,
    std::{
        borrow::Cow,
        fmt,
        ops::Range,
        sync::{Arc, LazyLock},
    },
};

/// `application/vnd.{vendor}.v{n}` with an optional `+suffix`.
static VENDOR_MEDIA_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[a-z*]+/vnd\.([a-z0-9][a-z0-9.-]*?)\.(v\d+)(?:\+[a-z0-9.-]+)?$")
        .expect("vendor media type regex is valid")
});

/// Where the resolved version came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionSource {
    Custom,
    Accept,
    Path,
    Header,
    Query,
    Default,
}

impl VersionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionSource::Custom => "custom",
            VersionSource::Accept => "accept",
            VersionSource::Path => "path",
            VersionSource::Header => "header",
            VersionSource::Query => "query",
            VersionSource::Default => "default",
        }
    }
}

impl fmt::Display for VersionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<VersionStrategy> for VersionSource {
    fn from(strategy: VersionStrategy) -> Self {
        match strategy {
            VersionStrategy::Accept => VersionSource::Accept,
            VersionStrategy::Path => VersionSource::Path,
            VersionStrategy::Header => VersionSource::Header,
            VersionStrategy::Query => VersionSource::Query,
        }
    }
}

/// Outcome of version resolution for one request.
#[derive(Debug, Clone)]
pub struct ResolvedVersion {
    version: Arc<str>,
    source: VersionSource,
    strip: Option<Range<usize>>,
    deprecation: Option<Arc<Deprecation>>,
}

impl ResolvedVersion {
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn source(&self) -> VersionSource {
        self.source
    }

    pub fn deprecation(&self) -> Option<&Deprecation> {
        self.deprecation.as_deref()
    }

    /// Byte range of the version segment to remove from the path before
    /// matching, e.g. `0..3` for `/v2/users`.
    pub fn strip_range(&self) -> Option<Range<usize>> {
        self.strip.clone()
    }

    pub(crate) fn shared_version(&self) -> &Arc<str> {
        &self.version
    }

    pub(crate) fn shared_deprecation(&self) -> Option<&Arc<Deprecation>> {
        self.deprecation.as_ref()
    }
}

struct Detection<'r> {
    token: Cow<'r, str>,
    source: VersionSource,
    range: Option<Range<usize>>,
}

/// Resolves request versions against a swappable [`VersionConfig`].
///
/// Readers take a lock-free snapshot for every request; [`update`](Self::update)
/// publishes a new configuration without blocking them.
pub struct VersionResolver {
    config: ArcSwap<VersionConfig>,
}

impl VersionResolver {
    pub fn new(config: VersionConfig) -> Self {
        Self {
            config: ArcSwap::from_pointee(config),
        }
    }

    /// Current configuration.
    pub fn snapshot(&self) -> Arc<VersionConfig> {
        self.config.load_full()
    }

    /// Replaces the configuration. In-flight requests keep the snapshot they
    /// started with.
    pub fn update(&self, config: VersionConfig) {
        tracing::info!(
            default_version = config.default_version(),
            "API version configuration updated"
        );
        self.config.store(Arc::new(config));
    }

    pub fn resolve(&self, request: &VersionRequest<'_>) -> ResolvedVersion {
        let config = self.config.load();
        let method = request.method();

        let Some(detection) = detect(&config, request) else {
            for observer in config.observers() {
                observer.on_missing(method);
            }
            return fallback(&config);
        };

        match config.accept(&detection.token) {
            Some(version) => {
                for observer in config.observers() {
                    observer.on_detected(&version, method);
                }
                let strip = match detection.source {
                    VersionSource::Path if config.strip_path_version() => detection.range,
                    _ => None,
                };
                ResolvedVersion {
                    deprecation: config.deprecation_for(&version),
                    version,
                    source: detection.source,
                    strip,
                }
            }
            None => {
                tracing::warn!(
                    attempted = %detection.token,
                    source = %detection.source,
                    default = config.default_version(),
                    "Unsupported API version requested, using default"
                );
                for observer in config.observers() {
                    observer.on_invalid(&detection.token, method);
                }
                fallback(&config)
            }
        }
    }
}

impl fmt::Debug for VersionResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionResolver")
            .field("config", &*self.config.load())
            .finish()
    }
}

fn fallback(config: &VersionConfig) -> ResolvedVersion {
    let version = config.default_arc().clone();
    ResolvedVersion {
        deprecation: config.deprecation_for(&version),
        version,
        source: VersionSource::Default,
        strip: None,
    }
}

fn detect<'r>(config: &VersionConfig, request: &VersionRequest<'r>) -> Option<Detection<'r>> {
    if let Some(detector) = config.detector() {
        if let Some(token) = (**detector)(request).filter(|t| !t.trim().is_empty()) {
            return Some(Detection {
                token: Cow::Owned(token),
                source: VersionSource::Custom,
                range: None,
            });
        }
    }

    const ORDER: [VersionStrategy; 4] = [
        VersionStrategy::Accept,
        VersionStrategy::Path,
        VersionStrategy::Header,
        VersionStrategy::Query,
    ];
    ORDER
        .into_iter()
        .filter(|strategy| config.is_enabled(*strategy))
        .find_map(|strategy| {
            let (token, range) = match strategy {
                VersionStrategy::Accept => (from_accept(config, request)?, None),
                VersionStrategy::Path => {
                    let (token, range) = from_path(request.path())?;
                    (Cow::Borrowed(token), Some(range))
                }
                VersionStrategy::Header => (from_header(config, request)?, None),
                VersionStrategy::Query => (from_query(config, request)?, None),
            };
            Some(Detection {
                token,
                source: strategy.into(),
                range,
            })
        })
}

fn from_accept<'r>(config: &VersionConfig, request: &VersionRequest<'r>) -> Option<Cow<'r, str>> {
    for value in request.headers().get_all(header::ACCEPT) {
        let Ok(value) = value.to_str() else {
            continue;
        };
        for entry in value.split(',') {
            let mut parts = entry.split(';');
            let media_type = parts.next().unwrap_or_default().trim();

            for param in parts {
                if let Some((key, value)) = param.split_once('=') {
                    if key.trim().eq_ignore_ascii_case("version") {
                        let value = value.trim().trim_matches('"');
                        if !value.is_empty() {
                            return Some(Cow::Borrowed(value));
                        }
                    }
                }
            }

            if let Some(captures) = VENDOR_MEDIA_TYPE.captures(media_type) {
                let vendor_matches = config
                    .vendor()
                    .is_none_or(|vendor| captures[1].eq_ignore_ascii_case(vendor));
                if vendor_matches {
                    if let Some(version) = captures.get(2) {
                        return Some(Cow::Borrowed(version.as_str()));
                    }
                }
            }
        }
    }
    None
}

/// First path segment if it looks like `v{digits}`, with its byte range
/// including the leading slash.
fn from_path(path: &str) -> Option<(&str, Range<usize>)> {
    let rest = path.strip_prefix('/')?;
    let segment = rest.split('/').next().unwrap_or_default();
    let digits = segment
        .strip_prefix('v')
        .or_else(|| segment.strip_prefix('V'))?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((segment, 0..1 + segment.len()))
}

fn from_header<'r>(config: &VersionConfig, request: &VersionRequest<'r>) -> Option<Cow<'r, str>> {
    let value = request.headers().get(config.header_name())?.to_str().ok()?.trim();
    (!value.is_empty()).then_some(Cow::Borrowed(value))
}

fn from_query<'r>(config: &VersionConfig, request: &VersionRequest<'r>) -> Option<Cow<'r, str>> {
    let query = request.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == config.query_param())
        .map(|(_, value)| value)
        .filter(|value| !value.trim().is_empty())
}
