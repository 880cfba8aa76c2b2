use {
    crate::{
        Result,
        version::{Deprecation, VersionConfig, VersionStrategy},
    },
    chrono::{DateTime, Utc},
    serde::Deserialize,
    std::collections::BTreeMap,
};

///
/// Configuration for API version detection.
///
/// Detection runs in a fixed order (custom detector, accept, path, header,
/// query, default); `strategies` only selects which of the built-in steps are
/// active. Custom detectors and observers cannot be expressed in TOML and are
/// attached through [`VersionConfig::builder`] instead.
///
/// ```toml
/// [versioning]
/// strategies = ["path", "header", "query"]
/// default_version = "v1"
/// allowed_versions = ["v1", "v2"]
///
/// [versioning.deprecations.v1]
/// sunset = "2030-01-01T00:00:00Z"
/// link = "https://example.com/docs/migrate-to-v2"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct VersioningConfig {
    /// Built-in detection strategies to enable.
    /// By default `strategies` is `["accept", "path", "header", "query"]`.
    #[serde(default = "VersioningConfig::default_strategies")]
    pub strategies: Vec<VersionStrategy>,

    /// Version used when nothing is detected or the detected token is not allowed.
    pub default_version: String,

    /// When not empty, only these versions are accepted.
    #[serde(default)]
    pub allowed_versions: Vec<String>,

    /// Header inspected by the `header` strategy.
    /// By default `header_name` is "X-API-Version".
    #[serde(default = "VersioningConfig::default_header_name")]
    pub header_name: String,

    /// Query parameter inspected by the `query` strategy.
    /// By default `query_param` is "version".
    #[serde(default = "VersioningConfig::default_query_param")]
    pub query_param: String,

    /// Vendor name expected in `Accept: application/vnd.{vendor}.v2+json`.
    /// When None any vendor is accepted.
    #[serde(default)]
    pub vendor: Option<String>,

    /// Whether a version segment detected in the path is removed before
    /// matching, so `/v2/users` matches the `/users` route of version `v2`.
    /// By default `strip_path_version` is set to true.
    #[serde(default = "VersioningConfig::default_strip_path_version")]
    pub strip_path_version: bool,

    /// Deprecated versions keyed by version token.
    #[serde(default)]
    pub deprecations: BTreeMap<String, DeprecationConfig>,
}

/// Deprecation entry of a version.
#[derive(Debug, Clone, Deserialize)]
pub struct DeprecationConfig {
    /// RFC 3339 timestamp after which the version is no longer supported.
    pub sunset: DateTime<Utc>,
    /// Migration guide advertised with `rel="deprecation"`.
    #[serde(default)]
    pub link: Option<String>,
}

impl VersioningConfig {
    /// Creates a versioning configuration with default strategies.
    pub fn new(default_version: impl Into<String>) -> Self {
        Self {
            strategies: Self::default_strategies(),
            default_version: default_version.into(),
            allowed_versions: Vec::new(),
            header_name: Self::default_header_name(),
            query_param: Self::default_query_param(),
            vendor: None,
            strip_path_version: Self::default_strip_path_version(),
            deprecations: BTreeMap::new(),
        }
    }

    fn default_strategies() -> Vec<VersionStrategy> {
        vec![
            VersionStrategy::Accept,
            VersionStrategy::Path,
            VersionStrategy::Header,
            VersionStrategy::Query,
        ]
    }

    fn default_header_name() -> String {
        "X-API-Version".into()
    }

    fn default_query_param() -> String {
        "version".into()
    }

    fn default_strip_path_version() -> bool {
        true
    }

    /// Converts the TOML representation into an immutable [`VersionConfig`] snapshot.
    pub fn to_version_config(&self) -> Result<VersionConfig> {
        let mut builder = VersionConfig::builder(&self.default_version)
            .strategies(self.strategies.iter().copied())
            .header_name(&self.header_name)
            .query_param(&self.query_param)
            .strip_path_version(self.strip_path_version);

        if !self.allowed_versions.is_empty() {
            builder = builder.allow(self.allowed_versions.iter());
        }

        if let Some(vendor) = &self.vendor {
            builder = builder.vendor(vendor);
        }

        for (version, deprecation) in &self.deprecations {
            let mut entry = Deprecation::new(deprecation.sunset);
            if let Some(link) = &deprecation.link {
                entry = entry.with_link(link);
            }
            builder = builder.deprecate(version, entry);
        }

        builder.build()
    }

    pub fn validate(&self) -> Result<()> {
        self.to_version_config().map(|_| ())
    }
}
