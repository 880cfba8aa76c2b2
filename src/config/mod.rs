//!
//! Configuration structures and utilities for wiring up the dispatch engine.
//!
//! A configuration can be created in many ways:
//! - From an environment-specific TOML file via `Config::from_rust_env` or `Config::from_toml_file`
//! - From a TOML string via `Config::from_toml`
//! - Constructed programmatically via the builder methods on `Config`
//!
//! In both TOML-based methods, environment variables can be referenced in the TOML
//! using the {{ VAR_NAME }} syntax, and they will be substituted with the corresponding
//! environment variable value.
//!
//! Configuration is split into logical sections, each represented by their own struct:
//!
//! - `RouterConfig` for matching, pooling and service adapter settings
//! - `VersioningConfig` for API version detection and deprecation
//! - `LoggingConfig` for logging and tracing settings
//!
mod logging;
mod router;
mod versioning;

pub use logging::*;
pub use router::*;
pub use versioning::*;

pub use byte_unit::Byte;

use {
    crate::{Error, Result, utils::replace_handlebars_with_env},
    serde::Deserialize,
    std::{env, fs, str::FromStr, time::Duration},
};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub versioning: Option<VersioningConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    ///
    /// Creates a default configuration.
    /// This will attempt to load configuration from the file based on the RUST_ENV
    /// environment variable falling back to a default configuration if the environment
    /// variable is not set. Configuration files should be located in the "config/"
    /// directory of your project.
    ///
    fn default() -> Self {
        match Self::from_rust_env() {
            Ok(config) => config,
            Err(_) => Config {
                router: RouterConfig::default(),
                versioning: None,
                logging: LoggingConfig::default(),
            },
        }
    }
}

impl Config {
    ///
    /// Loads the configuration from a file based on the RUST_ENV environment variable.
    ///
    pub fn from_rust_env() -> Result<Config> {
        Self::from_toml_file(env::var("RUST_ENV")?)
    }

    ///
    /// Given an environment name, loads the corresponding configuration file,
    /// substitutes any environment variables, and returns a Config struct.
    /// The configuration file is expected to be located at "config/{env}.toml".
    ///
    pub fn from_toml_file(env: impl AsRef<str>) -> Result<Config> {
        let path = format!("config/{}.toml", env.as_ref());
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    ///
    /// Parses a configuration string in TOML format into a Config struct.
    ///
    pub fn from_toml(toml_str: &str) -> Result<Config> {
        replace_handlebars_with_env(toml_str).parse()
    }

    /// Enables or disables trailing slash trimming on patterns and request paths.
    pub fn with_trim_trailing_slash(mut self, enable: bool) -> Self {
        self.router.trim_trailing_slash = enable;
        self
    }

    /// Enables or disables 405 responses. When disabled, method mismatches answer 404.
    pub fn with_method_not_allowed(mut self, enable: bool) -> Self {
        self.router.handle_method_not_allowed = enable;
        self
    }

    /// Sets the number of contexts allocated up-front by the context pool.
    pub fn with_pool_prewarm(mut self, count: usize) -> Self {
        self.router.pool_prewarm = count;
        self
    }

    /// Sets the maximum number of idle contexts retained by the context pool.
    pub fn with_max_idle_contexts(mut self, max: usize) -> Self {
        self.router.max_idle_contexts = max;
        self
    }

    /// Includes panic details in 500 responses. Meant for development only.
    pub fn with_verbose_errors(mut self, enable: bool) -> Self {
        self.router.verbose_errors = enable;
        self
    }

    /// Sets the request timeout enforced by the service adapter.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.router.request_timeout = Some(timeout);
        self
    }

    /// Sets the maximum request body size accepted by the service adapter.
    pub fn with_max_body_size(mut self, size: u64) -> Self {
        self.router.max_body_size = Byte::from_u64(size);
        self
    }

    /// Sets the list of proxies whose forwarded headers are trusted.
    pub fn with_trusted_proxies(mut self, proxies: Vec<std::net::IpAddr>) -> Self {
        self.router.trusted_proxies = proxies;
        self
    }

    /// Sets the maximum number of `X-Forwarded-For` hops before the chain is
    /// reported as suspicious.
    pub fn with_max_forwarded_hops(mut self, hops: usize) -> Self {
        self.router.max_forwarded_hops = hops;
        self
    }

    /// Declares that the hosting server accepts cleartext HTTP/2.
    pub fn with_enable_h2c(mut self, enable: bool) -> Self {
        self.router.enable_h2c = enable;
        self
    }

    /// Sets the versioning configuration.
    pub fn with_versioning(mut self, versioning: VersioningConfig) -> Self {
        self.versioning = Some(versioning);
        self
    }

    /// Sets the log format of the LoggingConfig.
    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.logging.format = format;
        self
    }

    /// Ensures that the configuration is valid.
    pub fn validate(&self) -> Result<()> {
        self.router.validate()?;
        if let Some(versioning) = &self.versioning {
            versioning.validate()?;
        }
        self.logging.validate()?;
        Ok(())
    }

    ///
    /// Sets up the tracing subscriber for logging based on the LoggingConfig.
    ///
    /// NOTE: This should be called early during startup to ensure logging is configured
    ///       before any log messages are emitted.
    ///
    pub fn setup_tracing(&self) {
        use tracing_subscriber::{EnvFilter, prelude::*};
        let env_filter = EnvFilter::from_default_env();
        match self.logging.format {
            LogFormat::Json => {
                let _ = tracing_subscriber::registry()
                    .with(tracing_subscriber::fmt::layer().json())
                    .with(env_filter)
                    .try_init();
            }
            LogFormat::Default => {
                let _ = tracing_subscriber::registry()
                    .with(tracing_subscriber::fmt::layer())
                    .with(env_filter)
                    .try_init();
            }
            LogFormat::Compact => {
                let _ = tracing_subscriber::registry()
                    .with(tracing_subscriber::fmt::layer().compact())
                    .with(env_filter)
                    .try_init();
            }
            LogFormat::Pretty => {
                let _ = tracing_subscriber::registry()
                    .with(tracing_subscriber::fmt::layer().pretty())
                    .with(env_filter)
                    .try_init();
            }
        }
    }
}

///
/// Parses a configuration string with references to environment variables
/// into a Config struct by substituting the environment variables and then
/// parsing the resulting TOML.
///
impl FromStr for Config {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        let config_file = replace_handlebars_with_env(s);
        let config = toml::from_str::<Config>(&config_file)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_config_from_str_valid() {
        unsafe {
            env::set_var("DISPATCH_TEST_LINK", "https://example.com/migrate");
        }

        let config_str = r#"
[router]
trim_trailing_slash = false
max_idle_contexts = 64
request_timeout = "5s"
max_body_size = "64KiB"

[versioning]
strategies = ["header", "query"]
default_version = "v1"
allowed_versions = ["v1", "v2"]

[versioning.deprecations.v1]
sunset = "2030-01-01T00:00:00Z"
link = "{{ DISPATCH_TEST_LINK }}"

[logging]
format = "json"
        "#;

        let config: Config = config_str.parse().unwrap();
        assert!(!config.router.trim_trailing_slash);
        assert_eq!(config.router.max_idle_contexts, 64);
        assert_eq!(config.router.request_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.router.max_body_size.as_u64(), 64 * 1024);

        let versioning = config.versioning.as_ref().unwrap();
        assert_eq!(versioning.default_version, "v1");
        assert_eq!(
            versioning.deprecations["v1"].link.as_deref(),
            Some("https://example.com/migrate")
        );
        assert!(config.validate().is_ok());

        unsafe {
            env::remove_var("DISPATCH_TEST_LINK");
        }
    }

    #[test]
    fn test_config_from_str_invalid_toml() {
        let result = "this is not valid toml".parse::<Config>();
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_config_empty_uses_defaults() {
        let config: Config = "".parse().unwrap();
        assert!(config.router.trim_trailing_slash);
        assert!(config.router.handle_method_not_allowed);
        assert!(config.versioning.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder_matches_toml_equivalent() {
        let builder_config = Config::default()
            .with_trim_trailing_slash(false)
            .with_method_not_allowed(false)
            .with_pool_prewarm(8)
            .with_max_idle_contexts(32)
            .with_verbose_errors(true)
            .with_request_timeout(Duration::from_secs(30))
            .with_max_body_size(2 * 1024 * 1024)
            .with_log_format(LogFormat::Compact);

        let toml_config: Config = r#"
[router]
trim_trailing_slash = false
handle_method_not_allowed = false
pool_prewarm = 8
max_idle_contexts = 32
verbose_errors = true
request_timeout = "30s"
max_body_size = "2MiB"

[logging]
format = "compact"
        "#
        .parse()
        .unwrap();

        assert_eq!(
            builder_config.router.trim_trailing_slash,
            toml_config.router.trim_trailing_slash
        );
        assert_eq!(
            builder_config.router.handle_method_not_allowed,
            toml_config.router.handle_method_not_allowed
        );
        assert_eq!(
            builder_config.router.pool_prewarm,
            toml_config.router.pool_prewarm
        );
        assert_eq!(
            builder_config.router.max_idle_contexts,
            toml_config.router.max_idle_contexts
        );
        assert_eq!(
            builder_config.router.verbose_errors,
            toml_config.router.verbose_errors
        );
        assert_eq!(
            builder_config.router.request_timeout,
            toml_config.router.request_timeout
        );
        assert_eq!(
            builder_config.router.max_body_size,
            toml_config.router.max_body_size
        );
        assert!(matches!(toml_config.logging.format, LogFormat::Compact));
        assert!(matches!(builder_config.logging.format, LogFormat::Compact));
    }

    #[test]
    fn test_validate_rejects_bad_router_section() {
        let config = Config::default().with_max_idle_contexts(0);
        assert_eq!(config.validate().unwrap_err().kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_from_toml_file_missing() {
        let result = Config::from_toml_file("definitely-not-a-real-env");
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Io);
    }
}
