use {
    crate::{Error, Result},
    serde::Deserialize,
    std::{net::IpAddr, time::Duration},
};

///
/// Configuration for route matching, context pooling and the service adapter.
///
#[derive(Debug, Clone, Deserialize)]
pub struct RouterConfig {
    /// Whether a single trailing slash is ignored, both on registered patterns
    /// and on request paths. The root path `/` is never trimmed.
    /// By default `trim_trailing_slash` is set to true.
    #[serde(default = "RouterConfig::default_trim_trailing_slash")]
    pub trim_trailing_slash: bool,

    /// Whether a path that exists under another method answers 405 with an
    /// `Allow` header. When false such requests answer 404.
    /// By default `handle_method_not_allowed` is set to true.
    #[serde(default = "RouterConfig::default_handle_method_not_allowed")]
    pub handle_method_not_allowed: bool,

    /// Number of request contexts allocated when the engine is built.
    /// By default `pool_prewarm` is 0.
    #[serde(default)]
    pub pool_prewarm: usize,

    /// Maximum number of idle contexts kept by the pool. Contexts released
    /// while the pool is full are dropped. By default 1024.
    #[serde(default = "RouterConfig::default_max_idle_contexts")]
    pub max_idle_contexts: usize,

    /// Whether 500 responses include the panic message.
    /// Only enable this in development. By default false.
    #[serde(default)]
    pub verbose_errors: bool,

    /// Maximum time a dispatch may take when driven by the service adapter.
    /// Once elapsed, the request is cancelled at the next continuation and an
    /// unwritten response becomes 408 Request Timeout.
    /// By default `request_timeout` is None.
    #[serde(default, with = "humantime_serde")]
    pub request_timeout: Option<Duration>,

    /// Maximum request body size accepted by the service adapter.
    /// Larger bodies are rejected with 413 Payload Too Large. By default 1MiB.
    #[serde(default = "RouterConfig::default_max_body_size")]
    pub max_body_size: byte_unit::Byte,

    /// Proxies whose `X-Forwarded-For` and `X-Forwarded-Proto` headers are honoured.
    /// By default no proxy is trusted.
    #[serde(default)]
    pub trusted_proxies: Vec<IpAddr>,

    /// Maximum number of hops accepted in an `X-Forwarded-For` chain before
    /// the chain is reported as suspicious. By default 10.
    #[serde(default = "RouterConfig::default_max_forwarded_hops")]
    pub max_forwarded_hops: usize,

    /// Whether the hosting server accepts cleartext HTTP/2 (h2c).
    /// The engine only reports this as a risky feature. By default false.
    #[serde(default)]
    pub enable_h2c: bool,
}

impl RouterConfig {
    fn default_trim_trailing_slash() -> bool {
        true
    }

    fn default_handle_method_not_allowed() -> bool {
        true
    }

    fn default_max_idle_contexts() -> usize {
        1024
    }

    fn default_max_body_size() -> byte_unit::Byte {
        byte_unit::Byte::from_u64(1024 * 1024)
    }

    fn default_max_forwarded_hops() -> usize {
        10
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_idle_contexts == 0 {
            return Err(Error::config(
                "router max_idle_contexts must be > 0. Set [router] max_idle_contexts = 1024 in config.",
            ));
        }

        if self.pool_prewarm > self.max_idle_contexts {
            return Err(Error::config(
                "router pool_prewarm cannot exceed max_idle_contexts",
            ));
        }

        if self.max_forwarded_hops == 0 {
            return Err(Error::config(
                "router max_forwarded_hops must be > 0. Set [router] max_forwarded_hops = 10 in config.",
            ));
        }

        if matches!(self.request_timeout, Some(timeout) if timeout.is_zero()) {
            return Err(Error::config("router request_timeout must be > 0"));
        }

        Ok(())
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        RouterConfig {
            trim_trailing_slash: Self::default_trim_trailing_slash(),
            handle_method_not_allowed: Self::default_handle_method_not_allowed(),
            pool_prewarm: 0,
            max_idle_contexts: Self::default_max_idle_contexts(),
            verbose_errors: false,
            request_timeout: None,
            max_body_size: Self::default_max_body_size(),
            trusted_proxies: Vec::new(),
            max_forwarded_hops: Self::default_max_forwarded_hops(),
            enable_h2c: false,
        }
    }
}
