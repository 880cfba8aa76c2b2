//! Structured anomaly events raised while registering routes and dispatching.
//!
//! A single optional [`DiagnosticSink`] is attached when the router is
//! created. With no sink attached, [`Diagnostics::emit_with`] never runs its
//! closure, so call sites cost a branch and build no event.
//!
//! # Example
//!
//! ```rust
//! use axum_dispatch::{Config, DiagnosticEvent, DiagnosticKind, Router};
//! use std::sync::{Arc, Mutex};
//!
//! let seen = Arc::new(Mutex::new(Vec::<DiagnosticKind>::new()));
//! let sink = {
//!     let seen = seen.clone();
//!     move |event: DiagnosticEvent| seen.lock().unwrap().push(event.kind())
//! };
//!
//! let config = Config::default().with_enable_h2c(true);
//! let mut router = Router::with_diagnostics(config, sink).unwrap();
//! router.get("/", |ctx| ctx.text(http::StatusCode::OK, "ok")).unwrap();
//! let _engine = router.freeze().unwrap();
//!
//! assert_eq!(seen.lock().unwrap().as_slice(), &[DiagnosticKind::H2cEnabled]);
//! ```

use std::{collections::BTreeMap, fmt, sync::Arc};

/// The kind of anomaly that was observed.
///
/// The string forms returned by [`DiagnosticKind::as_str`] are stable and
/// safe to use as metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum DiagnosticKind {
    /// An `X-Forwarded-For` chain was too long or contained garbage.
    XffSuspicious,
    /// A response header value containing CR or LF was rejected.
    HeaderInjection,
    /// An `X-Forwarded-Proto` value was neither `http` nor `https`.
    InvalidProto,
    /// A route with more than eight parameters was registered.
    HighParamCount,
    /// Cleartext HTTP/2 is enabled.
    H2cEnabled,
    /// A handler panicked and the panic reached the dispatch boundary.
    HandlerPanic,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::XffSuspicious => "XFFSuspicious",
            DiagnosticKind::HeaderInjection => "HeaderInjection",
            DiagnosticKind::InvalidProto => "InvalidProto",
            DiagnosticKind::HighParamCount => "HighParamCount",
            DiagnosticKind::H2cEnabled => "H2CEnabled",
            DiagnosticKind::HandlerPanic => "HandlerPanic",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One diagnostic event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticEvent {
    kind: DiagnosticKind,
    message: String,
    fields: BTreeMap<&'static str, String>,
}

impl DiagnosticEvent {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Adds a structured field.
    pub fn with_field(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        self.fields.insert(key, value.to_string());
        self
    }

    pub fn kind(&self) -> DiagnosticKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn fields(&self) -> &BTreeMap<&'static str, String> {
        &self.fields
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

/// Receiver of diagnostic events.
///
/// Sinks are called synchronously from the request that raised the event
/// and must not block.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, event: DiagnosticEvent);
}

impl<F> DiagnosticSink for F
where
    F: Fn(DiagnosticEvent) + Send + Sync,
{
    fn emit(&self, event: DiagnosticEvent) {
        self(event)
    }
}

/// Sink that forwards every event to `tracing::warn!`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, event: DiagnosticEvent) {
        tracing::warn!(
            kind = %event.kind,
            fields = ?event.fields,
            "{}",
            event.message
        );
    }
}

/// Handle to the optional sink, shared by the router and every context.
#[derive(Clone, Default)]
pub struct Diagnostics {
    sink: Option<Arc<dyn DiagnosticSink>>,
}

impl Diagnostics {
    pub fn new(sink: impl DiagnosticSink + 'static) -> Self {
        Self {
            sink: Some(Arc::new(sink)),
        }
    }

    /// A handle with no sink. Every emission is a no-op.
    pub fn disabled() -> Self {
        Self { sink: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Builds and emits an event, but only when a sink is attached.
    #[inline]
    pub fn emit_with<F>(&self, build: F)
    where
        F: FnOnce() -> DiagnosticEvent,
    {
        if let Some(sink) = &self.sink {
            sink.emit(build());
        }
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use tracing_test::traced_test;

    #[test]
    fn test_stable_names() {
        assert_eq!(DiagnosticKind::XffSuspicious.as_str(), "XFFSuspicious");
        assert_eq!(DiagnosticKind::HeaderInjection.as_str(), "HeaderInjection");
        assert_eq!(DiagnosticKind::InvalidProto.as_str(), "InvalidProto");
        assert_eq!(DiagnosticKind::HighParamCount.as_str(), "HighParamCount");
        assert_eq!(DiagnosticKind::H2cEnabled.to_string(), "H2CEnabled");
    }

    #[test]
    fn test_disabled_never_builds_event() {
        let diagnostics = Diagnostics::disabled();
        let mut built = false;
        diagnostics.emit_with(|| {
            built = true;
            DiagnosticEvent::new(DiagnosticKind::InvalidProto, "unused")
        });
        assert!(!built);
        assert!(!diagnostics.is_enabled());
    }

    #[test]
    fn test_closure_sink_receives_fields() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let diagnostics = Diagnostics::new({
            let events = events.clone();
            move |event: DiagnosticEvent| events.lock().push(event)
        });

        diagnostics.emit_with(|| {
            DiagnosticEvent::new(DiagnosticKind::HeaderInjection, "CR/LF in header value")
                .with_field("header", "x-custom")
        });

        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), DiagnosticKind::HeaderInjection);
        assert_eq!(events[0].field("header"), Some("x-custom"));
        assert_eq!(events[0].message(), "CR/LF in header value");
    }

    #[test]
    #[traced_test]
    fn test_tracing_sink_logs() {
        let diagnostics = Diagnostics::new(TracingSink);
        diagnostics.emit_with(|| {
            DiagnosticEvent::new(DiagnosticKind::HighParamCount, "route has 9 parameters")
                .with_field("count", 9)
        });
        assert!(logs_contain("route has 9 parameters"));
        assert!(logs_contain("HighParamCount"));
    }
}
