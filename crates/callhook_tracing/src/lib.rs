//! Tracing subscriber setup.
//!
//! `callhook` emits `tracing` spans and events but never installs a
//! subscriber itself. [`TracingConfig`] installs one for applications and
//! tests that do not have their own.
//!
//! Every wrapped call runs inside a `hooked_call` span carrying the wrapped
//! function's name and a per-call id; enable `debug` for the `callhook_core`
//! target to see them.
//!
//! # Example
//!
//! ```
//! use callhook_tracing::{TracingConfig, TracingFormat};
//! use tracing::Level;
//!
//! TracingConfig::new()
//!     .with_level(Level::DEBUG)
//!     .with_format(TracingFormat::Compact)
//!     .with_env_filter("callhook_core=trace,warn")
//!     .init();
//!
//! tracing::debug!("subscriber ready");
//! ```

pub use tracing::Level;

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

type FmtLayer = Box<dyn Layer<Layered<EnvFilter, Registry>> + Send + Sync>;

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingFormat {
    /// Multi-line, colored.
    #[default]
    Pretty,
    /// One line per event.
    Compact,
    /// Newline-delimited JSON.
    Json,
}

/// Settings for the global subscriber installed by [`init`](Self::init).
///
/// The filter comes from [`with_env_filter`](Self::with_env_filter) if it
/// parses, else from `RUST_LOG`, else from the level (`info` unless set).
#[derive(Debug, Clone)]
pub struct TracingConfig {
    level: Level,
    format: TracingFormat,
    env_filter: Option<String>,
    span_events: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: TracingFormat::default(),
            env_filter: None,
            span_events: false,
        }
    }
}

impl TracingConfig {
    /// Same as [`TracingConfig::default`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Level used when neither a filter string nor `RUST_LOG` applies.
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Output format, pretty by default.
    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    /// Filter directives such as `callhook_core=trace,warn`.
    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Also logs when `hooked_call` spans are entered and exited.
    #[must_use]
    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    /// The fallback level.
    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }

    /// The output format.
    #[must_use]
    pub fn format(&self) -> TracingFormat {
        self.format
    }

    fn filter(&self) -> EnvFilter {
        self.env_filter
            .as_deref()
            .and_then(|directives| EnvFilter::try_new(directives).ok())
            .or_else(|| EnvFilter::try_from_default_env().ok())
            .unwrap_or_else(|| EnvFilter::new(self.level.as_str()))
    }

    fn span_events(&self) -> FmtSpan {
        if self.span_events {
            FmtSpan::ENTER | FmtSpan::EXIT
        } else {
            FmtSpan::NONE
        }
    }

    fn output(&self) -> FmtLayer {
        let layer = tracing_subscriber::fmt::layer().with_span_events(self.span_events());
        match self.format {
            TracingFormat::Pretty => layer.pretty().boxed(),
            TracingFormat::Compact => layer.compact().boxed(),
            TracingFormat::Json => layer.json().boxed(),
        }
    }

    /// Installs the global subscriber.
    ///
    /// Returns `false` and changes nothing if one is already installed.
    pub fn init(&self) -> bool {
        let installed = tracing_subscriber::registry()
            .with(self.filter())
            .with(self.output())
            .try_init()
            .is_ok();
        if installed {
            tracing::debug!(level = %self.level, format = ?self.format, "subscriber installed");
        }
        installed
    }
}
