//! Logging setup shared by the `gmcp` binaries.
//!
//! Broker processes speak MCP over stdout, so every layer built here writes
//! to stderr. `RUST_LOG` wins over the configured level.
//!
//! ```ignore
//! use gmcp_core::tracing::{init_tracing, TracingConfig};
//!
//! init_tracing(TracingConfig::broker())?;
//! ```

use thiserror::Error;
use tracing::{Level, Subscriber};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    prelude::*,
    registry::LookupSpan,
};

/// Every workspace crate's target starts with this (`gmcp_auth`, `gmcp_policy`, ...).
const TARGET_PREFIX: &str = "gmcp";

#[derive(Debug, Error)]
pub enum TracingError {
    #[error("a global tracing subscriber is already installed: {0}")]
    AlreadyInstalled(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("invalid log filter directive: {0}")]
    InvalidDirective(#[from] tracing_subscriber::filter::ParseError),
}

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingOutputFormat {
    Pretty,
    #[default]
    Compact,
    /// One JSON object per line.
    Json,
}

/// Logging options, assembled once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    /// Level for workspace crates when no directive is given.
    pub level: Level,
    pub format: TracingOutputFormat,
    /// Print file and line of each event.
    pub source_location: bool,
    /// Print the module path of each event.
    pub show_target: bool,
    pub timestamps: bool,
    /// Log span creation and close.
    pub span_events: bool,
    /// Explicit filter directive, replacing both `level` and `RUST_LOG`.
    pub directive: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::cli()
    }
}

impl TracingConfig {
    /// Warnings only, one line each, no timestamps. For interactive use.
    #[must_use]
    pub fn cli() -> Self {
        Self {
            level: Level::WARN,
            format: TracingOutputFormat::Compact,
            source_location: false,
            show_target: false,
            timestamps: false,
            span_events: false,
            directive: None,
        }
    }

    /// Everything from debug up, with the emitting module and line.
    #[must_use]
    pub fn cli_debug() -> Self {
        Self {
            level: Level::DEBUG,
            source_location: true,
            show_target: true,
            ..Self::cli()
        }
    }

    /// JSON at info level for long-lived broker processes.
    #[must_use]
    pub fn broker() -> Self {
        Self {
            level: Level::INFO,
            format: TracingOutputFormat::Json,
            source_location: false,
            show_target: true,
            timestamps: true,
            span_events: true,
            directive: None,
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingOutputFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directive = Some(directive.into());
        self
    }

    fn default_directive(&self) -> String {
        format!("{TARGET_PREFIX}={}", self.level)
    }

    fn filter(&self) -> Result<EnvFilter, TracingError> {
        match self.directive {
            Some(ref directive) => Ok(EnvFilter::try_new(directive)?),
            None => Ok(EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(self.default_directive()))),
        }
    }

    fn span_mask(&self) -> FmtSpan {
        if self.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }
}

/// The stderr formatting layer for `config`.
fn output_layer<S>(config: &TracingConfig) -> Box<dyn Layer<S> + Send + Sync + 'static>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_file(config.source_location)
        .with_line_number(config.source_location)
        .with_target(config.show_target)
        .with_span_events(config.span_mask());

    match (config.format, config.timestamps) {
        (TracingOutputFormat::Pretty, true) => layer.pretty().boxed(),
        (TracingOutputFormat::Pretty, false) => layer.pretty().without_time().boxed(),
        (TracingOutputFormat::Compact, true) => layer.compact().boxed(),
        (TracingOutputFormat::Compact, false) => layer.compact().without_time().boxed(),
        (TracingOutputFormat::Json, true) => layer.json().boxed(),
        (TracingOutputFormat::Json, false) => layer.json().without_time().boxed(),
    }
}

/// Installs the global subscriber. Call once at process start.
///
/// # Errors
///
/// Fails if a subscriber is already installed or the directive does not
/// parse.
pub fn init_tracing(config: TracingConfig) -> Result<(), TracingError> {
    let subscriber = tracing_subscriber::registry()
        .with(config.filter()?)
        .with(output_layer(&config));
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
