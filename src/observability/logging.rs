//! Subscriber setup for registry events.
//!
//! The crate emits events through `tracing`; this module only installs a
//! subscriber for applications that do not bring their own. The configured
//! level applies to this crate's targets only, so breaker and registry
//! events can be turned up without also raising `reqwest` or `hyper`.

use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::errors::{ServiceError, ServiceResult};

/// Target prefix for every event emitted by this crate.
pub const LOG_TARGET: &str = "service_registry";

/// Minimum level for registry events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Every admission decision and codec step.
    Trace,
    /// Cache hits and misses.
    Debug,
    /// Client creation, status changes and breaker transitions.
    Info,
    /// Rejections, fallbacks and pre-flight failures.
    Warn,
    /// Errors only.
    Error,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(ServiceError::configuration(format!("unknown log level: {other}"))),
        }
    }
}

/// Output format for registry events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, human-readable output.
    Pretty,
    /// JSON lines carrying the `service`, `environment` and `state` fields.
    Json,
    /// Single-line output.
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            other => Err(ServiceError::configuration(format!("unknown log format: {other}"))),
        }
    }
}

/// Subscriber configuration for registry events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Minimum level for this crate's events.
    pub level: LogLevel,
    /// Output format.
    pub format: LogFormat,
    /// Include the event target.
    pub include_target: bool,
    /// Include file and line number.
    pub include_file_line: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            include_target: true,
            include_file_line: false,
        }
    }
}

impl LoggingConfig {
    /// Creates a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SERVICE_REGISTRY_LOG_LEVEL` (optional): level for this crate's events
    /// - `SERVICE_REGISTRY_LOG_FORMAT` (optional): `pretty`, `json` or `compact`
    pub fn from_env() -> ServiceResult<Self> {
        let mut config = Self::default();

        if let Ok(level) = std::env::var("SERVICE_REGISTRY_LOG_LEVEL") {
            config.level = level.parse()?;
        }
        if let Ok(format) = std::env::var("SERVICE_REGISTRY_LOG_FORMAT") {
            config.format = format.parse()?;
        }

        Ok(config)
    }

    /// Sets the level.
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Sets the format.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets whether to include the event target.
    pub fn with_target(mut self, include: bool) -> Self {
        self.include_target = include;
        self
    }

    /// Sets whether to include file and line number.
    pub fn with_file_line(mut self, include: bool) -> Self {
        self.include_file_line = include;
        self
    }

    /// Returns the filter directive scoping the level to this crate.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Configuration`] if the directive does not parse.
    pub fn directive(&self) -> ServiceResult<Directive> {
        format!("{LOG_TARGET}={}", self.level.as_str())
            .parse()
            .map_err(|e| ServiceError::configuration(format!("invalid log directive: {e}")))
    }

    /// Installs a global subscriber with this configuration.
    ///
    /// `RUST_LOG` directives for other targets are kept; this crate's level
    /// comes from the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Configuration`] if a global subscriber is
    /// already installed.
    pub fn init(self) -> ServiceResult<()> {
        let filter = EnvFilter::from_default_env().add_directive(self.directive()?);
        let layer = fmt::layer()
            .with_target(self.include_target)
            .with_file(self.include_file_line)
            .with_line_number(self.include_file_line);

        let installed = match self.format {
            LogFormat::Pretty => tracing_subscriber::registry()
                .with(filter)
                .with(layer.pretty())
                .try_init(),
            LogFormat::Json => tracing_subscriber::registry()
                .with(filter)
                .with(layer.json())
                .try_init(),
            LogFormat::Compact => tracing_subscriber::registry()
                .with(filter)
                .with(layer.compact())
                .try_init(),
        };

        installed
            .map_err(|e| ServiceError::configuration(format!("logging already initialised: {e}")))
    }
}
