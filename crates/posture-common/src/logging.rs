//! Logging setup using tracing

use crate::config::LoggingConfig;
use posture_core::{Error, Result};
use std::str::FromStr;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format (default for interactive runs)
    #[default]
    Pretty,
    /// JSON format (for log aggregation)
    Json,
    /// Compact single-line format
    Compact,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            other => Err(Error::InvalidConfig {
                key: "logging.format".into(),
                message: format!("unknown log format '{}'", other),
            }),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default filter directive when RUST_LOG is unset
    pub level: String,
    pub format: LogFormat,
    /// Include target (module path)
    pub with_target: bool,
    /// Include file/line information
    pub with_file: bool,
    /// Write to stderr so stdout stays clean for reports
    pub to_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: LogFormat::Pretty,
            with_target: true,
            with_file: false,
            to_stderr: true,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn json(mut self) -> Self {
        self.format = LogFormat::Json;
        self
    }

    pub fn with_file(mut self) -> Self {
        self.with_file = true;
        self
    }

    /// Build from the `[logging]` config section; unknown formats fall back to pretty
    pub fn from_section(section: &LoggingConfig) -> Self {
        Self::new()
            .level(section.level.clone())
            .format(section.format.parse().unwrap_or_default())
    }
}

/// Initialize the global tracing subscriber with default settings
pub fn init_logging() -> Result<()> {
    init_logging_with_config(LogConfig::default())
}

/// Initialize the global tracing subscriber
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_logging_with_config(config: LogConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level)).map_err(
            |e| Error::InvalidConfig {
                key: "logging.level".into(),
                message: e.to_string(),
            },
        )?;

    let registry = tracing_subscriber::registry().with(env_filter);
    let writer = move || -> Box<dyn std::io::Write> {
        if config.to_stderr {
            Box::new(std::io::stderr())
        } else {
            Box::new(std::io::stdout())
        }
    };

    let result = match config.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_file(config.with_file)
                    .with_line_number(config.with_file)
                    .with_target(config.with_target),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_writer(writer)
                    .with_file(config.with_file)
                    .with_line_number(config.with_file)
                    .with_target(config.with_target),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .pretty()
                    .with_writer(writer)
                    .with_file(config.with_file)
                    .with_line_number(config.with_file)
                    .with_target(config.with_target),
            )
            .try_init(),
    };

    result.map_err(|e| Error::Internal(format!("Failed to install subscriber: {}", e)))
}
