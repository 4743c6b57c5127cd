//! Structured logging setup using tracing.
//!
//! Console output is human-readable; file output is JSON with rotation.
//! The host application initializes this once at startup and holds the
//! returned guard for its lifetime.

use std::path::PathBuf;

use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Logging configuration options.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory where log files are stored.
    pub log_directory: PathBuf,
    /// Log file name prefix (e.g. "tunevault" -> "tunevault.2026-08-27.log").
    pub log_file_prefix: String,
    /// Maximum log level for console output.
    pub console_level: Level,
    /// Maximum log level for file output.
    pub file_level: Level,
    /// How often to rotate log files.
    pub rotation: LogRotation,
    /// Whether to include ANSI color codes in console output.
    pub console_ansi: bool,
}

/// Log rotation frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    /// Create a new log file every hour.
    Hourly,
    /// Create a new log file every day.
    Daily,
    /// Never rotate (single log file).
    Never,
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Hourly => Self::HOURLY,
            LogRotation::Daily => Self::DAILY,
            LogRotation::Never => Self::NEVER,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl LoggingConfig {
    /// Verbose configuration for development.
    #[must_use]
    pub fn development() -> Self {
        Self {
            log_directory: default_log_directory(),
            log_file_prefix: "tunevault".to_string(),
            console_level: Level::DEBUG,
            file_level: Level::TRACE,
            rotation: LogRotation::Hourly,
            console_ansi: true,
        }
    }

    /// Quiet console, daily-rotated files.
    #[must_use]
    pub fn production() -> Self {
        Self {
            log_directory: default_log_directory(),
            log_file_prefix: "tunevault".to_string(),
            console_level: Level::INFO,
            file_level: Level::DEBUG,
            rotation: LogRotation::Daily,
            console_ansi: true,
        }
    }

    /// Development config in debug builds, production otherwise.
    #[must_use]
    pub fn auto() -> Self {
        if cfg!(debug_assertions) {
            Self::development()
        } else {
            Self::production()
        }
    }

    /// Set the log directory.
    #[must_use]
    pub fn with_log_directory(mut self, path: PathBuf) -> Self {
        self.log_directory = path;
        self
    }

    /// Set the log file prefix.
    #[must_use]
    pub fn with_log_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.log_file_prefix = prefix.into();
        self
    }

    /// Set the console log level.
    #[must_use]
    pub const fn with_console_level(mut self, level: Level) -> Self {
        self.console_level = level;
        self
    }

    /// Set the file log level.
    #[must_use]
    pub const fn with_file_level(mut self, level: Level) -> Self {
        self.file_level = level;
        self
    }

    /// Set the log rotation frequency.
    #[must_use]
    pub const fn with_rotation(mut self, rotation: LogRotation) -> Self {
        self.rotation = rotation;
        self
    }
}

/// Keeps file logging active; dropping it flushes pending entries.
pub struct LoggingGuard {
    _file_guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Initialize the logging system.
///
/// Returns a guard that must be kept alive for the duration of the
/// application.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created.
///
/// # Panics
///
/// Panics if logging has already been initialized.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    if !config.log_directory.exists() {
        std::fs::create_dir_all(&config.log_directory).map_err(|e| {
            LoggingError::DirectoryCreationFailed {
                path: config.log_directory.clone(),
                reason: e.to_string(),
            }
        })?;
    }

    let file_appender = RollingFileAppender::new(
        config.rotation.into(),
        &config.log_directory,
        &config.log_file_prefix,
    );
    let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);

    // RUST_LOG overrides the console filter.
    let console_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("warn")
            .add_directive("tunevault_core=info".parse().expect("valid directive"))
    });

    let file_filter = EnvFilter::new(level_to_directive(config.file_level))
        .add_directive("tunevault_core=trace".parse().expect("valid directive"));

    let console_layer = fmt::layer()
        .with_ansi(config.console_ansi)
        .with_target(false)
        .with_filter(console_filter);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .json()
        .with_filter(file_filter);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// Initialize logging with build-type-appropriate defaults.
///
/// # Errors
///
/// Returns an error if initialization fails.
///
/// # Panics
///
/// Panics if logging has already been initialized.
pub fn init_auto() -> Result<LoggingGuard, LoggingError> {
    init(&LoggingConfig::auto())
}

/// Default log directory under the platform's local data dir.
#[must_use]
pub fn default_log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tunevault")
        .join("logs")
}

const fn level_to_directive(level: Level) -> &'static str {
    match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        Level::ERROR => "error",
    }
}

/// Errors that can occur during logging initialization.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// Failed to create the log directory.
    #[error("Failed to create log directory {path}: {reason}")]
    DirectoryCreationFailed {
        /// The path that could not be created.
        path: PathBuf,
        /// The reason for the failure.
        reason: String,
    },
}
