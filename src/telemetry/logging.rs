//! File and console logging for the relay
//!
//! Logs go to a daily rolling file through a non-blocking writer and, unless
//! disabled, to stderr. The returned [`LoggingGuard`] must stay alive for the
//! lifetime of the process so buffered lines are flushed on exit.

use crate::RelayError;
use std::path::PathBuf;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
    Registry,
};

/// Directives that keep HTTP client internals out of the logs
const NOISE_DIRECTIVES: &[&str] = &["tokio=warn", "hyper=warn", "h2=warn", "reqwest=warn", "rustls=warn"];

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory for rolling log files
    pub log_dir: PathBuf,
    /// File name prefix for the daily rolling file
    pub file_prefix: String,
    /// Log level for file output
    pub file_log_level: String,
    /// Log level for console output
    pub console_log_level: String,
    /// Whether to write to stderr as well
    pub console_enabled: bool,
    /// Whether the file output is JSON
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            file_prefix: "fabric-relay.log".to_string(),
            file_log_level: "info".to_string(),
            console_log_level: "info".to_string(),
            console_enabled: true,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Create logging configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(log_dir) = std::env::var("FABRIC_RELAY_LOG_DIR") {
            config.log_dir = PathBuf::from(log_dir);
        }

        if let Ok(level) = std::env::var("FABRIC_RELAY_LOG_LEVEL") {
            config.file_log_level = level.clone();
            config.console_log_level = level;
        }

        if let Ok(enabled) = std::env::var("FABRIC_RELAY_CONSOLE_LOGGING") {
            config.console_enabled = enabled.parse().unwrap_or(true);
        }

        if let Ok(json) = std::env::var("FABRIC_RELAY_JSON_LOGS") {
            config.json_format = json.parse().unwrap_or(false);
        }

        config
    }
}

/// Guard that must be kept alive for the duration of the application
/// to ensure proper log flushing
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

fn build_filter(level: &str, fallback: &str) -> Result<EnvFilter, RelayError> {
    let mut filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new(fallback));
    for directive in NOISE_DIRECTIVES {
        let parsed = directive.parse().map_err(|e| {
            RelayError::configuration_error(format!("Invalid log directive {}: {}", directive, e))
        })?;
        filter = filter.add_directive(parsed);
    }
    Ok(filter)
}

/// Initialize the logging system
///
/// Fails if the log directory cannot be created or a global subscriber is
/// already installed.
pub fn init_logging(config: LoggingConfig) -> Result<LoggingGuard, RelayError> {
    std::fs::create_dir_all(&config.log_dir).map_err(|e| {
        RelayError::configuration_error(format!("Failed to create log directory: {}", e))
    })?;

    let file_appender = tracing_appender::rolling::daily(&config.log_dir, &config.file_prefix);
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    let file_filter = build_filter(&config.file_log_level, "info")?;
    let timer = tracing_subscriber::fmt::time::ChronoUtc::new("%Y-%m-%d %H:%M:%S%.3f UTC".to_string());
    if config.json_format {
        layers.push(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_span_events(FmtSpan::CLOSE)
                .with_timer(timer)
                .with_file(true)
                .with_line_number(true)
                .with_target(true)
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_filter(file_filter)
                .boxed(),
        );
    } else {
        layers.push(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_span_events(FmtSpan::CLOSE)
                .with_timer(timer)
                .with_file(true)
                .with_line_number(true)
                .with_target(true)
                .with_filter(file_filter)
                .boxed(),
        );
    }

    if config.console_enabled {
        let console_filter = build_filter(&config.console_log_level, "info")?;
        layers.push(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true)
                .with_span_events(FmtSpan::NONE)
                .with_target(true)
                .with_filter(console_filter)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| RelayError::configuration_error(format!("Failed to install subscriber: {}", e)))?;

    info!(
        log_dir = %config.log_dir.display(),
        json_format = config.json_format,
        console = config.console_enabled,
        "Logging initialized"
    );

    Ok(LoggingGuard {
        _file_guard: Some(file_guard),
    })
}
