use crate::error::ProximaError;
use std::path::Path;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Log file written inside the configured log directory
pub const LOG_FILE_NAME: &str = "proxima.log";

/// Initialize logging system
///
/// Sets up logging to both console and file. `RUST_LOG` takes precedence
/// over `log_level`. Fails if a global subscriber is already installed.
///
/// # Arguments
/// * `log_dir` - Directory where log files will be stored
/// * `log_level` - Log level (trace, debug, info, warn, error)
pub fn setup_logging(log_dir: &Path, log_level: &str) -> Result<(), ProximaError> {
    std::fs::create_dir_all(log_dir).map_err(|e| {
        ProximaError::config(format!(
            "Failed to create log directory {}: {}",
            log_dir.display(),
            e
        ))
    })?;

    let log_file_path = log_dir.join(LOG_FILE_NAME);
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path)
        .map_err(|e| {
            ProximaError::config(format!(
                "Failed to open log file {}: {}",
                log_file_path.display(),
                e
            ))
        })?;

    let console_layer = fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_filter(env_filter(log_level));

    // No ANSI codes in the file
    let file_layer = fmt::layer()
        .with_writer(log_file)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_span_events(FmtSpan::CLOSE)
        .with_filter(env_filter(log_level));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| ProximaError::config(format!("Failed to install subscriber: {}", e)))?;

    tracing::info!(
        "Logging initialized: level={}, log_file={}",
        log_level,
        log_file_path.display()
    );

    Ok(())
}

/// Simple logging setup (console only)
///
/// Used by the one-shot CLI commands, which write results to stdout.
pub fn setup_console_logging(log_level: &str) -> Result<(), ProximaError> {
    tracing_subscriber::fmt()
        .with_target(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter(log_level))
        .try_init()
        .map_err(|e| ProximaError::config(format!("Failed to install subscriber: {}", e)))?;

    tracing::debug!("Console logging initialized: level={}", log_level);

    Ok(())
}

/// `RUST_LOG` if set, otherwise the configured level (unknown levels fall back to info)
fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = parse_log_level(log_level).unwrap_or(Level::INFO);
        EnvFilter::new(level.as_str().to_lowercase())
    })
}

/// Parse string to tracing Level
pub fn parse_log_level(level: &str) -> Option<Level> {
    match level.trim().to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}
