//! Logging configuration and initialization
//!
//! Builds the global tracing subscriber for a pipeline run. Output can go to
//! the console, to a daily-rolling log file, or both. When a file sink is
//! active, [`init_logging`] returns the non-blocking writer guard; the caller
//! must keep it alive for the duration of the run so buffered log lines are
//! flushed on exit.
//!
//! Prefer the structured macros (`info!`, `warn!`, ...) over `println!`
//! everywhere in the workspace.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// ============================================================================
// Logging Constants
// ============================================================================

/// Default directory for log files.
pub const DEFAULT_LOG_DIR: &str = "./logs";

/// Default log file prefix ("sdp" -> "sdp.2026-08-07.log").
pub const DEFAULT_LOG_PREFIX: &str = "sdp";

/// Output target for logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogOutput {
    /// Console only
    #[default]
    Console,
    /// Daily-rolling log file only
    File,
    /// Both console and file
    Both,
}

impl std::str::FromStr for LogOutput {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "console" | "stdout" => Ok(LogOutput::Console),
            "file" => Ok(LogOutput::File),
            "both" | "all" => Ok(LogOutput::Both),
            _ => Err(anyhow::anyhow!("Invalid log output: {}", s)),
        }
    }
}

impl std::fmt::Display for LogOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogOutput::Console => write!(f, "console"),
            LogOutput::File => write!(f, "file"),
            LogOutput::Both => write!(f, "both"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum level to record
    pub level: Level,

    /// Output target (console, file, or both)
    pub output: LogOutput,

    /// Directory for log files (only used when output includes file)
    pub log_dir: PathBuf,

    /// Log file name prefix
    pub file_prefix: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            output: LogOutput::Console,
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            file_prefix: DEFAULT_LOG_PREFIX.to_string(),
        }
    }
}

impl LogConfig {
    /// Load configuration from environment variables
    ///
    /// - `SDP_LOG_LEVEL`: trace, debug, info, warn, error
    /// - `SDP_LOG_OUTPUT`: console, file, both
    /// - `SDP_LOG_DIR`: directory for log files
    /// - `SDP_LOG_PREFIX`: log file name prefix
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(level) = std::env::var("SDP_LOG_LEVEL") {
            config.level = level
                .parse()
                .with_context(|| format!("invalid SDP_LOG_LEVEL '{}'", level))?;
        }

        if let Ok(output) = std::env::var("SDP_LOG_OUTPUT") {
            config.output = output.parse()?;
        }

        if let Ok(dir) = std::env::var("SDP_LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }

        if let Ok(prefix) = std::env::var("SDP_LOG_PREFIX") {
            config.file_prefix = prefix;
        }

        Ok(config)
    }

    /// Set the minimum level, consuming self
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set the log file prefix, consuming self
    pub fn with_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }
}

/// Initialize the global tracing subscriber for this run.
///
/// Returns the file appender guard when a file sink is configured. Hold the
/// guard until the run is over; dropping it flushes and closes the sink.
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::from_default_env().add_directive(config.level.into());

    match config.output {
        LogOutput::Console => {
            let console_layer = fmt::layer().with_writer(std::io::stdout).with_target(true);

            tracing_subscriber::registry()
                .with(filter)
                .with(console_layer)
                .try_init()?;

            Ok(None)
        },
        LogOutput::File => {
            let (non_blocking, guard) = file_writer(config)?;

            let file_layer = fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_ansi(false);

            tracing_subscriber::registry()
                .with(filter)
                .with(file_layer)
                .try_init()?;

            Ok(Some(guard))
        },
        LogOutput::Both => {
            let (non_blocking, guard) = file_writer(config)?;

            let console_layer = fmt::layer().with_writer(std::io::stdout).with_target(true);
            let file_layer = fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_ansi(false);

            tracing_subscriber::registry()
                .with(filter)
                .with(console_layer)
                .with(file_layer)
                .try_init()?;

            Ok(Some(guard))
        },
    }
}

/// Create the daily-rolling, non-blocking file writer
fn file_writer(
    config: &LogConfig,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(&config.log_dir).context("Failed to create log directory")?;

    let file_appender = tracing_appender::rolling::daily(&config.log_dir, &config.file_prefix);
    Ok(tracing_appender::non_blocking(file_appender))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_log_output_from_str() {
        assert_eq!("console".parse::<LogOutput>().unwrap(), LogOutput::Console);
        assert_eq!("stdout".parse::<LogOutput>().unwrap(), LogOutput::Console);
        assert_eq!("FILE".parse::<LogOutput>().unwrap(), LogOutput::File);
        assert_eq!("both".parse::<LogOutput>().unwrap(), LogOutput::Both);
        assert!("invalid".parse::<LogOutput>().is_err());
    }

    #[test]
    fn test_log_output_round_trip() {
        for output in [LogOutput::Console, LogOutput::File, LogOutput::Both] {
            assert_eq!(output.to_string().parse::<LogOutput>().unwrap(), output);
        }
    }

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert_eq!(config.output, LogOutput::Console);
        assert_eq!(config.log_dir, PathBuf::from(DEFAULT_LOG_DIR));
        assert_eq!(config.file_prefix, DEFAULT_LOG_PREFIX);
    }

    #[test]
    fn test_with_level() {
        let config = LogConfig::default()
            .with_level(Level::DEBUG)
            .with_file_prefix("ingest");
        assert_eq!(config.level, Level::DEBUG);
        assert_eq!(config.file_prefix, "ingest");
    }
}
