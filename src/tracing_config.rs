use std::env;

use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    TandemError,
    config::{ConfigPaths, LogLevel},
};

const LOG_FORMAT_VAR: &str = "TANDEM_LOG_FORMAT";
const DAYS_TO_KEEP: usize = 7;

/// Output format of console logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line human readable output
    Pretty,
    /// One JSON object per line
    Json,
}

impl LogFormat {
    /// Format selected by `TANDEM_LOG_FORMAT`, pretty unless set to `json`
    pub fn from_env() -> Self {
        match env::var(LOG_FORMAT_VAR).as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Initialize tracing for the application
///
/// `RUST_LOG` takes precedence over `level`. When `log_to_file` is set,
/// logs are also written to a daily rotated file in the log directory; the
/// returned guard must be kept alive until exit so buffered lines are flushed.
///
/// # Errors
/// Returns error if the log directory cannot be created or a subscriber is
/// already installed
pub fn init(level: LogLevel, log_to_file: bool) -> Result<Option<WorkerGuard>, TandemError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_directive()));
    let format = LogFormat::from_env();

    let (file_writer, guard) = if log_to_file {
        let log_dir = ConfigPaths::log_dir()?;
        let file_appender = rolling::Builder::new()
            .rotation(rolling::Rotation::DAILY)
            .max_log_files(DAYS_TO_KEEP)
            .filename_prefix("tandem")
            .filename_suffix("log")
            .build(&log_dir)
            .map_err(|e| TandemError::Tracing(e.to_string()))?;
        let (writer, guard) = tracing_appender::non_blocking(file_appender);
        (Some(writer), Some(guard))
    } else {
        (None, None)
    };

    let file_layer = file_writer.map(|writer| {
        fmt::layer()
            .compact()
            .with_target(true)
            .with_level(true)
            .with_writer(writer)
            .with_ansi(false)
    });

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);

    let result = match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_level(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_level(true)
                    .with_thread_ids(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };
    result.map_err(|e| TandemError::Tracing(e.to_string()))?;

    Ok(guard)
}
