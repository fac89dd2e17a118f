use thiserror::Error;

use crate::{config::ConfigError, services::audio::AudioError};

/// Errors that can occur during CLI command execution.
///
/// Each variant carries enough context to print a useful message before
/// the process exits with a non-zero status.
#[derive(Error, Debug)]
pub enum CliError {
    /// An argument was syntactically valid but out of range.
    #[error("Invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// Name of the offending argument
        arg: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// The simulated hardware layout could not be loaded.
    ///
    /// Covers unreadable files, malformed TOML and unknown transport names.
    #[error("Hardware layout error: {0}")]
    Layout(String),

    /// Configuration could not be loaded or serialized.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The sharing engine reported a failure.
    #[error("{}", .0.user_message())]
    Audio(#[from] AudioError),

    /// Command output could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Type alias for command execution results.
///
/// Commands return the text to print on success.
pub type CommandResult = Result<String, CliError>;
