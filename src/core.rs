use thiserror::Error;

use crate::{config::ConfigError, services::audio::{AudioError, UnknownTransport}};

/// Top-level error of the Tandem binary and library entry points
#[derive(Error, Debug)]
pub enum TandemError {
    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The sharing engine reported a failure
    #[error(transparent)]
    Audio(#[from] AudioError),

    /// A simulated hardware layout could not be loaded
    #[error("invalid hardware layout: {0}")]
    Layout(String),

    /// I/O failure outside configuration handling
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Logging could not be initialised
    #[error("failed to initialise logging: {0}")]
    Tracing(String),
}

impl From<UnknownTransport> for TandemError {
    fn from(error: UnknownTransport) -> Self {
        TandemError::Layout(error.to_string())
    }
}

impl From<toml::de::Error> for TandemError {
    fn from(error: toml::de::Error) -> Self {
        TandemError::Layout(error.to_string())
    }
}

/// A specialized `Result` type for Tandem operations.
pub type Result<T> = std::result::Result<T, TandemError>;
