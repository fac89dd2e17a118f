use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors raised while locating or loading the configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Neither the XDG variable nor `HOME` is set
    #[error("cannot locate {kind} directory: neither {xdg_var} nor HOME is set")]
    NoHomeDirectory {
        /// Which directory was being resolved
        kind: &'static str,
        /// XDG variable consulted first
        xdg_var: &'static str,
    },

    /// Reading or writing a file failed
    #[error("I/O error on '{path}': {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// The file is not valid TOML or does not match the schema
    #[error("failed to parse TOML at '{location}': {details}")]
    TomlParse {
        /// File path or "string"
        location: String,
        /// Parser message
        details: String,
    },

    /// A field holds a value outside its domain
    #[error("invalid config field '{field}': {reason}")]
    InvalidField {
        /// Dotted field path
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

impl ConfigError {
    /// Wrap an I/O failure on `path`
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ConfigError::Io {
            path: path.into(),
            source,
        }
    }
}
