//! Configuration schema for Tandem.
//!
//! Loaded from a single TOML file. Every field has a default, so an empty
//! or missing file is a valid configuration.

mod error;
mod general;
mod loading;
mod paths;
mod sharing;
mod volume;


pub use error::ConfigError;
pub use general::{GeneralConfig, LogLevel};
pub use paths::ConfigPaths;
pub use sharing::SharingConfig;
pub use volume::VolumeConfig;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Main configuration structure for Tandem.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
pub struct Config {
    /// General application settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Aggregate sink identity and stop behaviour.
    #[serde(default)]
    pub sharing: SharingConfig,

    /// Volume fallback and persistence.
    #[serde(default)]
    pub volume: VolumeConfig,
}
