mod log_level;

pub use log_level::LogLevel;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Global settings that are not specific to audio sharing.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
pub struct GeneralConfig {
    /// Logging level, overridden by `RUST_LOG` when set.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Also write logs to a daily rotated file in the data directory.
    #[serde(default)]
    pub log_to_file: bool,
}
