use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::services::audio::VolumeLevel;

fn default_level() -> f32 {
    VolumeLevel::FALLBACK.get()
}

/// Volume synchronisation settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct VolumeConfig {
    /// Level applied to a device whose volume cannot be read and that has
    /// no cached level (0.0 to 1.0).
    #[serde(default = "default_level")]
    pub default_level: f32,

    /// Preference file holding cached device volumes. Defaults to
    /// `preferences.json` in the data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            default_level: default_level(),
            store_path: None,
        }
    }
}

impl VolumeConfig {
    /// Fallback level, clamped to the valid range
    pub fn fallback_level(&self) -> VolumeLevel {
        VolumeLevel::new(self.default_level)
    }
}
