use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Output level of one device
///
/// Always within 0.0 (muted) to 1.0 (full scale). Out of range input is
/// clamped on construction.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "f32", into = "f32")]
pub struct VolumeLevel(f32);

impl VolumeLevel {
    /// Muted
    pub const MUTED: VolumeLevel = VolumeLevel(0.0);
    /// Full scale
    pub const FULL: VolumeLevel = VolumeLevel(1.0);
    /// Level used for devices that were never cached
    pub const FALLBACK: VolumeLevel = VolumeLevel(0.75);

    /// Create a level, clamping to 0.0..=1.0
    pub fn new(level: f32) -> Self {
        if level.is_nan() {
            warn!("Volume level is not a number, using 0.0");
            return Self::MUTED;
        }
        if !(0.0..=1.0).contains(&level) {
            warn!("Volume {level} clamped to 0.0..=1.0");
        }
        Self(level.clamp(0.0, 1.0))
    }

    /// Create a level from a platform scalar
    pub fn from_scalar(level: f64) -> Self {
        Self::new(level as f32)
    }

    /// Level as scalar
    pub fn get(self) -> f32 {
        self.0
    }

    /// Level as a whole percentage
    pub fn percent(self) -> u8 {
        (self.0 * 100.0).round() as u8
    }
}

impl Default for VolumeLevel {
    fn default() -> Self {
        Self::FALLBACK
    }
}

impl From<f32> for VolumeLevel {
    fn from(level: f32) -> Self {
        Self::new(level)
    }
}

impl From<VolumeLevel> for f32 {
    fn from(level: VolumeLevel) -> Self {
        level.0
    }
}

impl fmt::Display for VolumeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.percent())
    }
}
