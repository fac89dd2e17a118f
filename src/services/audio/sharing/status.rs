use std::fmt;

use super::state::SharingState;
use crate::services::audio::{
    aggregate::SharedDevicePair, device::AudioDevice, volume::VolumeMap,
};

/// Snapshot of everything the sharing service exposes
#[derive(Debug, Clone, PartialEq)]
pub struct SharingStatus {
    /// Lifecycle state
    pub state: SharingState,
    /// Devices combined into the sink while active
    pub pair: Option<SharedDevicePair>,
    /// Compatible devices from the last catalog refresh
    pub devices: Vec<AudioDevice>,
    /// Per-device output levels
    pub volumes: VolumeMap,
}

impl fmt::Display for SharingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Sharing: {}", self.state)?;
        if let Some(pair) = &self.pair {
            writeln!(f, "{pair}")?;
        }
        writeln!(f, "Compatible devices: {}", self.devices.len())?;
        for device in &self.devices {
            match self.volumes.get(&device.id) {
                Some(level) => writeln!(f, "  [{}] {} ({level})", device.id, device.name)?,
                None => writeln!(f, "  [{}] {}", device.id, device.name)?,
            }
        }
        Ok(())
    }
}
