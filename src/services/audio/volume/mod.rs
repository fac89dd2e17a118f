mod cache;
mod level;
mod synchronizer;

#[cfg(test)]
mod tests;

pub use cache::{DEVICE_VOLUMES_KEY, PreferenceStore, UPDATED_AT_KEY, VolumeCache};
pub use level::VolumeLevel;
pub use synchronizer::{VolumeMap, VolumeSynchronizer};
