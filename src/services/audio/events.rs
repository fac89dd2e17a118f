use super::{
    device::{AudioDevice, DeviceUid},
    hardware::DeviceHandle,
    sharing::SharingState,
    volume::VolumeLevel,
};

/// Lifecycle events broadcast by the sharing coordinator
#[derive(Debug, Clone, PartialEq)]
pub enum SharingEvent {
    /// The sharing state moved to a new value
    StateChanged(SharingState),

    /// A shared device disappeared and sharing was stopped without a request
    ConfigurationInvalidated,

    /// A start or stop failed
    OperationFailed {
        /// Text for the user
        message: String,
    },

    /// Sharing stopped but the default output could not be restored
    RestoreWarning {
        /// Text for the user
        message: String,
    },

    /// The compatible device list changed
    DevicesChanged(Vec<AudioDevice>),
}

/// Where a volume change came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeOrigin {
    /// Written by this process
    Program,
    /// Changed on the device itself or by another process
    Hardware,
}

/// Volume events broadcast by the volume synchronizer
#[derive(Debug, Clone, PartialEq)]
pub enum VolumeEvent {
    /// Level of one device changed
    LevelChanged {
        /// Session handle of the device
        device: DeviceHandle,
        /// Stable identity of the device
        uid: DeviceUid,
        /// New level
        level: VolumeLevel,
        /// Who changed it
        origin: VolumeOrigin,
    },
}
