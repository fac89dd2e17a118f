/// Aggregate sink construction and teardown
pub mod aggregate;
/// Device enumeration and property resolution
pub mod catalog;
/// Audio device model
pub mod device;
/// Audio error types
pub mod error;
/// Collaborator-facing event types
pub mod events;
/// Platform audio surface
pub mod hardware;
/// Topology change detection
pub mod monitor;
/// Sharing lifecycle
pub mod sharing;
/// Volume synchronisation and persistence
pub mod volume;

#[cfg(test)]
mod tests;

pub use aggregate::{
    AggregateController, AggregateSinkDescriptor, RestoreReason, RestoreTarget, SharedDevicePair,
    SinkIdentity,
};
pub use catalog::DeviceCatalog;
pub use device::{AudioDevice, DeviceUid, TransportKind, UnknownTransport};
pub use error::AudioError;
pub use events::{SharingEvent, VolumeEvent, VolumeOrigin};
pub use hardware::{
    AudioHardware, DeviceHandle, HalStatus, HardwareLayout, HardwareNotification,
    HardwareOperation, PropertySelector, PropertyValue, SimulatedDevice, SimulatedHardware,
    Subscription,
};
pub use monitor::{HardwareChangeMonitor, TopologyVerdict};
pub use sharing::{SharingService, SharingState, SharingStatus};
pub use volume::{PreferenceStore, VolumeCache, VolumeLevel, VolumeMap};
