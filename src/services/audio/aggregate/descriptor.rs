use std::fmt;

use crate::services::audio::device::{AudioDevice, DeviceUid};

/// Platform dictionary key for the aggregate display name
pub const AGGREGATE_DEVICE_NAME_KEY: &str = "name";
/// Platform dictionary key for the aggregate persistent uid
pub const AGGREGATE_DEVICE_UID_KEY: &str = "uid";
/// Platform dictionary key for the sub-device list
pub const AGGREGATE_DEVICE_SUB_DEVICE_LIST_KEY: &str = "subdevices";
/// Platform dictionary key for the clock master sub-device
pub const AGGREGATE_DEVICE_MASTER_KEY: &str = "master";
/// Platform dictionary key marking a stacked (multi-output) aggregate
pub const AGGREGATE_DEVICE_STACKED_KEY: &str = "stacked";
/// Platform dictionary key for a sub-device uid
pub const SUB_DEVICE_UID_KEY: &str = "uid";
/// Platform dictionary key enabling drift compensation on a sub-device
pub const SUB_DEVICE_DRIFT_COMPENSATION_KEY: &str = "drift";

/// Well-known identity of the virtual sink
///
/// The uid is reused across runs so that a sink left behind by a crashed
/// session can be found and removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkIdentity {
    /// Persistent uid of the sink
    pub uid: DeviceUid,
    /// Display name of the sink
    pub name: String,
}

impl Default for SinkIdentity {
    fn default() -> Self {
        Self {
            uid: DeviceUid::new("TandemOutputDevice"),
            name: "Tandem Output Device".to_string(),
        }
    }
}

/// The two devices combined into the aggregate sink
#[derive(Debug, Clone, PartialEq)]
pub struct SharedDevicePair {
    /// Drives the clock and nominal sample rate of the sink
    pub master: AudioDevice,
    /// Drift-compensated follower
    pub second: AudioDevice,
}

impl SharedDevicePair {
    /// Pick master and second from a list of compatible devices
    ///
    /// The highest sample rate becomes master; ties keep catalog order.
    /// Returns `None` with fewer than two devices.
    pub fn select(compatible: &[AudioDevice]) -> Option<Self> {
        let mut ranked: Vec<&AudioDevice> = compatible.iter().collect();
        ranked.sort_by(|a, b| b.sample_rate_hz.total_cmp(&a.sample_rate_hz));

        match ranked.as_slice() {
            [master, second, ..] => Some(Self {
                master: (*master).clone(),
                second: (*second).clone(),
            }),
            _ => None,
        }
    }
}

impl fmt::Display for SharedDevicePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Master: {} ({}Hz), Second: {} ({}Hz)",
            self.master.name,
            self.master.sample_rate_hz,
            self.second.name,
            self.second.sample_rate_hz
        )
    }
}

/// One entry of the aggregate sub-device list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubDevice {
    /// Persistent uid of the physical device
    pub uid: DeviceUid,
    /// Whether the platform should resample this device against the master clock
    pub drift_compensation: bool,
}

/// Everything the platform needs to create the aggregate sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateSinkDescriptor {
    /// Persistent uid of the sink
    pub uid: DeviceUid,
    /// Display name of the sink
    pub name: String,
    /// Member devices, master first
    pub sub_devices: Vec<SubDevice>,
    /// Uid of the clock master
    pub master_uid: DeviceUid,
    /// Every sub-device plays the same stream
    pub stacked: bool,
}

impl AggregateSinkDescriptor {
    /// Build the descriptor for a device pair
    ///
    /// Drift compensation is enabled on every sub-device except the master.
    pub fn for_pair(identity: &SinkIdentity, pair: &SharedDevicePair) -> Self {
        let sub_devices = [&pair.master, &pair.second]
            .into_iter()
            .map(|device| SubDevice {
                uid: device.uid.clone(),
                drift_compensation: device.uid != pair.master.uid,
            })
            .collect();

        Self {
            uid: identity.uid.clone(),
            name: identity.name.clone(),
            sub_devices,
            master_uid: pair.master.uid.clone(),
            stacked: true,
        }
    }

    /// Uids of all sub-devices in order
    pub fn sub_device_uids(&self) -> impl Iterator<Item = &DeviceUid> {
        self.sub_devices.iter().map(|sub| &sub.uid)
    }

    /// Render the descriptor as the key/value dictionary platform backends consume
    pub fn to_platform_dictionary(&self) -> serde_json::Value {
        let sub_devices: Vec<serde_json::Value> = self
            .sub_devices
            .iter()
            .map(|sub| {
                let mut entry = serde_json::Map::new();
                entry.insert(SUB_DEVICE_UID_KEY.to_string(), sub.uid.as_str().into());
                if sub.drift_compensation {
                    entry.insert(SUB_DEVICE_DRIFT_COMPENSATION_KEY.to_string(), 1.into());
                }
                serde_json::Value::Object(entry)
            })
            .collect();

        let mut dictionary = serde_json::Map::new();
        dictionary.insert(AGGREGATE_DEVICE_NAME_KEY.to_string(), self.name.as_str().into());
        dictionary.insert(AGGREGATE_DEVICE_UID_KEY.to_string(), self.uid.as_str().into());
        dictionary.insert(
            AGGREGATE_DEVICE_SUB_DEVICE_LIST_KEY.to_string(),
            serde_json::Value::Array(sub_devices),
        );
        dictionary.insert(
            AGGREGATE_DEVICE_MASTER_KEY.to_string(),
            self.master_uid.as_str().into(),
        );
        dictionary.insert(
            AGGREGATE_DEVICE_STACKED_KEY.to_string(),
            u8::from(self.stacked).into(),
        );
        serde_json::Value::Object(dictionary)
    }
}
