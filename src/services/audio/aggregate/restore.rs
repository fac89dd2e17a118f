use std::fmt;

use super::descriptor::SharedDevicePair;
use crate::services::audio::device::{AudioDevice, DeviceUid, TransportKind};

/// Why a device was picked as the output to restore to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreReason {
    /// The default output captured when sharing started
    PreviousDefault,
    /// Master of the shared pair
    Master,
    /// Second device of the shared pair
    Second,
    /// First built-in output device
    BuiltIn,
}

impl fmt::Display for RestoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RestoreReason::PreviousDefault => "previous default device",
            RestoreReason::Master => "master device",
            RestoreReason::Second => "second device",
            RestoreReason::BuiltIn => "built-in output",
        };
        f.write_str(label)
    }
}

/// Output device the system default should return to after sharing
#[derive(Debug, Clone, PartialEq)]
pub struct RestoreTarget {
    /// Device as resolved by the latest catalog refresh
    pub device: AudioDevice,
    /// Which rule selected it
    pub reason: RestoreReason,
}

/// Inputs of the restoration policy
#[derive(Debug, Clone, Copy)]
pub struct RestorePolicy<'a> {
    /// Pair that was shared, if any
    pub pair: Option<&'a SharedDevicePair>,
    /// Default output captured at setup
    pub previous_default: Option<&'a AudioDevice>,
    /// Try `previous_default` before the pair
    pub prefer_previous_default: bool,
    /// Uid of the aggregate sink, never a valid target
    pub sink_uid: &'a DeviceUid,
}

impl RestorePolicy<'_> {
    /// Pick the restore target among the currently connected devices
    ///
    /// Priority: the previous default (only when preferred), master, second,
    /// then the first built-in output. Candidates are matched by uid and the
    /// returned device carries its current handle.
    pub fn choose(&self, connected: &[AudioDevice]) -> Option<RestoreTarget> {
        let find = |uid: &DeviceUid| {
            connected
                .iter()
                .find(|device| {
                    device.uid == *uid && device.is_output_capable && device.uid != *self.sink_uid
                })
                .cloned()
        };

        let mut ranked: Vec<(&DeviceUid, RestoreReason)> = Vec::with_capacity(3);
        if self.prefer_previous_default {
            if let Some(previous) = self.previous_default {
                ranked.push((&previous.uid, RestoreReason::PreviousDefault));
            }
        }
        if let Some(pair) = self.pair {
            ranked.push((&pair.master.uid, RestoreReason::Master));
            ranked.push((&pair.second.uid, RestoreReason::Second));
        }

        ranked
            .into_iter()
            .find_map(|(uid, reason)| find(uid).map(|device| RestoreTarget { device, reason }))
            .or_else(|| {
                connected
                    .iter()
                    .find(|device| {
                        device.transport == TransportKind::BuiltIn && device.is_output_capable
                    })
                    .map(|device| RestoreTarget {
                        device: device.clone(),
                        reason: RestoreReason::BuiltIn,
                    })
            })
    }
}
