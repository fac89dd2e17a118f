use std::fmt;

/// Session-scoped handle to a platform audio object
///
/// Handles are reassigned when a device reconnects, so they are only valid
/// until the next topology change and must never be persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceHandle(pub u32);

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Non-success status code returned by a platform call
///
/// Status `0` means success on the platform side and is never wrapped in this type.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[error("platform status {0}")]
pub struct HalStatus(pub i32);

impl HalStatus {
    /// Generic unspecified failure
    pub const UNSPECIFIED: HalStatus = HalStatus(0x7768_6174);
    /// The object does not know the requested property
    pub const UNKNOWN_PROPERTY: HalStatus = HalStatus(0x7768_6f3f);
    /// The object handle does not refer to a live object
    pub const BAD_OBJECT: HalStatus = HalStatus(0x216f_626a);
    /// The property exists but cannot be written
    pub const NOT_SETTABLE: HalStatus = HalStatus(0x6e6f_7065);

    /// Converts a raw platform return code into a result
    ///
    /// # Errors
    /// Returns the status when `code` is not zero.
    pub fn check(code: i32) -> Result<(), HalStatus> {
        if code == 0 { Ok(()) } else { Err(HalStatus(code)) }
    }

    /// Raw status code
    pub fn code(&self) -> i32 {
        self.0
    }
}

/// Properties this subsystem reads from or writes to audio objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertySelector {
    /// Persistent device identity string
    DeviceUid,
    /// Human readable device name
    Name,
    /// Transport four-character code
    TransportKind,
    /// Number of output streams in the stream configuration
    OutputStreamCount,
    /// Nominal sample rate in Hz
    NominalSampleRate,
    /// Output volume scalar in 0.0..=1.0
    OutputVolume,
}

impl fmt::Display for PropertySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PropertySelector::DeviceUid => "device-uid",
            PropertySelector::Name => "name",
            PropertySelector::TransportKind => "transport-kind",
            PropertySelector::OutputStreamCount => "output-stream-count",
            PropertySelector::NominalSampleRate => "nominal-sample-rate",
            PropertySelector::OutputVolume => "output-volume",
        };
        f.write_str(name)
    }
}

/// Value carried by a property read or write
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// String property
    Text(String),
    /// Integer property
    U32(u32),
    /// Double precision property
    F64(f64),
    /// Single precision property
    F32(f32),
}

impl PropertyValue {
    /// Borrow the value as text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Read the value as an integer
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            PropertyValue::U32(value) => Some(*value),
            _ => None,
        }
    }

    /// Read the value as a float, widening single precision values
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::F64(value) => Some(*value),
            PropertyValue::F32(value) => Some(f64::from(*value)),
            _ => None,
        }
    }
}

/// Notification delivered by a platform subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HardwareNotification {
    /// The set of audio objects changed (device plugged, unplugged, or created)
    TopologyChanged,
    /// A watched property of a single object changed
    PropertyChanged {
        /// Object whose property changed
        device: DeviceHandle,
        /// Property that changed
        selector: PropertySelector,
    },
}
