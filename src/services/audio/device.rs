use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::hardware::DeviceHandle;

/// Stable device identity string
///
/// Survives reconnects and process restarts, unlike [`DeviceHandle`]. This is
/// the only key devices are compared or persisted by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceUid(pub String);

impl DeviceUid {
    /// Create a DeviceUid from a string
    pub fn new(uid: impl Into<String>) -> Self {
        Self(uid.into())
    }

    /// Get the uid as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

const fn fourcc(code: &[u8; 4]) -> u32 {
    u32::from_be_bytes(*code)
}

const TRANSPORT_BUILT_IN: u32 = fourcc(b"bltn");
const TRANSPORT_USB: u32 = fourcc(b"usb ");
const TRANSPORT_BLUETOOTH: u32 = fourcc(b"blue");
const TRANSPORT_BLUETOOTH_LE: u32 = fourcc(b"blea");
const TRANSPORT_AGGREGATE: u32 = fourcc(b"grup");
const TRANSPORT_VIRTUAL: u32 = fourcc(b"virt");
const TRANSPORT_PCI: u32 = fourcc(b"pci ");
const TRANSPORT_FIREWIRE: u32 = fourcc(b"1394");
const TRANSPORT_HDMI: u32 = fourcc(b"hdmi");
const TRANSPORT_DISPLAY_PORT: u32 = fourcc(b"dprt");
const TRANSPORT_AIRPLAY: u32 = fourcc(b"airp");
const TRANSPORT_AVB: u32 = fourcc(b"eavb");
const TRANSPORT_THUNDERBOLT: u32 = fourcc(b"thun");

/// Physical or logical connection category of an audio endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Built into the machine (speakers, headphone jack)
    BuiltIn,
    /// USB audio class device
    Usb,
    /// Classic Bluetooth (A2DP/HFP)
    Bluetooth,
    /// Bluetooth Low Energy audio
    BluetoothLe,
    /// Aggregate of other devices
    Aggregate,
    /// Software device
    Virtual,
    /// Any other transport, with the raw platform code kept for diagnostics
    Other(u32),
}

impl TransportKind {
    /// Decode the platform four-character transport code
    pub fn from_raw(code: u32) -> Self {
        match code {
            TRANSPORT_BUILT_IN => TransportKind::BuiltIn,
            TRANSPORT_USB => TransportKind::Usb,
            TRANSPORT_BLUETOOTH => TransportKind::Bluetooth,
            TRANSPORT_BLUETOOTH_LE => TransportKind::BluetoothLe,
            TRANSPORT_AGGREGATE => TransportKind::Aggregate,
            TRANSPORT_VIRTUAL => TransportKind::Virtual,
            other => TransportKind::Other(other),
        }
    }

    /// Encode back to the platform four-character transport code
    pub fn raw(self) -> u32 {
        match self {
            TransportKind::BuiltIn => TRANSPORT_BUILT_IN,
            TransportKind::Usb => TRANSPORT_USB,
            TransportKind::Bluetooth => TRANSPORT_BLUETOOTH,
            TransportKind::BluetoothLe => TRANSPORT_BLUETOOTH_LE,
            TransportKind::Aggregate => TRANSPORT_AGGREGATE,
            TransportKind::Virtual => TRANSPORT_VIRTUAL,
            TransportKind::Other(code) => code,
        }
    }

    /// Whether this is one of the two Bluetooth transports
    pub fn is_bluetooth(self) -> bool {
        matches!(self, TransportKind::Bluetooth | TransportKind::BluetoothLe)
    }

    /// Human readable transport label
    pub fn label(self) -> &'static str {
        match self {
            TransportKind::BuiltIn => "Built-in",
            TransportKind::Usb => "USB",
            TransportKind::Bluetooth => "Bluetooth",
            TransportKind::BluetoothLe => "Bluetooth LE",
            TransportKind::Aggregate => "Aggregate",
            TransportKind::Virtual => "Virtual",
            TransportKind::Other(TRANSPORT_PCI) => "PCI",
            TransportKind::Other(TRANSPORT_FIREWIRE) => "FireWire",
            TransportKind::Other(TRANSPORT_HDMI) => "HDMI",
            TransportKind::Other(TRANSPORT_DISPLAY_PORT) => "DisplayPort",
            TransportKind::Other(TRANSPORT_AIRPLAY) => "AirPlay",
            TransportKind::Other(TRANSPORT_AVB) => "AVB",
            TransportKind::Other(TRANSPORT_THUNDERBOLT) => "Thunderbolt",
            TransportKind::Other(_) => "Unknown",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when a transport name cannot be parsed
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown transport kind '{0}'")]
pub struct UnknownTransport(pub String);

impl FromStr for TransportKind {
    type Err = UnknownTransport;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "built-in" | "builtin" => Ok(TransportKind::BuiltIn),
            "usb" => Ok(TransportKind::Usb),
            "bluetooth" => Ok(TransportKind::Bluetooth),
            "bluetooth-le" | "ble" => Ok(TransportKind::BluetoothLe),
            "aggregate" => Ok(TransportKind::Aggregate),
            "virtual" => Ok(TransportKind::Virtual),
            "hdmi" => Ok(TransportKind::Other(TRANSPORT_HDMI)),
            "airplay" => Ok(TransportKind::Other(TRANSPORT_AIRPLAY)),
            "other" => Ok(TransportKind::Other(0)),
            _ => Err(UnknownTransport(s.to_string())),
        }
    }
}

/// Audio endpoint as resolved by one catalog refresh
///
/// Instances are rebuilt on every refresh and never mutated. `id` is only
/// meaningful until the next topology change; `uid` is the stable identity.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioDevice {
    /// Session-scoped platform handle
    pub id: DeviceHandle,
    /// Stable identity
    pub uid: DeviceUid,
    /// Display name
    pub name: String,
    /// Connection category
    pub transport: TransportKind,
    /// Whether the stream configuration has at least one output stream
    pub is_output_capable: bool,
    /// Nominal sample rate in Hz
    pub sample_rate_hz: f64,
}

impl AudioDevice {
    /// Whether the device can take part in an aggregate sink
    ///
    /// Only output-capable Bluetooth endpoints qualify.
    pub fn is_compatible(&self) -> bool {
        self.is_output_capable && self.transport.is_bluetooth()
    }
}

impl fmt::Display for AudioDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Device ID: {}", self.id)?;
        writeln!(f, "Name: {}", self.name)?;
        writeln!(f, "UID: {}", self.uid)?;
        writeln!(f, "Transport Type: {}", self.transport)?;
        writeln!(f, "Is Output Device: {}", self.is_output_capable)?;
        writeln!(f, "Sample Rate: {} Hz", self.sample_rate_hz)?;
        write!(f, "Is Compatible: {}", self.is_compatible())
    }
}
