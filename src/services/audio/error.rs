use super::{
    device::DeviceUid,
    hardware::{DeviceHandle, HalStatus, PropertySelector},
};

/// Errors that can occur during audio sharing operations
#[derive(thiserror::Error, Debug, Clone)]
pub enum AudioError {
    /// A device property could not be resolved
    ///
    /// Recovered inside the catalog by dropping the device from results.
    #[error("Property {selector} unavailable on device {device}: {status}")]
    PropertyUnavailable {
        /// Device that was queried
        device: DeviceHandle,
        /// Property that failed
        selector: PropertySelector,
        /// Platform status of the failed read
        status: HalStatus,
    },

    /// Fewer than two compatible endpoints were connected at setup
    #[error("Not enough compatible devices connected (found {found}, need 2)")]
    InsufficientDevices {
        /// Number of compatible devices found
        found: usize,
    },

    /// A mutating platform call returned a non-success status
    #[error("{operation} failed: {status}")]
    OperationFailed {
        /// Short name of the platform call
        operation: &'static str,
        /// Platform status code
        status: HalStatus,
    },

    /// Teardown could not find any output device to restore to
    #[error("No output device available to restore to")]
    NoFallbackAvailable,

    /// Unexpected failure from the platform layer
    #[error("Audio system error: {0}")]
    SystemError(String),

    /// A start or stop is already being processed
    #[error("Another sharing operation is already in progress")]
    OperationInProgress,

    /// Device handle is not part of the current compatible device list
    #[error("Device {0} not found")]
    DeviceNotFound(DeviceHandle),

    /// Device uid is not present in the catalog
    #[error("Device with uid {0} not found")]
    UidNotFound(DeviceUid),

    /// The coordinator task is gone
    #[error("Sharing service is not running")]
    ServiceUnavailable,

    /// Reading or writing the preference store failed
    #[error("Preference store error: {0}")]
    Persistence(String),
}

impl AudioError {
    /// Wrap a failed mutating platform call
    pub fn operation(operation: &'static str, status: HalStatus) -> Self {
        AudioError::OperationFailed { operation, status }
    }

    /// Message suitable for showing to the user
    pub fn user_message(&self) -> String {
        match self {
            AudioError::InsufficientDevices { .. } => {
                "Not enough devices connected. Make sure at least two Bluetooth audio devices \
                 are paired and connected."
                    .to_string()
            }
            AudioError::OperationFailed { operation, status } => {
                format!("Something went wrong ({operation}, status {}).", status.code())
            }
            AudioError::NoFallbackAvailable => {
                "Sharing stopped, but no output device could be restored. Pick an output device \
                 in the system sound settings."
                    .to_string()
            }
            AudioError::OperationInProgress => {
                "Audio sharing is already starting or stopping.".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<std::io::Error> for AudioError {
    fn from(error: std::io::Error) -> Self {
        AudioError::Persistence(error.to_string())
    }
}

impl From<serde_json::Error> for AudioError {
    fn from(error: serde_json::Error) -> Self {
        AudioError::Persistence(error.to_string())
    }
}
