use std::{collections::HashSet, sync::Arc};

use futures::future::join_all;
use tracing::{debug, instrument, warn};

use super::{
    device::{AudioDevice, DeviceUid, TransportKind},
    error::AudioError,
    hardware::{AudioHardware, DeviceHandle, HalStatus, PropertySelector, PropertyValue},
};

/// Read-only view of the audio endpoints known to the platform
///
/// Every call re-queries the hardware; nothing is cached here. Callers that
/// need the same list repeatedly should keep the result of the last refresh.
#[derive(Clone)]
pub struct DeviceCatalog {
    hardware: Arc<dyn AudioHardware>,
}

impl DeviceCatalog {
    /// Create a catalog over the given platform surface
    pub fn new(hardware: Arc<dyn AudioHardware>) -> Self {
        Self { hardware }
    }

    /// Enumerate and resolve every endpoint
    ///
    /// Devices are resolved concurrently and returned in platform enumeration
    /// order. A device whose required properties cannot be read is left out
    /// of the result; a second device reporting an already seen uid is
    /// dropped as well.
    ///
    /// # Errors
    /// Returns `AudioError::SystemError` if the device list itself cannot be read
    #[instrument(skip(self))]
    pub async fn list_devices(&self) -> Result<Vec<AudioDevice>, AudioError> {
        let handles = self.hardware.device_handles().await.map_err(|status| {
            AudioError::SystemError(format!("Unable to enumerate audio devices: {status}"))
        })?;

        let resolved = join_all(handles.iter().map(|&handle| self.resolve(handle))).await;

        let mut seen = HashSet::with_capacity(resolved.len());
        let mut devices = Vec::with_capacity(resolved.len());
        for result in resolved {
            match result {
                Ok(device) => {
                    if seen.insert(device.uid.clone()) {
                        devices.push(device);
                    } else {
                        warn!(uid = %device.uid, id = %device.id, "Duplicate device uid, skipping");
                    }
                }
                Err(error) => debug!("Skipping device: {error}"),
            }
        }

        debug!("Found {} audio devices", devices.len());
        Ok(devices)
    }

    /// Resolve a single handle into a device
    ///
    /// Identity, name, transport, sample rate and stream configuration are
    /// queried concurrently. A missing stream configuration marks the device
    /// as not output-capable instead of failing.
    ///
    /// # Errors
    /// Returns `AudioError::PropertyUnavailable` if a required property is missing
    pub async fn resolve(&self, handle: DeviceHandle) -> Result<AudioDevice, AudioError> {
        let (uid, name, transport, sample_rate, streams) = futures::join!(
            self.read(handle, PropertySelector::DeviceUid),
            self.read(handle, PropertySelector::Name),
            self.read(handle, PropertySelector::TransportKind),
            self.read(handle, PropertySelector::NominalSampleRate),
            self.read(handle, PropertySelector::OutputStreamCount),
        );

        let uid = expect_text(handle, PropertySelector::DeviceUid, uid?)?;
        let name = expect_text(handle, PropertySelector::Name, name?)?;
        let transport = expect_u32(handle, PropertySelector::TransportKind, transport?)?;
        let sample_rate_hz = expect_f64(handle, PropertySelector::NominalSampleRate, sample_rate?)?;
        let output_streams = streams
            .ok()
            .and_then(|value| value.as_u32())
            .unwrap_or_default();

        let device = AudioDevice {
            id: handle,
            uid: DeviceUid(uid),
            name,
            transport: TransportKind::from_raw(transport),
            is_output_capable: output_streams > 0,
            sample_rate_hz,
        };
        debug!("Initialized AudioDevice: {} (ID: {})", device.name, device.id);
        Ok(device)
    }

    /// Current system default output device
    ///
    /// Returns `None` if there is no default or it cannot be resolved.
    pub async fn find_default_output_device(&self) -> Option<AudioDevice> {
        let handle = match self.hardware.default_output_device().await {
            Ok(handle) => handle,
            Err(status) => {
                debug!("Unable to read default output device: {status}");
                return None;
            }
        };

        match self.resolve(handle).await {
            Ok(device) => Some(device),
            Err(error) => {
                debug!("Unable to resolve default output device: {error}");
                None
            }
        }
    }

    /// Look up a device by its persistent uid
    ///
    /// Expensive: performs a full enumeration. Avoid in hot paths and prefer
    /// the id/uid pairs from the last catalog refresh.
    ///
    /// # Errors
    /// Returns `AudioError::UidNotFound` if no connected device carries `uid`,
    /// or `AudioError::SystemError` if the device list cannot be read.
    pub async fn resolve_device_by_uid(&self, uid: &DeviceUid) -> Result<AudioDevice, AudioError> {
        self.list_devices()
            .await?
            .into_iter()
            .find(|device| device.uid == *uid)
            .ok_or_else(|| AudioError::UidNotFound(uid.clone()))
    }

    async fn read(
        &self,
        device: DeviceHandle,
        selector: PropertySelector,
    ) -> Result<PropertyValue, AudioError> {
        self.hardware
            .property(device, selector)
            .await
            .map_err(|status| AudioError::PropertyUnavailable {
                device,
                selector,
                status,
            })
    }
}

fn mismatched(device: DeviceHandle, selector: PropertySelector) -> AudioError {
    AudioError::PropertyUnavailable {
        device,
        selector,
        status: HalStatus::UNSPECIFIED,
    }
}

fn expect_text(
    device: DeviceHandle,
    selector: PropertySelector,
    value: PropertyValue,
) -> Result<String, AudioError> {
    match value {
        PropertyValue::Text(text) => Ok(text),
        _ => Err(mismatched(device, selector)),
    }
}

fn expect_u32(
    device: DeviceHandle,
    selector: PropertySelector,
    value: PropertyValue,
) -> Result<u32, AudioError> {
    value.as_u32().ok_or_else(|| mismatched(device, selector))
}

fn expect_f64(
    device: DeviceHandle,
    selector: PropertySelector,
    value: PropertyValue,
) -> Result<f64, AudioError> {
    value.as_f64().ok_or_else(|| mismatched(device, selector))
}
