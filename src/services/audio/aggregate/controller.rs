use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

use super::{
    descriptor::{AggregateSinkDescriptor, SharedDevicePair, SinkIdentity},
    restore::{RestorePolicy, RestoreTarget},
};
use crate::services::audio::{
    catalog::DeviceCatalog,
    device::{AudioDevice, DeviceUid},
    error::AudioError,
    hardware::{AudioHardware, DeviceHandle, HalStatus},
};

#[derive(Debug, Clone)]
struct SinkSession {
    pair: SharedDevicePair,
    previous_default: Option<AudioDevice>,
    sink: DeviceHandle,
}

/// Creates and destroys the aggregate sink and moves the default output
///
/// Holds the shared pair of the current sharing episode. It exists from a
/// successful [`setup`](Self::setup) until the next
/// [`teardown`](Self::teardown).
pub struct AggregateController {
    hardware: Arc<dyn AudioHardware>,
    catalog: DeviceCatalog,
    identity: SinkIdentity,
    prefer_previous_default: bool,
    session: RwLock<Option<SinkSession>>,
}

impl AggregateController {
    /// Create a controller for the sink with the given identity
    pub fn new(
        hardware: Arc<dyn AudioHardware>,
        identity: SinkIdentity,
        prefer_previous_default: bool,
    ) -> Self {
        Self {
            catalog: DeviceCatalog::new(Arc::clone(&hardware)),
            hardware,
            identity,
            prefer_previous_default,
            session: RwLock::new(None),
        }
    }

    /// Pair combined by the current sink, if any
    pub async fn shared_pair(&self) -> Option<SharedDevicePair> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|session| session.pair.clone())
    }

    /// Build the aggregate sink and make it the default output
    ///
    /// Removes any leftover sink with the same uid first, then requires at
    /// least two compatible devices. The device with the highest sample rate
    /// becomes master.
    ///
    /// # Errors
    /// Returns `AudioError::InsufficientDevices` with fewer than two compatible
    /// devices, `AudioError::OperationFailed` if a platform call fails, or
    /// `AudioError::SystemError` if the device list cannot be read.
    #[instrument(skip(self), fields(sink = %self.identity.uid))]
    pub async fn setup(&self) -> Result<AggregateSinkDescriptor, AudioError> {
        info!("Starting setup of multi-output device");
        *self.session.write().await = None;

        let previous_default = self.catalog.find_default_output_device().await;
        self.remove_stale_sink().await?;

        let devices = self.catalog.list_devices().await?;
        log_devices(&devices, previous_default.as_ref());

        let compatible: Vec<AudioDevice> =
            devices.into_iter().filter(AudioDevice::is_compatible).collect();
        info!("Found {} compatible devices", compatible.len());

        let pair = SharedDevicePair::select(&compatible).ok_or_else(|| {
            let error = AudioError::InsufficientDevices {
                found: compatible.len(),
            };
            warn!("Device validation failed: {error}");
            error
        })?;
        info!("Selected devices for sharing - {pair}");

        let descriptor = AggregateSinkDescriptor::for_pair(&self.identity, &pair);
        let sink = self
            .hardware
            .create_aggregate_device(&descriptor)
            .await
            .map_err(|status| {
                error!("Failed to create multi-output device: {status}");
                AudioError::operation("create aggregate device", status)
            })?;
        info!("Created multi-output device with ID: {sink}");

        if let Err(status) = self.hardware.set_default_output_device(sink).await {
            error!("Failed to set multi-output device as default: {status}");
            if let Err(cleanup) = self.hardware.destroy_aggregate_device(sink).await {
                error!("Failed to remove unused multi-output device: {cleanup}");
            }
            return Err(AudioError::operation("set default output device", status));
        }

        *self.session.write().await = Some(SinkSession {
            pair,
            previous_default,
            sink,
        });
        info!("Multi-output device setup completed successfully");
        Ok(descriptor)
    }

    /// Decide where the default output should go once sharing stops
    ///
    /// # Errors
    /// Returns `AudioError::NoFallbackAvailable` if no candidate is connected,
    /// or `AudioError::SystemError` if the device list cannot be read.
    pub async fn plan_restore(&self) -> Result<RestoreTarget, AudioError> {
        let devices = self.catalog.list_devices().await?;
        let session = self.session.read().await;
        let policy = RestorePolicy {
            pair: session.as_ref().map(|session| &session.pair),
            previous_default: session
                .as_ref()
                .and_then(|session| session.previous_default.as_ref()),
            prefer_previous_default: self.prefer_previous_default,
            sink_uid: &self.identity.uid,
        };

        policy.choose(&devices).ok_or(AudioError::NoFallbackAvailable)
    }

    /// Restore the default output, then destroy the sink
    ///
    /// Destruction is attempted even when restoring fails. The sink created
    /// by the current episode is destroyed by handle without a catalog
    /// lookup; without an episode any sink carrying the well-known uid is
    /// removed instead. A sink that is already gone is not an error. The
    /// shared pair is cleared in every case.
    ///
    /// # Errors
    /// Returns `AudioError::OperationFailed` if destroying the sink or
    /// switching the default output fails, or `AudioError::SystemError` if
    /// the sink has to be looked up and the device list cannot be read. A
    /// destruction failure takes precedence.
    #[instrument(skip(self, restore_to), fields(sink = %self.identity.uid))]
    pub async fn teardown(&self, restore_to: Option<&RestoreTarget>) -> Result<(), AudioError> {
        let mut restore_result = Ok(());
        if let Some(target) = restore_to {
            info!(
                "Restoring output to {}: {}",
                target.reason, target.device.name
            );
            let restored = self
                .hardware
                .set_default_output_device(target.device.id)
                .await;
            if let Err(status) = restored {
                error!("Failed to restore default output device: {status}");
                restore_result = Err(AudioError::operation(
                    "restore default output device",
                    status,
                ));
            }
        }

        let session_sink = self.session.read().await.as_ref().map(|session| session.sink);
        let destroy_result = match session_sink {
            Some(sink) => self.destroy_sink(sink).await,
            None => self.remove_stale_sink().await,
        };
        *self.session.write().await = None;

        destroy_result.and(restore_result)
    }

    /// Destroy any sink carrying the well-known uid
    ///
    /// # Errors
    /// Returns `AudioError::OperationFailed` if the platform refuses to destroy
    /// it, or `AudioError::SystemError` if the device list cannot be read.
    pub async fn remove_stale_sink(&self) -> Result<(), AudioError> {
        match self.catalog.resolve_device_by_uid(&self.identity.uid).await {
            Ok(existing) => self.destroy_sink(existing.id).await,
            Err(AudioError::UidNotFound(_)) => {
                debug!("No existing multi-output device found");
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    async fn destroy_sink(&self, sink: DeviceHandle) -> Result<(), AudioError> {
        info!("Removing multi-output device with ID: {sink}");
        match self.hardware.destroy_aggregate_device(sink).await {
            Ok(()) => Ok(()),
            Err(HalStatus::BAD_OBJECT) => {
                debug!("Multi-output device {sink} already gone");
                Ok(())
            }
            Err(status) => {
                error!("Failed to remove multi-output device: {status}");
                Err(AudioError::operation("destroy aggregate device", status))
            }
        }
    }

    /// Whether the system default output is the aggregate sink
    pub async fn is_sink_active(&self) -> bool {
        self.catalog
            .find_default_output_device()
            .await
            .is_some_and(|device| device.uid == self.identity.uid)
    }

    /// Whether both shared devices are still connected
    ///
    /// Performs a fresh enumeration; a failed enumeration counts as invalid.
    pub async fn is_sink_valid(&self) -> bool {
        match self.catalog.list_devices().await {
            Ok(devices) => self.is_sink_valid_in(&devices).await,
            Err(error) => {
                warn!("Unable to verify multi-output device: {error}");
                false
            }
        }
    }

    /// Whether both shared devices appear in an already fetched device list
    pub async fn is_sink_valid_in(&self, devices: &[AudioDevice]) -> bool {
        let session = self.session.read().await;
        let Some(session) = session.as_ref() else {
            return false;
        };

        let present = |uid: &DeviceUid| devices.iter().any(|device| device.uid == *uid);
        present(&session.pair.master.uid) && present(&session.pair.second.uid)
    }
}

fn log_devices(devices: &[AudioDevice], default_device: Option<&AudioDevice>) {
    debug!("Found {} audio devices", devices.len());
    for device in devices {
        debug!("{device}");
    }
    if let Some(default_device) = default_device {
        info!("Current default output device: {}", default_device.name);
    }
}
