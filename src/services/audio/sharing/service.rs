use std::sync::Arc;

use futures::Stream;
use tokio::{
    sync::{broadcast, mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{info, instrument, warn};

use super::{
    coordinator::{Command, Coordinator, Outputs},
    state::SharingState,
    status::SharingStatus,
};
use crate::{
    config::Config,
    services::{
        audio::{
            aggregate::AggregateController,
            catalog::DeviceCatalog,
            device::AudioDevice,
            error::AudioError,
            events::{SharingEvent, VolumeEvent},
            hardware::{AudioHardware, DeviceHandle},
            monitor::HardwareChangeMonitor,
            volume::{PreferenceStore, VolumeLevel, VolumeMap, VolumeSynchronizer},
        },
        common::Property,
    },
};

const EVENTS_BUFFER_SIZE: usize = 100;

/// Handle to the audio sharing engine
///
/// Constructed once with [`SharingService::start`] and passed to whoever
/// needs it. Clones share the same engine; only the original handle owns
/// the background task.
pub struct SharingService {
    command_tx: mpsc::UnboundedSender<Command>,
    state: Property<SharingState>,
    devices: Property<Vec<AudioDevice>>,
    volumes: Property<VolumeMap>,
    events_tx: broadcast::Sender<SharingEvent>,
    volume_events_tx: broadcast::Sender<VolumeEvent>,
    coordinator_handle: Option<JoinHandle<()>>,
}

impl Clone for SharingService {
    fn clone(&self) -> Self {
        Self {
            command_tx: self.command_tx.clone(),
            state: self.state.clone(),
            devices: self.devices.clone(),
            volumes: self.volumes.clone(),
            events_tx: self.events_tx.clone(),
            volume_events_tx: self.volume_events_tx.clone(),
            coordinator_handle: None,
        }
    }
}

impl SharingService {
    /// Start the engine on top of a platform surface
    ///
    /// Removes a sink left behind by a crashed session, loads cached
    /// volumes, subscribes to topology changes and performs an initial
    /// device and volume refresh.
    ///
    /// # Errors
    /// Returns error if the topology listener cannot be installed or the
    /// preference file location cannot be resolved
    #[instrument(skip_all)]
    pub async fn start(
        hardware: Arc<dyn AudioHardware>,
        config: &Config,
    ) -> Result<Self, AudioError> {
        let store_path = config
            .preferences_path()
            .map_err(|e| AudioError::Persistence(e.to_string()))?;
        Self::start_with_store(hardware, config, PreferenceStore::at(store_path)).await
    }

    /// Start the engine with an explicit preference store
    ///
    /// # Errors
    /// Returns error if the topology listener cannot be installed
    pub async fn start_with_store(
        hardware: Arc<dyn AudioHardware>,
        config: &Config,
        store: PreferenceStore,
    ) -> Result<Self, AudioError> {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (notification_tx, notification_rx) = mpsc::unbounded_channel();
        let (events_tx, _) = broadcast::channel(EVENTS_BUFFER_SIZE);
        let (volume_events_tx, _) = broadcast::channel(EVENTS_BUFFER_SIZE);

        let controller = Arc::new(AggregateController::new(
            Arc::clone(&hardware),
            config.sharing.identity(),
            config.sharing.restore_previous_default,
        ));
        if let Err(error) = controller.remove_stale_sink().await {
            warn!("Unable to remove leftover multi-output device: {error}");
        }

        let monitor = HardwareChangeMonitor::subscribe(hardware.as_ref(), notification_tx.clone())?;
        let volume = VolumeSynchronizer::new(
            Arc::clone(&hardware),
            store,
            config.volume.fallback_level(),
            notification_tx,
            volume_events_tx.clone(),
        );
        let volumes = volume.levels();

        let state = Property::new(SharingState::Inactive);
        let devices = Property::new(Vec::new());
        let mut coordinator = Coordinator::new(
            command_rx,
            notification_rx,
            controller,
            DeviceCatalog::new(hardware),
            monitor,
            volume,
            Outputs {
                state: state.clone(),
                devices: devices.clone(),
                events: events_tx.clone(),
            },
        );
        coordinator.prime().await;
        let coordinator_handle = tokio::spawn(coordinator.run());
        info!("Sharing service started");

        Ok(Self {
            command_tx,
            state,
            devices,
            volumes,
            events_tx,
            volume_events_tx,
            coordinator_handle: Some(coordinator_handle),
        })
    }

    /// Build the aggregate sink and route output to it
    ///
    /// Resolves once setup has finished.
    ///
    /// # Errors
    /// Returns `AudioError::InsufficientDevices` with fewer than two compatible
    /// devices, `AudioError::OperationInProgress` while another start or stop
    /// runs, or the platform failure that aborted setup
    pub async fn start_sharing(&self) -> Result<(), AudioError> {
        self.request(Command::Start).await?
    }

    /// Restore the default output and destroy the aggregate sink
    ///
    /// Resolves once teardown has finished. Stopping while already inactive
    /// succeeds immediately; stopping during setup waits for setup to finish
    /// and then tears down.
    ///
    /// # Errors
    /// Returns `AudioError::OperationFailed` if the sink could not be destroyed
    /// or the default output could not be switched back
    pub async fn stop_sharing(&self) -> Result<(), AudioError> {
        self.request(Command::Stop).await?
    }

    /// Set the output level of a compatible device
    ///
    /// # Errors
    /// Returns `AudioError::DeviceNotFound` if `device` is not a compatible device
    pub async fn set_volume(&self, device: DeviceHandle, level: f32) -> Result<(), AudioError> {
        let level = VolumeLevel::new(level);
        self.request(|reply| Command::SetVolume {
            device,
            level,
            reply,
        })
        .await?
    }

    /// Re-enumerate devices and re-read their volumes
    ///
    /// # Errors
    /// Returns `AudioError::SystemError` if the device list cannot be read
    pub async fn refresh_devices(&self) -> Result<Vec<AudioDevice>, AudioError> {
        self.request(Command::RefreshDevices).await?
    }

    /// Snapshot of state, shared pair, devices and volumes
    ///
    /// # Errors
    /// Returns `AudioError::ServiceUnavailable` if the service has shut down
    pub async fn status(&self) -> Result<SharingStatus, AudioError> {
        self.request(Command::Status).await
    }

    /// Current sharing state
    pub fn state(&self) -> SharingState {
        self.state.get()
    }

    /// Sharing state as a stream, starting with the current value
    pub fn watch_state(&self) -> impl Stream<Item = SharingState> + Send + 'static {
        self.state.watch()
    }

    /// Compatible devices from the last refresh
    pub fn compatible_devices(&self) -> Vec<AudioDevice> {
        self.devices.get()
    }

    /// Compatible devices as a stream, starting with the current list
    pub fn watch_devices(&self) -> impl Stream<Item = Vec<AudioDevice>> + Send + 'static {
        self.devices.watch()
    }

    /// Current per-device volume map
    pub fn volumes(&self) -> VolumeMap {
        self.volumes.get()
    }

    /// Volume map as a stream, starting with the current map
    pub fn watch_volumes(&self) -> impl Stream<Item = VolumeMap> + Send + 'static {
        self.volumes.watch()
    }

    /// Stream of lifecycle events
    pub fn events(&self) -> impl Stream<Item = SharingEvent> + Send + 'static {
        use async_stream::stream;

        let mut events_rx = self.events_tx.subscribe();
        stream! {
            loop {
                match events_rx.recv().await {
                    Ok(event) => yield event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Sharing event stream lagged, skipped {skipped} events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    /// Stream of volume changes
    pub fn volume_events(&self) -> impl Stream<Item = VolumeEvent> + Send + 'static {
        use async_stream::stream;

        let mut events_rx = self.volume_events_tx.subscribe();
        stream! {
            while let Ok(event) = events_rx.recv().await {
                yield event;
            }
        }
    }

    /// Stop sharing if active, clean up the sink and join the background task
    ///
    /// # Errors
    /// Returns `AudioError::ServiceUnavailable` if the background task is already gone
    pub async fn shutdown(mut self) -> Result<(), AudioError> {
        let (reply, done) = oneshot::channel();
        self.command_tx
            .send(Command::Shutdown(reply))
            .map_err(|_| AudioError::ServiceUnavailable)?;
        let acknowledged = done.await;

        if let Some(handle) = self.coordinator_handle.take() {
            let _ = handle.await;
        }

        acknowledged.map_err(|_| AudioError::ServiceUnavailable)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, AudioError> {
        let (reply, response) = oneshot::channel();
        self.command_tx
            .send(command(reply))
            .map_err(|_| AudioError::ServiceUnavailable)?;
        response.await.map_err(|_| AudioError::ServiceUnavailable)
    }
}

impl Drop for SharingService {
    fn drop(&mut self) {
        if let Some(handle) = self.coordinator_handle.take() {
            handle.abort();
        }
    }
}
