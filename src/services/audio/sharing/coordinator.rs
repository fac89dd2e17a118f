use std::{future::Future, pin::Pin, sync::Arc};

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, instrument, warn};

use super::{
    state::{Action, SharingState, Transition, Trigger},
    status::SharingStatus,
};
use crate::services::{
    audio::{
        aggregate::{AggregateController, AggregateSinkDescriptor, RestoreTarget},
        catalog::DeviceCatalog,
        device::AudioDevice,
        error::AudioError,
        events::SharingEvent,
        hardware::{DeviceHandle, HardwareNotification, NotificationReceiver, PropertySelector},
        monitor::{HardwareChangeMonitor, TopologyVerdict},
        volume::{VolumeLevel, VolumeSynchronizer},
    },
    common::Property,
};

type Reply<T> = oneshot::Sender<Result<T, AudioError>>;

/// Requests sent from service handles to the coordinator task
#[derive(Debug)]
pub(crate) enum Command {
    Start(Reply<()>),
    Stop(Reply<()>),
    SetVolume {
        device: DeviceHandle,
        level: VolumeLevel,
        reply: Reply<()>,
    },
    RefreshDevices(Reply<Vec<AudioDevice>>),
    Status(oneshot::Sender<SharingStatus>),
    Shutdown(oneshot::Sender<()>),
}

enum Outcome {
    Setup(Result<AggregateSinkDescriptor, AudioError>),
    Teardown {
        restore: Result<RestoreTarget, AudioError>,
        result: Result<(), AudioError>,
    },
}

type InFlight = Pin<Box<dyn Future<Output = Outcome> + Send>>;

/// Single owner of the sharing lifecycle
///
/// Commands, platform notifications and the completion of the running
/// setup or teardown are all handled on this one task, so lifecycle
/// operations never overlap.
pub(crate) struct Coordinator {
    commands: mpsc::UnboundedReceiver<Command>,
    notifications: NotificationReceiver,
    controller: Arc<AggregateController>,
    catalog: DeviceCatalog,
    monitor: HardwareChangeMonitor,
    volume: VolumeSynchronizer,
    state: Property<SharingState>,
    devices: Property<Vec<AudioDevice>>,
    events: broadcast::Sender<SharingEvent>,
    last_catalog: Vec<AudioDevice>,
    start_waiters: Vec<Reply<()>>,
    stop_waiters: Vec<Reply<()>>,
    pending_stop: bool,
    recheck_after_setup: bool,
    closing: bool,
    shutdown_reply: Option<oneshot::Sender<()>>,
}

/// Shared handles the coordinator publishes into
pub(crate) struct Outputs {
    pub(crate) state: Property<SharingState>,
    pub(crate) devices: Property<Vec<AudioDevice>>,
    pub(crate) events: broadcast::Sender<SharingEvent>,
}

impl Coordinator {
    pub(crate) fn new(
        commands: mpsc::UnboundedReceiver<Command>,
        notifications: NotificationReceiver,
        controller: Arc<AggregateController>,
        catalog: DeviceCatalog,
        monitor: HardwareChangeMonitor,
        volume: VolumeSynchronizer,
        outputs: Outputs,
    ) -> Self {
        Self {
            commands,
            notifications,
            controller,
            catalog,
            monitor,
            volume,
            state: outputs.state,
            devices: outputs.devices,
            events: outputs.events,
            last_catalog: Vec::new(),
            start_waiters: Vec::new(),
            stop_waiters: Vec::new(),
            pending_stop: false,
            recheck_after_setup: false,
            closing: false,
            shutdown_reply: None,
        }
    }

    /// Populate device list and volumes before the first command arrives
    pub(crate) async fn prime(&mut self) {
        if let Err(error) = self.refresh().await {
            warn!("Initial device refresh failed: {error}");
        }
    }

    pub(crate) async fn run(mut self) {
        let mut in_flight: Option<InFlight> = None;
        let mut commands_open = true;

        loop {
            tokio::select! {
                command = self.commands.recv(), if commands_open => {
                    match command {
                        Some(command) => self.handle_command(command, &mut in_flight).await,
                        None => {
                            debug!("All service handles dropped");
                            commands_open = false;
                            self.begin_close(&mut in_flight);
                        }
                    }
                }
                Some(notification) = self.notifications.recv() => {
                    self.handle_notification(notification, &mut in_flight).await;
                }
                outcome = drive(&mut in_flight), if in_flight.is_some() => {
                    in_flight = None;
                    self.complete(outcome, &mut in_flight).await;
                }
            }

            if self.closing && in_flight.is_none() && self.state.get() == SharingState::Inactive {
                self.finish().await;
                break;
            }
        }
    }

    async fn handle_command(&mut self, command: Command, in_flight: &mut Option<InFlight>) {
        match command {
            Command::Start(reply) => {
                if self.closing {
                    let _ = reply.send(Err(AudioError::ServiceUnavailable));
                    return;
                }
                match self.apply(Trigger::StartRequested, in_flight) {
                    Transition::Move { .. } => self.start_waiters.push(reply),
                    Transition::Busy => {
                        let _ = reply.send(Err(AudioError::OperationInProgress));
                    }
                    _ => {
                        let _ = reply.send(Ok(()));
                    }
                }
            }
            Command::Stop(reply) => match self.apply(Trigger::StopRequested, in_flight) {
                Transition::Move { .. } | Transition::Defer => self.stop_waiters.push(reply),
                _ => {
                    let _ = reply.send(Ok(()));
                }
            },
            Command::SetVolume {
                device,
                level,
                reply,
            } => {
                let _ = reply.send(self.volume.set_volume(device, level).await);
            }
            Command::RefreshDevices(reply) => {
                let result = self.refresh().await.map(|_| self.devices.get());
                if result.is_ok() {
                    self.validate_sink(in_flight).await;
                }
                let _ = reply.send(result);
            }
            Command::Status(reply) => {
                let _ = reply.send(SharingStatus {
                    state: self.state.get(),
                    pair: self.controller.shared_pair().await,
                    devices: self.devices.get(),
                    volumes: self.volume.levels().get(),
                });
            }
            Command::Shutdown(reply) => {
                info!("Shutting down sharing coordinator");
                self.shutdown_reply = Some(reply);
                self.begin_close(in_flight);
            }
        }
    }

    fn begin_close(&mut self, in_flight: &mut Option<InFlight>) {
        self.closing = true;
        if matches!(
            self.state.get(),
            SharingState::Active | SharingState::Starting
        ) {
            self.apply(Trigger::StopRequested, in_flight);
        }
    }

    async fn handle_notification(
        &mut self,
        first: HardwareNotification,
        in_flight: &mut Option<InFlight>,
    ) {
        let mut batch = vec![first];
        while let Ok(next) = self.notifications.try_recv() {
            batch.push(next);
        }

        let mut topology_changed = false;
        let mut volume_changes: Vec<DeviceHandle> = Vec::new();
        for notification in batch {
            match notification {
                HardwareNotification::TopologyChanged => topology_changed = true,
                HardwareNotification::PropertyChanged {
                    device,
                    selector: PropertySelector::OutputVolume,
                } => {
                    if !volume_changes.contains(&device) {
                        volume_changes.push(device);
                    }
                }
                HardwareNotification::PropertyChanged { device, selector } => {
                    debug!("Ignoring {selector} change on device {device}");
                }
            }
        }

        if topology_changed {
            debug!("Device topology changed");
            match self.refresh().await {
                Ok(()) => self.validate_sink(in_flight).await,
                Err(error) => warn!("Device refresh after topology change failed: {error}"),
            }
        }
        for device in volume_changes {
            self.volume.handle_hardware_change(device).await;
        }
    }

    /// Re-fetch the catalog and publish the compatible devices and their volumes
    async fn refresh(&mut self) -> Result<(), AudioError> {
        let devices = self.catalog.list_devices().await?;
        let compatible: Vec<AudioDevice> = devices
            .iter()
            .filter(|device| device.is_compatible())
            .cloned()
            .collect();

        if self.devices.set(compatible.clone()) {
            info!("Compatible devices: {}", compatible.len());
            let _ = self.events.send(SharingEvent::DevicesChanged(compatible));
        }
        self.volume.refresh_all(&devices).await;
        self.last_catalog = devices;
        Ok(())
    }

    async fn validate_sink(&mut self, in_flight: &mut Option<InFlight>) {
        match self.state.get() {
            SharingState::Active => {
                let verdict = self.monitor.check(&self.controller, &self.last_catalog).await;
                if verdict == TopologyVerdict::SinkInvalidated {
                    warn!("Multi-output device is no longer valid, stopping sharing");
                    let _ = self.events.send(SharingEvent::ConfigurationInvalidated);
                    self.apply(Trigger::ForcedInvalidation, in_flight);
                }
            }
            SharingState::Starting => self.recheck_after_setup = true,
            SharingState::Inactive | SharingState::Stopping => {}
        }
    }

    #[instrument(skip(self, in_flight), fields(state = %self.state.get()))]
    fn apply(&mut self, trigger: Trigger, in_flight: &mut Option<InFlight>) -> Transition {
        let current = self.state.get();
        let transition = current.on(trigger);

        match transition {
            Transition::Move { to, action } => {
                info!("Sharing state {current} -> {to}");
                self.state.set(to);
                let _ = self.events.send(SharingEvent::StateChanged(to));
                if let Some(action) = action {
                    *in_flight = Some(self.operation(action));
                }
            }
            Transition::Ignore => debug!("Ignoring {trigger:?}, already {current}"),
            Transition::Busy => warn!("Rejecting {trigger:?}, operation in progress"),
            Transition::Defer => {
                info!("Stop requested during setup, applying once setup completes");
                self.pending_stop = true;
            }
            Transition::Invalid => warn!("Invalid transition: {trigger:?} while {current}"),
        }

        transition
    }

    fn operation(&self, action: Action) -> InFlight {
        let controller = Arc::clone(&self.controller);
        match action {
            Action::Setup => Box::pin(async move { Outcome::Setup(controller.setup().await) }),
            Action::Teardown => Box::pin(async move {
                let restore = controller.plan_restore().await;
                let result = controller.teardown(restore.as_ref().ok()).await;
                Outcome::Teardown { restore, result }
            }),
        }
    }

    async fn complete(&mut self, outcome: Outcome, in_flight: &mut Option<InFlight>) {
        match outcome {
            Outcome::Setup(Ok(descriptor)) => {
                info!(
                    "Sharing active on {} with master {}",
                    descriptor.name, descriptor.master_uid
                );
                self.apply(Trigger::SetupSucceeded, in_flight);
                for waiter in self.start_waiters.drain(..) {
                    let _ = waiter.send(Ok(()));
                }

                if std::mem::take(&mut self.pending_stop) {
                    self.recheck_after_setup = false;
                    self.apply(Trigger::StopRequested, in_flight);
                } else if std::mem::take(&mut self.recheck_after_setup) {
                    match self.refresh().await {
                        Ok(()) => self.validate_sink(in_flight).await,
                        Err(error) => warn!("Device refresh after setup failed: {error}"),
                    }
                }
            }
            Outcome::Setup(Err(error)) => {
                error!("Failed to start sharing: {error}");
                self.apply(Trigger::SetupFailed, in_flight);
                self.pending_stop = false;
                self.recheck_after_setup = false;
                let _ = self.events.send(SharingEvent::OperationFailed {
                    message: error.user_message(),
                });
                for waiter in self.start_waiters.drain(..) {
                    let _ = waiter.send(Err(error.clone()));
                }
                for waiter in self.stop_waiters.drain(..) {
                    let _ = waiter.send(Ok(()));
                }
            }
            Outcome::Teardown { restore, result } => {
                match restore {
                    Ok(target) => debug!("Restored output to {}", target.device.name),
                    Err(error) => {
                        warn!("Unable to restore default output: {error}");
                        let _ = self.events.send(SharingEvent::RestoreWarning {
                            message: error.user_message(),
                        });
                    }
                }

                self.apply(Trigger::TeardownComplete, in_flight);

                if let Err(error) = &result {
                    error!("Failed to stop sharing cleanly: {error}");
                    let _ = self.events.send(SharingEvent::OperationFailed {
                        message: error.user_message(),
                    });
                }
                for waiter in self.stop_waiters.drain(..) {
                    let _ = waiter.send(result.clone());
                }
            }
        }
    }

    async fn finish(&mut self) {
        if let Err(error) = self.controller.remove_stale_sink().await {
            warn!("Unable to remove multi-output device on shutdown: {error}");
        }
        self.monitor.shutdown();
        self.volume.shutdown();
        info!("Sharing coordinator stopped");

        if let Some(reply) = self.shutdown_reply.take() {
            let _ = reply.send(());
        }
    }
}

async fn drive(in_flight: &mut Option<InFlight>) -> Outcome {
    match in_flight {
        Some(operation) => operation.await,
        None => std::future::pending().await,
    }
}
