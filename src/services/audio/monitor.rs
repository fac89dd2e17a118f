use tracing::{debug, info, warn};

use super::{
    aggregate::AggregateController,
    device::AudioDevice,
    error::AudioError,
    hardware::{AudioHardware, NotificationSender, Subscription},
};

/// What a topology change means for the current sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopologyVerdict {
    /// Nothing to do
    Unaffected,
    /// The sink is the default output but lost a member device
    SinkInvalidated,
}

/// Watches device topology and decides whether the sink is still usable
///
/// Holds no lifecycle state of its own; it only produces verdicts for the
/// coordinator to act on.
#[derive(Debug)]
pub struct HardwareChangeMonitor {
    subscription: Option<Subscription>,
}

impl HardwareChangeMonitor {
    /// Install the topology listener, delivering into `sink`
    ///
    /// # Errors
    /// Returns `AudioError::SystemError` if the platform refuses the listener
    pub fn subscribe(
        hardware: &dyn AudioHardware,
        sink: NotificationSender,
    ) -> Result<Self, AudioError> {
        let subscription = hardware.subscribe_topology(sink).map_err(|status| {
            AudioError::SystemError(format!("Unable to watch device changes: {status}"))
        })?;
        debug!("Subscribed to device topology changes");

        Ok(Self {
            subscription: Some(subscription),
        })
    }

    /// Whether the listener is installed
    pub fn is_subscribed(&self) -> bool {
        self.subscription
            .as_ref()
            .is_some_and(Subscription::is_active)
    }

    /// Evaluate a topology change against a freshly fetched device list
    pub async fn check(
        &self,
        controller: &AggregateController,
        devices: &[AudioDevice],
    ) -> TopologyVerdict {
        if !controller.is_sink_active().await {
            return TopologyVerdict::Unaffected;
        }

        if controller.is_sink_valid_in(devices).await {
            debug!("Multi-output device still valid");
            TopologyVerdict::Unaffected
        } else {
            warn!("Multi-output device lost a member device");
            TopologyVerdict::SinkInvalidated
        }
    }

    /// Remove the topology listener
    pub fn shutdown(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
            info!("Stopped watching device changes");
        }
    }
}
