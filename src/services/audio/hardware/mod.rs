use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// In-memory platform backend
pub mod simulated;
/// Handles, selectors and status codes of the platform surface
pub mod types;

pub use simulated::{HardwareLayout, HardwareOperation, SimulatedDevice, SimulatedHardware};
pub use types::{DeviceHandle, HalStatus, HardwareNotification, PropertySelector, PropertyValue};

use super::aggregate::AggregateSinkDescriptor;

/// Channel end that platform subscriptions deliver notifications into
///
/// Every subscription of a service shares one sender so topology and
/// per-device property changes arrive on a single ordered channel.
pub type NotificationSender = mpsc::UnboundedSender<HardwareNotification>;

/// Receiving side of [`NotificationSender`]
pub type NotificationReceiver = mpsc::UnboundedReceiver<HardwareNotification>;

/// Platform audio device management surface
///
/// Everything this crate knows about physical hardware goes through this
/// trait. Calls returning a [`HalStatus`] error carry the raw platform code
/// without further decoding.
#[async_trait]
pub trait AudioHardware: Send + Sync + 'static {
    /// Enumerate every audio object currently known to the platform
    ///
    /// # Errors
    /// Returns the platform status if the device list cannot be read
    async fn device_handles(&self) -> Result<Vec<DeviceHandle>, HalStatus>;

    /// Read a single property of an audio object
    ///
    /// # Errors
    /// Returns the platform status if the property is missing or unreadable
    async fn property(
        &self,
        device: DeviceHandle,
        selector: PropertySelector,
    ) -> Result<PropertyValue, HalStatus>;

    /// Write a single property of an audio object
    ///
    /// # Errors
    /// Returns the platform status if the property is missing or not settable
    async fn set_property(
        &self,
        device: DeviceHandle,
        selector: PropertySelector,
        value: PropertyValue,
    ) -> Result<(), HalStatus>;

    /// Create a virtual aggregate device from the descriptor
    ///
    /// # Errors
    /// Returns the platform status if the device cannot be created
    async fn create_aggregate_device(
        &self,
        descriptor: &AggregateSinkDescriptor,
    ) -> Result<DeviceHandle, HalStatus>;

    /// Destroy a previously created aggregate device
    ///
    /// # Errors
    /// Returns the platform status if the device cannot be destroyed
    async fn destroy_aggregate_device(&self, device: DeviceHandle) -> Result<(), HalStatus>;

    /// Handle of the system default output device
    ///
    /// # Errors
    /// Returns the platform status if the default device cannot be read
    async fn default_output_device(&self) -> Result<DeviceHandle, HalStatus>;

    /// Make the given device the system default output
    ///
    /// # Errors
    /// Returns the platform status if the default device cannot be changed
    async fn set_default_output_device(&self, device: DeviceHandle) -> Result<(), HalStatus>;

    /// Subscribe to device topology changes
    ///
    /// # Errors
    /// Returns the platform status if the listener cannot be installed
    fn subscribe_topology(&self, sink: NotificationSender) -> Result<Subscription, HalStatus>;

    /// Subscribe to changes of one property on one device
    ///
    /// # Errors
    /// Returns the platform status if the listener cannot be installed
    fn subscribe_property(
        &self,
        device: DeviceHandle,
        selector: PropertySelector,
        sink: NotificationSender,
    ) -> Result<Subscription, HalStatus>;
}

/// Cancellable platform listener registration
///
/// The listener is removed when [`Subscription::cancel`] is called or the
/// handle is dropped, whichever comes first.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Wrap the platform-specific removal routine
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Remove the listener now
    pub fn cancel(mut self) {
        self.run_cancel();
    }

    /// Whether the listener is still installed
    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
