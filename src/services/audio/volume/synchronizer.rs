use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use futures::future::join_all;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use super::{
    cache::{PreferenceStore, VolumeCache},
    level::VolumeLevel,
};
use crate::services::{
    audio::{
        device::AudioDevice,
        error::AudioError,
        events::{VolumeEvent, VolumeOrigin},
        hardware::{
            AudioHardware, DeviceHandle, HalStatus, NotificationSender, PropertySelector,
            PropertyValue, Subscription,
        },
    },
    common::Property,
};

/// Per-device volume map keyed by session handle
pub type VolumeMap = BTreeMap<DeviceHandle, VolumeLevel>;

/// Keeps per-device output levels in sync with hardware and the preference store
///
/// Owns the in-memory `handle -> level` map shown to collaborators and the
/// persistent `uid -> level` cache. Only compatible devices are tracked.
pub struct VolumeSynchronizer {
    hardware: Arc<dyn AudioHardware>,
    store: PreferenceStore,
    cache: VolumeCache,
    fallback: VolumeLevel,
    devices: Vec<AudioDevice>,
    levels: Property<VolumeMap>,
    subscriptions: HashMap<DeviceHandle, Subscription>,
    notifications: NotificationSender,
    events: broadcast::Sender<VolumeEvent>,
}

impl VolumeSynchronizer {
    /// Create a synchronizer and load the persisted cache
    ///
    /// An unreadable store is logged and replaced by an empty cache.
    pub fn new(
        hardware: Arc<dyn AudioHardware>,
        store: PreferenceStore,
        fallback: VolumeLevel,
        notifications: NotificationSender,
        events: broadcast::Sender<VolumeEvent>,
    ) -> Self {
        let cache = store.load().unwrap_or_else(|error| {
            warn!("Unable to load cached volumes: {error}");
            VolumeCache::default()
        });

        Self {
            hardware,
            store,
            cache,
            fallback,
            devices: Vec::new(),
            levels: Property::new(VolumeMap::new()),
            subscriptions: HashMap::new(),
            notifications,
            events,
        }
    }

    /// Read-only view of the volume map
    pub fn levels(&self) -> Property<VolumeMap> {
        self.levels.clone()
    }

    /// Persistent cache as currently held in memory
    pub fn cache(&self) -> &VolumeCache {
        &self.cache
    }

    /// Re-read the level of every compatible device
    ///
    /// Devices whose level cannot be read get their cached level, or the
    /// fallback level if never cached, and that level is written back to the
    /// hardware. Property listeners are moved to the new set of devices.
    #[instrument(skip_all, fields(devices = devices.len()))]
    pub async fn refresh_all(&mut self, devices: &[AudioDevice]) {
        self.devices = devices
            .iter()
            .filter(|device| device.is_compatible())
            .cloned()
            .collect();
        self.resubscribe();

        let readings = join_all(self.devices.iter().map(|device| self.read_level(device.id))).await;

        let mut levels = VolumeMap::new();
        let mut write_back = Vec::new();
        for (device, reading) in self.devices.iter().zip(readings) {
            let level = match reading {
                Ok(level) => {
                    debug!("Volume for {} is {level}", device.name);
                    level
                }
                Err(status) => {
                    let level = self.cache.get(&device.uid).unwrap_or(self.fallback);
                    warn!(
                        "Unable to read volume for {} ({status}), restoring {level}",
                        device.name
                    );
                    write_back.push((device.id, level));
                    level
                }
            };
            self.cache.insert(device.uid.clone(), level);
            levels.insert(device.id, level);
        }

        for (device, level) in write_back {
            self.write_level(device, level).await;
        }

        self.levels.set(levels);
        self.persist();
    }

    /// Set the level of one device
    ///
    /// The map and cache are updated before the hardware write. A failed
    /// write is logged and left in place for the next refresh to correct.
    ///
    /// # Errors
    /// Returns `AudioError::DeviceNotFound` if `device` is not a tracked device
    #[instrument(skip(self), fields(level = %level))]
    pub async fn set_volume(
        &mut self,
        device: DeviceHandle,
        level: VolumeLevel,
    ) -> Result<(), AudioError> {
        let tracked = self
            .devices
            .iter()
            .find(|candidate| candidate.id == device)
            .cloned()
            .ok_or(AudioError::DeviceNotFound(device))?;

        self.record(&tracked, level, VolumeOrigin::Program);
        self.write_level(device, level).await;
        Ok(())
    }

    /// React to a volume change reported by the hardware
    ///
    /// The current hardware value is read again, so notifications arriving
    /// late or out of order always converge on the latest level.
    pub async fn handle_hardware_change(&mut self, device: DeviceHandle) {
        let Some(tracked) = self
            .devices
            .iter()
            .find(|candidate| candidate.id == device)
            .cloned()
        else {
            debug!("Ignoring volume change of untracked device {device}");
            return;
        };

        match self.read_level(device).await {
            Ok(level) => {
                if self.levels.get().get(&device) != Some(&level) {
                    info!("Hardware volume for {} changed to {level}", tracked.name);
                    self.record(&tracked, level, VolumeOrigin::Hardware);
                }
            }
            Err(status) => debug!("Unable to read changed volume of {}: {status}", tracked.name),
        }
    }

    /// Drop every property listener and flush the cache
    pub fn shutdown(&mut self) {
        for (_, subscription) in self.subscriptions.drain() {
            subscription.cancel();
        }
        self.persist();
    }

    fn record(&mut self, device: &AudioDevice, level: VolumeLevel, origin: VolumeOrigin) {
        self.levels.update(|levels| levels.insert(device.id, level) != Some(level));
        if self.cache.insert(device.uid.clone(), level) {
            self.persist();
        }

        let _ = self.events.send(VolumeEvent::LevelChanged {
            device: device.id,
            uid: device.uid.clone(),
            level,
            origin,
        });
    }

    fn persist(&self) {
        if let Err(error) = self.store.save(&self.cache) {
            warn!("Unable to persist cached volumes: {error}");
        }
    }

    fn resubscribe(&mut self) {
        self.subscriptions
            .retain(|handle, _| self.devices.iter().any(|device| device.id == *handle));

        for device in &self.devices {
            if self.subscriptions.contains_key(&device.id) {
                continue;
            }
            match self.hardware.subscribe_property(
                device.id,
                PropertySelector::OutputVolume,
                self.notifications.clone(),
            ) {
                Ok(subscription) => {
                    self.subscriptions.insert(device.id, subscription);
                }
                Err(status) => {
                    warn!("Unable to watch volume of {}: {status}", device.name);
                }
            }
        }
    }

    async fn read_level(&self, device: DeviceHandle) -> Result<VolumeLevel, HalStatus> {
        let value = self
            .hardware
            .property(device, PropertySelector::OutputVolume)
            .await?;
        value
            .as_f64()
            .map(VolumeLevel::from_scalar)
            .ok_or(HalStatus::UNSPECIFIED)
    }

    async fn write_level(&self, device: DeviceHandle, level: VolumeLevel) {
        if let Err(status) = self
            .hardware
            .set_property(
                device,
                PropertySelector::OutputVolume,
                PropertyValue::F32(level.get()),
            )
            .await
        {
            warn!("Failed to set volume of device {device}: {status}");
        }
    }
}
