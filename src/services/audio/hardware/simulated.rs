use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{
    AudioHardware, NotificationSender, Subscription,
    types::{DeviceHandle, HalStatus, HardwareNotification, PropertySelector, PropertyValue},
};
use crate::services::audio::{
    aggregate::AggregateSinkDescriptor,
    device::{DeviceUid, TransportKind, UnknownTransport},
};

const FIRST_HANDLE: u32 = 40;

/// Mutating platform operations that can be observed or made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HardwareOperation {
    /// Enumerating device handles
    EnumerateDevices,
    /// Creating an aggregate device
    CreateAggregate,
    /// Destroying an aggregate device
    DestroyAggregate,
    /// Switching the default output device
    SetDefaultOutput,
    /// Writing a device volume
    SetVolume,
}

/// Description of one simulated endpoint
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    uid: DeviceUid,
    name: String,
    transport: TransportKind,
    output_streams: u32,
    sample_rate_hz: f64,
    volume: Option<f32>,
    unreadable: HashSet<PropertySelector>,
}

impl SimulatedDevice {
    /// Endpoint with an arbitrary transport
    pub fn new(uid: &str, name: &str, transport: TransportKind, sample_rate_hz: f64) -> Self {
        Self {
            uid: DeviceUid::new(uid),
            name: name.to_string(),
            transport,
            output_streams: 1,
            sample_rate_hz,
            volume: Some(1.0),
            unreadable: HashSet::new(),
        }
    }

    /// Classic Bluetooth headphones
    pub fn bluetooth(uid: &str, name: &str, sample_rate_hz: f64) -> Self {
        Self::new(uid, name, TransportKind::Bluetooth, sample_rate_hz)
    }

    /// Built-in speakers
    pub fn built_in(uid: &str, name: &str) -> Self {
        Self::new(uid, name, TransportKind::BuiltIn, 48_000.0)
    }

    /// Remove every output stream (microphones, input-only interfaces)
    pub fn input_only(mut self) -> Self {
        self.output_streams = 0;
        self
    }

    /// Start with the given hardware volume
    pub fn with_volume(mut self, level: f32) -> Self {
        self.volume = Some(level);
        self
    }

    /// Device without a volume control
    pub fn without_volume(mut self) -> Self {
        self.volume = None;
        self
    }

    /// Make reads of `selector` fail while writes still succeed
    pub fn with_unreadable(mut self, selector: PropertySelector) -> Self {
        self.unreadable.insert(selector);
        self
    }
}

#[derive(Debug)]
struct LiveDevice {
    handle: DeviceHandle,
    profile: SimulatedDevice,
    sub_devices: Vec<DeviceUid>,
}

#[derive(Default)]
struct SimState {
    next_handle: u32,
    devices: Vec<LiveDevice>,
    default_output: Option<DeviceHandle>,
    failing: HashMap<HardwareOperation, HalStatus>,
    operation_log: Vec<HardwareOperation>,
    next_subscription: u64,
    topology_listeners: HashMap<u64, NotificationSender>,
    property_listeners: HashMap<u64, (DeviceHandle, PropertySelector, NotificationSender)>,
    last_descriptor: Option<serde_json::Value>,
}

impl SimState {
    fn allocate_handle(&mut self) -> DeviceHandle {
        if self.next_handle < FIRST_HANDLE {
            self.next_handle = FIRST_HANDLE;
        }
        let handle = DeviceHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }

    fn device(&self, handle: DeviceHandle) -> Result<&LiveDevice, HalStatus> {
        self.devices
            .iter()
            .find(|device| device.handle == handle)
            .ok_or(HalStatus::BAD_OBJECT)
    }

    fn device_by_uid(&self, uid: &str) -> Option<&LiveDevice> {
        self.devices.iter().find(|device| device.profile.uid.as_str() == uid)
    }

    fn begin(&mut self, operation: HardwareOperation) -> Result<(), HalStatus> {
        self.operation_log.push(operation);
        match self.failing.get(&operation) {
            Some(status) => Err(*status),
            None => Ok(()),
        }
    }

    fn notify_topology(&mut self) {
        self.topology_listeners
            .retain(|_, sink| sink.send(HardwareNotification::TopologyChanged).is_ok());
    }

    fn notify_property(&mut self, handle: DeviceHandle, selector: PropertySelector) {
        self.property_listeners.retain(|_, (device, watched, sink)| {
            if *device != handle || *watched != selector {
                return true;
            }
            sink.send(HardwareNotification::PropertyChanged {
                device: handle,
                selector,
            })
            .is_ok()
        });
    }

    fn reassign_default_if_removed(&mut self, removed: DeviceHandle) {
        if self.default_output != Some(removed) {
            return;
        }
        self.default_output = self
            .devices
            .iter()
            .find(|device| {
                device.profile.output_streams > 0
                    && device.profile.transport != TransportKind::Aggregate
            })
            .map(|device| device.handle);
    }
}

/// In-memory implementation of the platform audio surface
///
/// Models enough of a real device graph to drive the whole sharing
/// lifecycle: handles are reassigned on reconnect, aggregate devices appear
/// as real endpoints, and every mutation notifies subscribers. Individual
/// operations and property reads can be made to fail.
#[derive(Clone, Default)]
pub struct SimulatedHardware {
    state: Arc<Mutex<SimState>>,
}

impl fmt::Debug for SimulatedHardware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("SimulatedHardware")
            .field("devices", &state.devices.len())
            .field("default_output", &state.default_output)
            .field("failing", &state.failing)
            .finish_non_exhaustive()
    }
}

impl SimulatedHardware {
    /// Empty device graph
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Connect a device, returning its freshly assigned handle
    pub fn connect(&self, device: SimulatedDevice) -> DeviceHandle {
        let mut state = self.lock();
        let handle = state.allocate_handle();
        debug!(uid = %device.uid, %handle, "simulated device connected");
        if state.default_output.is_none() && device.output_streams > 0 {
            state.default_output = Some(handle);
        }
        state.devices.push(LiveDevice {
            handle,
            profile: device,
            sub_devices: Vec::new(),
        });
        state.notify_topology();
        handle
    }

    /// Disconnect the device with `uid`, returning whether it was present
    pub fn disconnect(&self, uid: &str) -> bool {
        let mut state = self.lock();
        let Some(position) = state
            .devices
            .iter()
            .position(|device| device.profile.uid.as_str() == uid)
        else {
            return false;
        };
        let removed = state.devices.remove(position);
        debug!(%uid, handle = %removed.handle, "simulated device disconnected");
        state.reassign_default_if_removed(removed.handle);
        state.notify_topology();
        true
    }

    /// Change a device volume as if the user turned a physical knob
    pub fn turn_knob(&self, uid: &str, level: f32) -> bool {
        let mut state = self.lock();
        let Some(device) = state
            .devices
            .iter_mut()
            .find(|device| device.profile.uid.as_str() == uid)
        else {
            return false;
        };
        device.profile.volume = Some(level.clamp(0.0, 1.0));
        let handle = device.handle;
        state.notify_property(handle, PropertySelector::OutputVolume);
        true
    }

    /// Make every future call of `operation` fail with `status`
    pub fn fail(&self, operation: HardwareOperation, status: HalStatus) {
        self.lock().failing.insert(operation, status);
    }

    /// Let `operation` succeed again
    pub fn recover(&self, operation: HardwareOperation) {
        self.lock().failing.remove(&operation);
    }

    /// Make the system default output point at `uid`
    pub fn set_default_uid(&self, uid: &str) -> bool {
        let mut state = self.lock();
        let Some(handle) = state.device_by_uid(uid).map(|device| device.handle) else {
            return false;
        };
        state.default_output = Some(handle);
        true
    }

    /// Uid of the current system default output device
    pub fn default_output_uid(&self) -> Option<DeviceUid> {
        let state = self.lock();
        let handle = state.default_output?;
        state.device(handle).ok().map(|device| device.profile.uid.clone())
    }

    /// Current handle of `uid`
    pub fn handle_of(&self, uid: &str) -> Option<DeviceHandle> {
        self.lock().device_by_uid(uid).map(|device| device.handle)
    }

    /// Hardware volume of `uid`
    pub fn volume_of(&self, uid: &str) -> Option<f32> {
        self.lock().device_by_uid(uid).and_then(|device| device.profile.volume)
    }

    /// Whether a device with `uid` is connected
    pub fn is_connected(&self, uid: &str) -> bool {
        self.lock().device_by_uid(uid).is_some()
    }

    /// Sub-device uids of the aggregate with `uid`
    pub fn aggregate_members(&self, uid: &str) -> Option<Vec<DeviceUid>> {
        let state = self.lock();
        let device = state.device_by_uid(uid)?;
        (device.profile.transport == TransportKind::Aggregate).then(|| device.sub_devices.clone())
    }

    /// Number of aggregate devices currently present
    pub fn aggregate_count(&self) -> usize {
        self.lock()
            .devices
            .iter()
            .filter(|device| device.profile.transport == TransportKind::Aggregate)
            .count()
    }

    /// Dictionary of the most recently created aggregate
    pub fn last_aggregate_dictionary(&self) -> Option<serde_json::Value> {
        self.lock().last_descriptor.clone()
    }

    /// Every mutating operation attempted so far, in order
    pub fn operation_log(&self) -> Vec<HardwareOperation> {
        self.lock().operation_log.clone()
    }

    /// Installed topology listeners
    pub fn topology_listener_count(&self) -> usize {
        self.lock().topology_listeners.len()
    }

    /// Installed property listeners
    pub fn property_listener_count(&self) -> usize {
        self.lock().property_listeners.len()
    }

    fn unsubscribe_topology(state: &Arc<Mutex<SimState>>, id: u64) {
        let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
        state.topology_listeners.remove(&id);
    }

    fn unsubscribe_property(state: &Arc<Mutex<SimState>>, id: u64) {
        let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
        state.property_listeners.remove(&id);
    }
}

#[async_trait]
impl AudioHardware for SimulatedHardware {
    async fn device_handles(&self) -> Result<Vec<DeviceHandle>, HalStatus> {
        let mut state = self.lock();
        state.begin(HardwareOperation::EnumerateDevices)?;
        Ok(state.devices.iter().map(|device| device.handle).collect())
    }

    async fn property(
        &self,
        device: DeviceHandle,
        selector: PropertySelector,
    ) -> Result<PropertyValue, HalStatus> {
        let state = self.lock();
        let live = state.device(device)?;
        let profile = &live.profile;
        if profile.unreadable.contains(&selector) {
            return Err(HalStatus::UNKNOWN_PROPERTY);
        }

        match selector {
            PropertySelector::DeviceUid => Ok(PropertyValue::Text(profile.uid.0.clone())),
            PropertySelector::Name => Ok(PropertyValue::Text(profile.name.clone())),
            PropertySelector::TransportKind => Ok(PropertyValue::U32(profile.transport.raw())),
            PropertySelector::OutputStreamCount => Ok(PropertyValue::U32(profile.output_streams)),
            PropertySelector::NominalSampleRate => Ok(PropertyValue::F64(profile.sample_rate_hz)),
            PropertySelector::OutputVolume => profile
                .volume
                .map(PropertyValue::F32)
                .ok_or(HalStatus::UNKNOWN_PROPERTY),
        }
    }

    async fn set_property(
        &self,
        device: DeviceHandle,
        selector: PropertySelector,
        value: PropertyValue,
    ) -> Result<(), HalStatus> {
        if selector != PropertySelector::OutputVolume {
            return Err(HalStatus::NOT_SETTABLE);
        }

        let mut state = self.lock();
        state.begin(HardwareOperation::SetVolume)?;
        let level = value.as_f64().ok_or(HalStatus::UNSPECIFIED)?;
        let live = state
            .devices
            .iter_mut()
            .find(|live| live.handle == device)
            .ok_or(HalStatus::BAD_OBJECT)?;
        if live.profile.volume.is_none() && !live.profile.unreadable.contains(&selector) {
            return Err(HalStatus::UNKNOWN_PROPERTY);
        }
        live.profile.volume = Some(level.clamp(0.0, 1.0) as f32);
        state.notify_property(device, selector);
        Ok(())
    }

    async fn create_aggregate_device(
        &self,
        descriptor: &AggregateSinkDescriptor,
    ) -> Result<DeviceHandle, HalStatus> {
        let mut state = self.lock();
        state.begin(HardwareOperation::CreateAggregate)?;

        if state.device_by_uid(descriptor.uid.as_str()).is_some() {
            return Err(HalStatus::UNSPECIFIED);
        }
        let mut sub_devices = Vec::with_capacity(descriptor.sub_devices.len());
        for uid in descriptor.sub_device_uids() {
            if state.device_by_uid(uid.as_str()).is_none() {
                return Err(HalStatus::BAD_OBJECT);
            }
            sub_devices.push(uid.clone());
        }
        let sample_rate_hz = state
            .device_by_uid(descriptor.master_uid.as_str())
            .map(|master| master.profile.sample_rate_hz)
            .ok_or(HalStatus::BAD_OBJECT)?;

        let handle = state.allocate_handle();
        let mut profile = SimulatedDevice::new(
            descriptor.uid.as_str(),
            &descriptor.name,
            TransportKind::Aggregate,
            sample_rate_hz,
        )
        .without_volume();
        profile.output_streams = u32::try_from(sub_devices.len()).unwrap_or(u32::MAX);

        state.devices.push(LiveDevice {
            handle,
            profile,
            sub_devices,
        });
        state.last_descriptor = Some(descriptor.to_platform_dictionary());
        state.notify_topology();
        Ok(handle)
    }

    async fn destroy_aggregate_device(&self, device: DeviceHandle) -> Result<(), HalStatus> {
        let mut state = self.lock();
        state.begin(HardwareOperation::DestroyAggregate)?;

        let position = state
            .devices
            .iter()
            .position(|live| {
                live.handle == device && live.profile.transport == TransportKind::Aggregate
            })
            .ok_or(HalStatus::BAD_OBJECT)?;
        state.devices.remove(position);
        state.reassign_default_if_removed(device);
        state.notify_topology();
        Ok(())
    }

    async fn default_output_device(&self) -> Result<DeviceHandle, HalStatus> {
        self.lock().default_output.ok_or(HalStatus::BAD_OBJECT)
    }

    async fn set_default_output_device(&self, device: DeviceHandle) -> Result<(), HalStatus> {
        let mut state = self.lock();
        state.begin(HardwareOperation::SetDefaultOutput)?;
        if state.device(device)?.profile.output_streams == 0 {
            return Err(HalStatus::NOT_SETTABLE);
        }
        state.default_output = Some(device);
        Ok(())
    }

    fn subscribe_topology(&self, sink: NotificationSender) -> Result<Subscription, HalStatus> {
        let id = {
            let mut state = self.lock();
            let id = state.next_subscription;
            state.next_subscription += 1;
            state.topology_listeners.insert(id, sink);
            id
        };

        let shared = Arc::clone(&self.state);
        Ok(Subscription::new(move || {
            Self::unsubscribe_topology(&shared, id);
        }))
    }

    fn subscribe_property(
        &self,
        device: DeviceHandle,
        selector: PropertySelector,
        sink: NotificationSender,
    ) -> Result<Subscription, HalStatus> {
        let id = {
            let mut state = self.lock();
            state.device(device)?;
            let id = state.next_subscription;
            state.next_subscription += 1;
            state.property_listeners.insert(id, (device, selector, sink));
            id
        };

        let shared = Arc::clone(&self.state);
        Ok(Subscription::new(move || {
            Self::unsubscribe_property(&shared, id);
        }))
    }
}

fn default_sample_rate() -> f64 {
    48_000.0
}

fn default_output_capable() -> bool {
    true
}

/// One device entry of a [`HardwareLayout`] file
#[derive(Debug, Clone, Deserialize)]
pub struct LayoutDevice {
    /// Persistent uid
    pub uid: String,
    /// Display name
    pub name: String,
    /// Transport name such as `bluetooth`, `bluetooth-le`, `built-in`, `usb`
    pub transport: String,
    /// Nominal sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f64,
    /// Whether the device has output streams
    #[serde(default = "default_output_capable")]
    pub output: bool,
    /// Initial hardware volume, `None` for devices without a volume control
    #[serde(default)]
    pub volume: Option<f32>,
}

/// Device graph description loaded from TOML
///
/// ```toml
/// default_output = "BuiltInSpeakerDevice"
///
/// [[device]]
/// uid = "BuiltInSpeakerDevice"
/// name = "MacBook Pro Speakers"
/// transport = "built-in"
///
/// [[device]]
/// uid = "00-11-22-33-44-55:output"
/// name = "AirPods Pro"
/// transport = "bluetooth"
/// sample_rate = 48000
/// volume = 0.6
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HardwareLayout {
    /// Uid of the initial default output device
    #[serde(default)]
    pub default_output: Option<String>,
    /// Devices in enumeration order
    #[serde(default, rename = "device")]
    pub devices: Vec<LayoutDevice>,
}

impl HardwareLayout {
    /// Parse a layout from TOML text
    ///
    /// # Errors
    /// Returns error if the text is not a valid layout
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Materialise the layout as simulated hardware
    ///
    /// # Errors
    /// Returns error if a device names an unknown transport
    pub fn build(&self) -> Result<SimulatedHardware, UnknownTransport> {
        let hardware = SimulatedHardware::new();
        for entry in &self.devices {
            let transport: TransportKind = entry.transport.parse()?;
            let mut device =
                SimulatedDevice::new(&entry.uid, &entry.name, transport, entry.sample_rate);
            device = match entry.volume {
                Some(level) => device.with_volume(level),
                None => device.without_volume(),
            };
            if !entry.output {
                device = device.input_only();
            }
            hardware.connect(device);
        }
        if let Some(uid) = &self.default_output {
            hardware.set_default_uid(uid);
        }
        Ok(hardware)
    }
}
