//! Unit tests for the audio device model, catalog and platform surface
//!
//! Everything runs against simulated hardware; no platform audio
//! system is touched.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use tokio::sync::mpsc;

use crate::services::audio::{
    aggregate::{AggregateController, SinkIdentity},
    catalog::DeviceCatalog,
    device::{AudioDevice, DeviceUid, TransportKind},
    error::AudioError,
    hardware::{
        AudioHardware, DeviceHandle, HalStatus, HardwareLayout, HardwareNotification,
        HardwareOperation, PropertySelector, PropertyValue, SimulatedDevice, SimulatedHardware,
        Subscription,
    },
    monitor::{HardwareChangeMonitor, TopologyVerdict},
};

fn catalog(hardware: &SimulatedHardware) -> DeviceCatalog {
    DeviceCatalog::new(Arc::new(hardware.clone()))
}

fn bluetooth_device(transport: TransportKind, output: bool) -> AudioDevice {
    AudioDevice {
        id: DeviceHandle(7),
        uid: DeviceUid::new("buds"),
        name: "Buds".to_string(),
        transport,
        is_output_capable: output,
        sample_rate_hz: 48_000.0,
    }
}

#[test]
fn transport_decodes_known_codes() {
    assert_eq!(
        TransportKind::from_raw(u32::from_be_bytes(*b"blue")),
        TransportKind::Bluetooth
    );
    assert_eq!(
        TransportKind::from_raw(u32::from_be_bytes(*b"blea")),
        TransportKind::BluetoothLe
    );
    assert_eq!(
        TransportKind::from_raw(u32::from_be_bytes(*b"bltn")),
        TransportKind::BuiltIn
    );
}

#[test]
fn transport_keeps_unknown_codes() {
    let hdmi = u32::from_be_bytes(*b"hdmi");
    let kind = TransportKind::from_raw(hdmi);

    assert_eq!(kind, TransportKind::Other(hdmi));
    assert_eq!(kind.raw(), hdmi);
    assert_eq!(kind.label(), "HDMI");
    assert_eq!(TransportKind::Other(1).label(), "Unknown");
}

#[test]
fn transport_parses_names() {
    assert_eq!("Bluetooth".parse::<TransportKind>().unwrap(), TransportKind::Bluetooth);
    assert_eq!("ble".parse::<TransportKind>().unwrap(), TransportKind::BluetoothLe);
    assert_eq!("built-in".parse::<TransportKind>().unwrap(), TransportKind::BuiltIn);
    assert!("carrier-pigeon".parse::<TransportKind>().is_err());
}

#[test]
fn only_output_capable_bluetooth_is_compatible() {
    assert!(bluetooth_device(TransportKind::Bluetooth, true).is_compatible());
    assert!(bluetooth_device(TransportKind::BluetoothLe, true).is_compatible());
    assert!(!bluetooth_device(TransportKind::Bluetooth, false).is_compatible());
    assert!(!bluetooth_device(TransportKind::Usb, true).is_compatible());
    assert!(!bluetooth_device(TransportKind::Aggregate, true).is_compatible());
}

#[test]
fn device_display_lists_diagnostics() {
    let rendered = bluetooth_device(TransportKind::BluetoothLe, true).to_string();

    assert!(rendered.contains("Device ID: 7"));
    assert!(rendered.contains("Transport Type: Bluetooth LE"));
    assert!(rendered.contains("Sample Rate: 48000 Hz"));
    assert!(rendered.ends_with("Is Compatible: true"));
}

#[test]
fn hal_status_check_passes_zero() {
    assert!(HalStatus::check(0).is_ok());
    assert_eq!(HalStatus::check(-50), Err(HalStatus(-50)));
    assert_eq!(HalStatus(-50).code(), -50);
}

#[test]
fn property_value_widens_single_precision() {
    assert_eq!(PropertyValue::F32(0.5).as_f64(), Some(0.5));
    assert_eq!(PropertyValue::U32(2).as_u32(), Some(2));
    assert_eq!(PropertyValue::Text("x".into()).as_text(), Some("x"));
    assert_eq!(PropertyValue::Text("x".into()).as_f64(), None);
}

#[test]
fn subscription_cancels_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let subscription = Subscription::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert!(subscription.is_active());
    subscription.cancel();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn subscription_cancels_on_drop() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    drop(Subscription::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn catalog_keeps_enumeration_order() {
    let hardware = SimulatedHardware::new();
    hardware.connect(SimulatedDevice::built_in("speakers", "Speakers"));
    hardware.connect(SimulatedDevice::bluetooth("buds", "Buds", 44_100.0));
    hardware.connect(SimulatedDevice::bluetooth("phones", "Phones", 48_000.0));

    let devices = catalog(&hardware).list_devices().await.unwrap();
    let uids: Vec<_> = devices.iter().map(|device| device.uid.as_str()).collect();

    assert_eq!(uids, ["speakers", "buds", "phones"]);
    assert_eq!(devices[1].transport, TransportKind::Bluetooth);
    assert_eq!(devices[2].sample_rate_hz, 48_000.0);
}

#[tokio::test]
async fn catalog_skips_duplicate_uids() {
    let hardware = SimulatedHardware::new();
    let first = hardware.connect(SimulatedDevice::bluetooth("buds", "Buds", 48_000.0));
    hardware.connect(SimulatedDevice::bluetooth("buds", "Buds again", 48_000.0));

    let devices = catalog(&hardware).list_devices().await.unwrap();

    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].id, first);
}

#[tokio::test]
async fn catalog_skips_unresolvable_devices() {
    let hardware = SimulatedHardware::new();
    hardware.connect(
        SimulatedDevice::bluetooth("broken", "Broken", 48_000.0)
            .with_unreadable(PropertySelector::NominalSampleRate),
    );
    hardware.connect(SimulatedDevice::bluetooth("buds", "Buds", 48_000.0));

    let devices = catalog(&hardware).list_devices().await.unwrap();

    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].uid.as_str(), "buds");
}

#[tokio::test]
async fn missing_stream_configuration_is_not_output_capable() {
    let hardware = SimulatedHardware::new();
    let handle = hardware.connect(
        SimulatedDevice::bluetooth("buds", "Buds", 48_000.0)
            .with_unreadable(PropertySelector::OutputStreamCount),
    );

    let device = catalog(&hardware).resolve(handle).await.unwrap();

    assert!(!device.is_output_capable);
    assert!(!device.is_compatible());
}

#[tokio::test]
async fn resolve_reports_missing_property() {
    let hardware = SimulatedHardware::new();
    let handle = hardware.connect(
        SimulatedDevice::bluetooth("buds", "Buds", 48_000.0)
            .with_unreadable(PropertySelector::Name),
    );

    let error = catalog(&hardware).resolve(handle).await.unwrap_err();

    assert!(matches!(
        error,
        AudioError::PropertyUnavailable {
            selector: PropertySelector::Name,
            status: HalStatus::UNKNOWN_PROPERTY,
            ..
        }
    ));
}

#[tokio::test]
async fn enumeration_failure_is_a_system_error() {
    let hardware = SimulatedHardware::new();
    hardware.fail(HardwareOperation::EnumerateDevices, HalStatus::UNSPECIFIED);

    let error = catalog(&hardware).list_devices().await.unwrap_err();

    assert!(matches!(error, AudioError::SystemError(_)));
}

#[tokio::test]
async fn finds_default_output_device() {
    let hardware = SimulatedHardware::new();
    hardware.connect(SimulatedDevice::built_in("speakers", "Speakers"));
    hardware.connect(SimulatedDevice::bluetooth("buds", "Buds", 48_000.0));
    hardware.set_default_uid("buds");

    let default = catalog(&hardware).find_default_output_device().await.unwrap();

    assert_eq!(default.uid.as_str(), "buds");
    assert!(catalog(&SimulatedHardware::new())
        .find_default_output_device()
        .await
        .is_none());
}

#[tokio::test]
async fn resolves_by_uid_after_reconnect() {
    let hardware = SimulatedHardware::new();
    let before = hardware.connect(SimulatedDevice::bluetooth("buds", "Buds", 48_000.0));
    hardware.disconnect("buds");
    let after = hardware.connect(SimulatedDevice::bluetooth("buds", "Buds", 48_000.0));

    let device = catalog(&hardware)
        .resolve_device_by_uid(&DeviceUid::new("buds"))
        .await
        .unwrap();

    assert_ne!(before, after);
    assert_eq!(device.id, after);
    assert!(matches!(
        catalog(&hardware)
            .resolve_device_by_uid(&DeviceUid::new("gone"))
            .await,
        Err(AudioError::UidNotFound(uid)) if uid.as_str() == "gone"
    ));
}

#[test]
fn simulated_hardware_debug_summarises_graph() {
    let hardware = SimulatedHardware::new();
    hardware.connect(SimulatedDevice::bluetooth("buds", "Buds", 48_000.0));
    hardware.fail(HardwareOperation::CreateAggregate, HalStatus::UNSPECIFIED);

    let rendered = format!("{hardware:?}");

    assert!(rendered.starts_with("SimulatedHardware"));
    assert!(rendered.contains("devices: 1"));
    assert!(rendered.contains("CreateAggregate"));
}

#[tokio::test]
async fn uid_lookup_reports_enumeration_failure() {
    let hardware = SimulatedHardware::new();
    hardware.connect(SimulatedDevice::bluetooth("buds", "Buds", 48_000.0));
    hardware.fail(HardwareOperation::EnumerateDevices, HalStatus::UNSPECIFIED);

    let result = catalog(&hardware)
        .resolve_device_by_uid(&DeviceUid::new("buds"))
        .await;

    assert!(matches!(result, Err(AudioError::SystemError(_))));
}

#[tokio::test]
async fn simulated_reconnect_notifies_topology_listeners() {
    let hardware = SimulatedHardware::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let subscription = hardware.subscribe_topology(tx).unwrap();

    hardware.connect(SimulatedDevice::bluetooth("buds", "Buds", 48_000.0));
    assert_eq!(rx.recv().await, Some(HardwareNotification::TopologyChanged));

    subscription.cancel();
    assert_eq!(hardware.topology_listener_count(), 0);
}

#[tokio::test]
async fn simulated_volume_write_notifies_property_listeners() {
    let hardware = SimulatedHardware::new();
    let handle = hardware.connect(SimulatedDevice::bluetooth("buds", "Buds", 48_000.0));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _subscription = hardware
        .subscribe_property(handle, PropertySelector::OutputVolume, tx)
        .unwrap();

    hardware
        .set_property(handle, PropertySelector::OutputVolume, PropertyValue::F32(0.4))
        .await
        .unwrap();

    assert_eq!(
        rx.recv().await,
        Some(HardwareNotification::PropertyChanged {
            device: handle,
            selector: PropertySelector::OutputVolume,
        })
    );
    assert_eq!(hardware.volume_of("buds"), Some(0.4));
}

#[tokio::test]
async fn simulated_rejects_non_volume_writes() {
    let hardware = SimulatedHardware::new();
    let handle = hardware.connect(SimulatedDevice::bluetooth("buds", "Buds", 48_000.0));

    let result = hardware
        .set_property(handle, PropertySelector::Name, PropertyValue::Text("x".into()))
        .await;

    assert_eq!(result, Err(HalStatus::NOT_SETTABLE));
}

#[test]
fn layout_builds_devices_in_order() {
    let layout = HardwareLayout::from_toml(
        r#"
default_output = "buds"

[[device]]
uid = "speakers"
name = "Speakers"
transport = "built-in"

[[device]]
uid = "buds"
name = "Buds"
transport = "bluetooth-le"
sample_rate = 44100
volume = 0.6

[[device]]
uid = "mic"
name = "Mic"
transport = "usb"
output = false
"#,
    )
    .unwrap();

    let hardware = layout.build().unwrap();

    assert_eq!(layout.devices.len(), 3);
    assert_eq!(layout.devices[0].sample_rate, 48_000.0);
    assert_eq!(hardware.default_output_uid(), Some(DeviceUid::new("buds")));
    assert_eq!(hardware.volume_of("buds"), Some(0.6));
    assert_eq!(hardware.volume_of("speakers"), None);
    assert!(hardware.is_connected("mic"));
}

#[test]
fn layout_rejects_unknown_transport() {
    let layout = HardwareLayout::from_toml(
        "[[device]]\nuid = \"x\"\nname = \"X\"\ntransport = \"telegraph\"",
    )
    .unwrap();

    assert!(layout.build().is_err());
}

#[tokio::test]
async fn monitor_installs_and_removes_listener() {
    let hardware = SimulatedHardware::new();
    let (tx, _rx) = mpsc::unbounded_channel();

    let mut monitor = HardwareChangeMonitor::subscribe(&hardware, tx).unwrap();
    assert!(monitor.is_subscribed());
    assert_eq!(hardware.topology_listener_count(), 1);

    monitor.shutdown();
    assert!(!monitor.is_subscribed());
    assert_eq!(hardware.topology_listener_count(), 0);
}

#[tokio::test]
async fn monitor_ignores_changes_without_active_sink() {
    let hardware = SimulatedHardware::new();
    hardware.connect(SimulatedDevice::bluetooth("buds", "Buds", 48_000.0));
    let controller =
        AggregateController::new(Arc::new(hardware.clone()), SinkIdentity::default(), false);
    let (tx, _rx) = mpsc::unbounded_channel();
    let monitor = HardwareChangeMonitor::subscribe(&hardware, tx).unwrap();

    let verdict = monitor.check(&controller, &[]).await;

    assert_eq!(verdict, TopologyVerdict::Unaffected);
}

#[tokio::test]
async fn monitor_flags_sink_missing_a_member() {
    let hardware = SimulatedHardware::new();
    hardware.connect(SimulatedDevice::built_in("speakers", "Speakers"));
    hardware.connect(SimulatedDevice::bluetooth("buds", "Buds", 44_100.0));
    hardware.connect(SimulatedDevice::bluetooth("phones", "Phones", 48_000.0));
    let controller =
        AggregateController::new(Arc::new(hardware.clone()), SinkIdentity::default(), false);
    let (tx, _rx) = mpsc::unbounded_channel();
    let monitor = HardwareChangeMonitor::subscribe(&hardware, tx).unwrap();
    controller.setup().await.unwrap();

    let devices = catalog(&hardware).list_devices().await.unwrap();
    assert_eq!(
        monitor.check(&controller, &devices).await,
        TopologyVerdict::Unaffected
    );

    hardware.disconnect("buds");
    let devices = catalog(&hardware).list_devices().await.unwrap();
    assert_eq!(
        monitor.check(&controller, &devices).await,
        TopologyVerdict::SinkInvalidated
    );
}
