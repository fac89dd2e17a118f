//! Unit tests for volume levels, the preference store and the synchronizer

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use tempfile::TempDir;
use tokio::sync::{broadcast, mpsc};

use crate::services::audio::{
    catalog::DeviceCatalog,
    device::{AudioDevice, DeviceUid},
    error::AudioError,
    events::{VolumeEvent, VolumeOrigin},
    hardware::{
        HardwareNotification, HardwareOperation, HalStatus, NotificationReceiver,
        PropertySelector, SimulatedDevice, SimulatedHardware,
    },
    volume::{
        DEVICE_VOLUMES_KEY, PreferenceStore, UPDATED_AT_KEY, VolumeCache, VolumeLevel,
        VolumeSynchronizer,
    },
};

struct Fixture {
    hardware: SimulatedHardware,
    synchronizer: VolumeSynchronizer,
    notifications: NotificationReceiver,
    events: broadcast::Receiver<VolumeEvent>,
}

fn fixture(hardware: SimulatedHardware, store: PreferenceStore) -> Fixture {
    let (notification_tx, notifications) = mpsc::unbounded_channel();
    let (events_tx, events) = broadcast::channel(16);
    let synchronizer = VolumeSynchronizer::new(
        Arc::new(hardware.clone()),
        store,
        VolumeLevel::FALLBACK,
        notification_tx,
        events_tx,
    );
    Fixture {
        hardware,
        synchronizer,
        notifications,
        events,
    }
}

async fn devices(hardware: &SimulatedHardware) -> Vec<AudioDevice> {
    DeviceCatalog::new(Arc::new(hardware.clone()))
        .list_devices()
        .await
        .unwrap()
}

#[test]
fn level_clamps_out_of_range_values() {
    assert_eq!(VolumeLevel::new(1.5), VolumeLevel::FULL);
    assert_eq!(VolumeLevel::new(-0.2), VolumeLevel::MUTED);
    assert_eq!(VolumeLevel::new(f32::NAN), VolumeLevel::MUTED);
    assert_eq!(VolumeLevel::new(0.42).get(), 0.42);
    assert_eq!(VolumeLevel::default(), VolumeLevel::FALLBACK);
}

#[test]
fn level_displays_as_percentage() {
    assert_eq!(VolumeLevel::new(0.75).to_string(), "75%");
    assert_eq!(VolumeLevel::new(0.333).percent(), 33);
}

#[test]
fn level_deserializes_with_clamping() {
    let level: VolumeLevel = serde_json::from_str("3.0").unwrap();
    assert_eq!(level, VolumeLevel::FULL);
}

#[test]
fn cache_insert_reports_changes() {
    let mut cache = VolumeCache::default();
    let uid = DeviceUid::new("buds");

    assert!(cache.insert(uid.clone(), VolumeLevel::new(0.5)));
    assert!(!cache.insert(uid.clone(), VolumeLevel::new(0.5)));
    assert!(cache.insert(uid.clone(), VolumeLevel::new(0.6)));
    assert_eq!(cache.get(&uid), Some(VolumeLevel::new(0.6)));
    assert_eq!(cache.len(), 1);
}

#[test]
fn store_missing_file_is_empty() {
    let dir = TempDir::new().unwrap();
    let store = PreferenceStore::at(dir.path().join("preferences.json"));

    assert!(store.load().unwrap().is_empty());
}

#[test]
fn store_round_trips_and_keeps_foreign_keys() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("preferences.json");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, r#"{"other.setting": true}"#).unwrap();
    let store = PreferenceStore::at(&path);

    let cache: VolumeCache = [(DeviceUid::new("buds"), VolumeLevel::new(0.42))]
        .into_iter()
        .collect();
    store.save(&cache).unwrap();

    let document: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(document["other.setting"], true);
    assert!(document[UPDATED_AT_KEY].is_string());
    assert!(document[DEVICE_VOLUMES_KEY]["buds"].is_number());

    let loaded = store.load().unwrap();
    assert_eq!(loaded.get(&DeviceUid::new("buds")), Some(VolumeLevel::new(0.42)));
}

#[test]
fn store_treats_corrupt_file_as_empty() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("preferences.json");
    std::fs::write(&path, "{ not json").unwrap();

    let store = PreferenceStore::at(&path);

    assert!(store.load().unwrap().is_empty());
    store
        .save(&[(DeviceUid::new("a"), VolumeLevel::FULL)].into_iter().collect())
        .unwrap();
    assert_eq!(store.load().unwrap().len(), 1);
}

#[test]
fn ephemeral_store_writes_nothing() {
    let store = PreferenceStore::ephemeral();
    let cache: VolumeCache = [(DeviceUid::new("a"), VolumeLevel::FULL)].into_iter().collect();

    store.save(&cache).unwrap();

    assert!(store.path().is_none());
    assert!(store.load().unwrap().is_empty());
}

#[tokio::test]
async fn refresh_reads_hardware_levels_of_compatible_devices() {
    let hardware = SimulatedHardware::new();
    hardware.connect(SimulatedDevice::built_in("speakers", "Speakers").with_volume(0.1));
    let buds =
        hardware.connect(SimulatedDevice::bluetooth("buds", "Buds", 48_000.0).with_volume(0.6));
    let mut fx = fixture(hardware, PreferenceStore::ephemeral());

    let list = devices(&fx.hardware).await;
    fx.synchronizer.refresh_all(&list).await;

    let levels = fx.synchronizer.levels().get();
    assert_eq!(levels.len(), 1);
    assert_eq!(levels[&buds], VolumeLevel::new(0.6));
    assert_eq!(
        fx.synchronizer.cache().get(&DeviceUid::new("buds")),
        Some(VolumeLevel::new(0.6))
    );
    assert_eq!(fx.hardware.property_listener_count(), 1);
}

#[tokio::test]
async fn unreadable_volume_falls_back_and_is_written_back() {
    let hardware = SimulatedHardware::new();
    let buds = hardware.connect(
        SimulatedDevice::bluetooth("buds", "Buds", 48_000.0)
            .with_volume(0.2)
            .with_unreadable(PropertySelector::OutputVolume),
    );
    let mut fx = fixture(hardware, PreferenceStore::ephemeral());

    let list = devices(&fx.hardware).await;
    fx.synchronizer.refresh_all(&list).await;

    assert_eq!(fx.synchronizer.levels().get()[&buds], VolumeLevel::FALLBACK);
    assert_eq!(fx.hardware.volume_of("buds"), Some(0.75));
}

#[tokio::test]
async fn set_volume_updates_map_cache_and_hardware() {
    let hardware = SimulatedHardware::new();
    let buds = hardware.connect(SimulatedDevice::bluetooth("buds", "Buds", 48_000.0));
    let dir = TempDir::new().unwrap();
    let store = PreferenceStore::at(dir.path().join("preferences.json"));
    let mut fx = fixture(hardware, store.clone());
    let list = devices(&fx.hardware).await;
    fx.synchronizer.refresh_all(&list).await;

    fx.synchronizer
        .set_volume(buds, VolumeLevel::new(0.3))
        .await
        .unwrap();

    assert_eq!(fx.synchronizer.levels().get()[&buds], VolumeLevel::new(0.3));
    assert_eq!(fx.hardware.volume_of("buds"), Some(0.3));
    assert_eq!(
        store.load().unwrap().get(&DeviceUid::new("buds")),
        Some(VolumeLevel::new(0.3))
    );
    match fx.events.recv().await.unwrap() {
        VolumeEvent::LevelChanged { device, origin, .. } => {
            assert_eq!(device, buds);
            assert_eq!(origin, VolumeOrigin::Program);
        }
    }
}

#[tokio::test]
async fn set_volume_keeps_optimistic_level_when_write_fails() {
    let hardware = SimulatedHardware::new();
    let buds =
        hardware.connect(SimulatedDevice::bluetooth("buds", "Buds", 48_000.0).with_volume(0.5));
    let mut fx = fixture(hardware, PreferenceStore::ephemeral());
    let list = devices(&fx.hardware).await;
    fx.synchronizer.refresh_all(&list).await;
    fx.hardware.fail(HardwareOperation::SetVolume, HalStatus::UNSPECIFIED);

    fx.synchronizer
        .set_volume(buds, VolumeLevel::new(0.9))
        .await
        .unwrap();

    assert_eq!(fx.synchronizer.levels().get()[&buds], VolumeLevel::new(0.9));
    assert_eq!(fx.hardware.volume_of("buds"), Some(0.5));
}

#[tokio::test]
async fn set_volume_rejects_untracked_device() {
    let hardware = SimulatedHardware::new();
    let speakers = hardware.connect(SimulatedDevice::built_in("speakers", "Speakers"));
    let mut fx = fixture(hardware, PreferenceStore::ephemeral());
    let list = devices(&fx.hardware).await;
    fx.synchronizer.refresh_all(&list).await;

    let result = fx.synchronizer.set_volume(speakers, VolumeLevel::FULL).await;

    assert!(matches!(result, Err(AudioError::DeviceNotFound(id)) if id == speakers));
}

#[tokio::test]
async fn knob_turn_is_pushed_back_to_map_and_cache() {
    let hardware = SimulatedHardware::new();
    let buds =
        hardware.connect(SimulatedDevice::bluetooth("buds", "Buds", 48_000.0).with_volume(0.5));
    let mut fx = fixture(hardware, PreferenceStore::ephemeral());
    let list = devices(&fx.hardware).await;
    fx.synchronizer.refresh_all(&list).await;

    fx.hardware.turn_knob("buds", 0.8);
    let notification = fx.notifications.recv().await.unwrap();
    assert_eq!(
        notification,
        HardwareNotification::PropertyChanged {
            device: buds,
            selector: PropertySelector::OutputVolume,
        }
    );
    fx.synchronizer.handle_hardware_change(buds).await;

    assert_eq!(fx.synchronizer.levels().get()[&buds], VolumeLevel::new(0.8));
    assert_eq!(
        fx.synchronizer.cache().get(&DeviceUid::new("buds")),
        Some(VolumeLevel::new(0.8))
    );
    match fx.events.recv().await.unwrap() {
        VolumeEvent::LevelChanged { origin, .. } => assert_eq!(origin, VolumeOrigin::Hardware),
    }
}

#[tokio::test]
async fn stale_notifications_converge_on_latest_write() {
    let hardware = SimulatedHardware::new();
    let buds = hardware.connect(SimulatedDevice::bluetooth("buds", "Buds", 48_000.0));
    let mut fx = fixture(hardware, PreferenceStore::ephemeral());
    let list = devices(&fx.hardware).await;
    fx.synchronizer.refresh_all(&list).await;

    fx.synchronizer.set_volume(buds, VolumeLevel::new(0.9)).await.unwrap();
    fx.synchronizer.set_volume(buds, VolumeLevel::new(0.3)).await.unwrap();
    while let Ok(HardwareNotification::PropertyChanged { device, .. }) =
        fx.notifications.try_recv()
    {
        fx.synchronizer.handle_hardware_change(device).await;
    }

    assert_eq!(fx.synchronizer.levels().get()[&buds], VolumeLevel::new(0.3));
    assert_eq!(fx.hardware.volume_of("buds"), Some(0.3));
}

#[tokio::test]
async fn shutdown_cancels_listeners() {
    let hardware = SimulatedHardware::new();
    hardware.connect(SimulatedDevice::bluetooth("a", "A", 48_000.0));
    hardware.connect(SimulatedDevice::bluetooth("b", "B", 48_000.0));
    let mut fx = fixture(hardware, PreferenceStore::ephemeral());
    let list = devices(&fx.hardware).await;
    fx.synchronizer.refresh_all(&list).await;
    assert_eq!(fx.hardware.property_listener_count(), 2);

    fx.synchronizer.shutdown();

    assert_eq!(fx.hardware.property_listener_count(), 0);
}
