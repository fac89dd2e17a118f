//! Unit tests for the sharing lifecycle
//!
//! Covers the transition table and the coordinator's handling of
//! overlapping requests, driven through the service handle.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio::{sync::Notify, time::timeout};

use crate::{
    config::Config,
    services::audio::{
        aggregate::AggregateSinkDescriptor,
        error::AudioError,
        events::SharingEvent,
        hardware::{
            AudioHardware, DeviceHandle, HalStatus, HardwareOperation, NotificationSender,
            PropertySelector, PropertyValue, SimulatedDevice, SimulatedHardware, Subscription,
        },
        sharing::{Action, SharingService, SharingState, Transition, Trigger},
        volume::PreferenceStore,
    },
};

const WAIT: Duration = Duration::from_secs(5);

const STATES: [SharingState; 4] = [
    SharingState::Inactive,
    SharingState::Starting,
    SharingState::Active,
    SharingState::Stopping,
];

/// Simulated hardware whose aggregate creation blocks until released
#[derive(Clone)]
struct GatedHardware {
    inner: SimulatedHardware,
    gate: Arc<Notify>,
}

impl GatedHardware {
    fn new(inner: SimulatedHardware) -> Self {
        Self {
            inner,
            gate: Arc::new(Notify::new()),
        }
    }

    fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl AudioHardware for GatedHardware {
    async fn device_handles(&self) -> Result<Vec<DeviceHandle>, HalStatus> {
        self.inner.device_handles().await
    }

    async fn property(
        &self,
        device: DeviceHandle,
        selector: PropertySelector,
    ) -> Result<PropertyValue, HalStatus> {
        self.inner.property(device, selector).await
    }

    async fn set_property(
        &self,
        device: DeviceHandle,
        selector: PropertySelector,
        value: PropertyValue,
    ) -> Result<(), HalStatus> {
        self.inner.set_property(device, selector, value).await
    }

    async fn create_aggregate_device(
        &self,
        descriptor: &AggregateSinkDescriptor,
    ) -> Result<DeviceHandle, HalStatus> {
        self.gate.notified().await;
        self.inner.create_aggregate_device(descriptor).await
    }

    async fn destroy_aggregate_device(&self, device: DeviceHandle) -> Result<(), HalStatus> {
        self.inner.destroy_aggregate_device(device).await
    }

    async fn default_output_device(&self) -> Result<DeviceHandle, HalStatus> {
        self.inner.default_output_device().await
    }

    async fn set_default_output_device(&self, device: DeviceHandle) -> Result<(), HalStatus> {
        self.inner.set_default_output_device(device).await
    }

    fn subscribe_topology(&self, sink: NotificationSender) -> Result<Subscription, HalStatus> {
        self.inner.subscribe_topology(sink)
    }

    fn subscribe_property(
        &self,
        device: DeviceHandle,
        selector: PropertySelector,
        sink: NotificationSender,
    ) -> Result<Subscription, HalStatus> {
        self.inner.subscribe_property(device, selector, sink)
    }
}

fn two_headsets() -> SimulatedHardware {
    let hardware = SimulatedHardware::new();
    hardware.connect(SimulatedDevice::built_in("speakers", "Speakers"));
    hardware.connect(SimulatedDevice::bluetooth("buds-44", "Buds", 44_100.0));
    hardware.connect(SimulatedDevice::bluetooth("phones-48", "Phones", 48_000.0));
    hardware
}

async fn service_on(hardware: impl AudioHardware) -> SharingService {
    SharingService::start_with_store(
        Arc::new(hardware),
        &Config::default(),
        PreferenceStore::ephemeral(),
    )
    .await
    .unwrap()
}

async fn wait_for_state(service: &SharingService, wanted: SharingState) {
    let states = service.watch_state();
    futures::pin_mut!(states);
    timeout(WAIT, async {
        while let Some(state) = states.next().await {
            if state == wanted {
                return;
            }
        }
        panic!("state stream ended before reaching {wanted}");
    })
    .await
    .unwrap();
}

async fn next_states(
    events: impl Stream<Item = SharingEvent>,
    count: usize,
) -> Vec<SharingState> {
    let states = events
        .filter_map(|event| async move {
            match event {
                SharingEvent::StateChanged(state) => Some(state),
                _ => None,
            }
        })
        .take(count)
        .collect::<Vec<_>>();
    timeout(WAIT, states).await.unwrap()
}

#[test]
fn legal_transitions_move_and_run_actions() {
    use SharingState::*;

    assert_eq!(
        Inactive.on(Trigger::StartRequested),
        Transition::Move {
            to: Starting,
            action: Some(Action::Setup)
        }
    );
    assert_eq!(
        Starting.on(Trigger::SetupSucceeded),
        Transition::Move {
            to: Active,
            action: None
        }
    );
    assert_eq!(
        Starting.on(Trigger::SetupFailed),
        Transition::Move {
            to: Inactive,
            action: None
        }
    );
    for trigger in [Trigger::StopRequested, Trigger::ForcedInvalidation] {
        assert_eq!(
            Active.on(trigger),
            Transition::Move {
                to: Stopping,
                action: Some(Action::Teardown)
            }
        );
    }
    assert_eq!(
        Stopping.on(Trigger::TeardownComplete),
        Transition::Move {
            to: Inactive,
            action: None
        }
    );
}

#[test]
fn exactly_six_pairs_move_state() {
    let moves = STATES
        .iter()
        .flat_map(|state| Trigger::ALL.iter().map(move |trigger| state.on(*trigger)))
        .filter(|transition| matches!(transition, Transition::Move { .. }))
        .count();

    assert_eq!(moves, 6);
}

#[test]
fn overlapping_requests_resolve_without_moving() {
    use SharingState::*;

    assert_eq!(Starting.on(Trigger::StartRequested), Transition::Busy);
    assert_eq!(Stopping.on(Trigger::StartRequested), Transition::Busy);
    assert_eq!(Starting.on(Trigger::StopRequested), Transition::Defer);
    assert_eq!(Starting.on(Trigger::ForcedInvalidation), Transition::Defer);
    assert_eq!(Inactive.on(Trigger::StopRequested), Transition::Ignore);
    assert_eq!(Stopping.on(Trigger::StopRequested), Transition::Ignore);
    assert_eq!(Inactive.on(Trigger::ForcedInvalidation), Transition::Ignore);
}

#[test]
fn stray_completions_are_invalid() {
    use SharingState::*;

    assert_eq!(Active.on(Trigger::StartRequested), Transition::Invalid);
    assert_eq!(Inactive.on(Trigger::SetupSucceeded), Transition::Invalid);
    assert_eq!(Active.on(Trigger::SetupFailed), Transition::Invalid);
    assert_eq!(Inactive.on(Trigger::TeardownComplete), Transition::Invalid);
    assert_eq!(Starting.on(Trigger::TeardownComplete), Transition::Invalid);
    assert_eq!(Stopping.on(Trigger::SetupSucceeded), Transition::Invalid);
}

#[test]
fn transitional_states() {
    assert!(!SharingState::Inactive.is_transitional());
    assert!(SharingState::Starting.is_transitional());
    assert!(!SharingState::Active.is_transitional());
    assert!(SharingState::Stopping.is_transitional());
    assert_eq!(SharingState::default(), SharingState::Inactive);
    assert_eq!(SharingState::Stopping.to_string(), "stopping");
}

#[tokio::test]
async fn start_and_stop_walk_through_every_state() {
    let hardware = two_headsets();
    let service = service_on(hardware.clone()).await;
    let events = service.events();

    service.start_sharing().await.unwrap();
    assert_eq!(service.state(), SharingState::Active);
    service.stop_sharing().await.unwrap();
    assert_eq!(service.state(), SharingState::Inactive);

    let states = next_states(events, 4).await;
    assert_eq!(
        states,
        [
            SharingState::Starting,
            SharingState::Active,
            SharingState::Stopping,
            SharingState::Inactive
        ]
    );
    assert_eq!(hardware.aggregate_count(), 0);
    service.shutdown().await.unwrap();
}

#[tokio::test]
async fn status_reports_pair_only_while_active() {
    let service = service_on(two_headsets()).await;

    assert!(service.status().await.unwrap().pair.is_none());

    service.start_sharing().await.unwrap();
    let status = service.status().await.unwrap();
    let pair = status.pair.unwrap();
    assert_eq!(status.state, SharingState::Active);
    assert_eq!(pair.master.uid.as_str(), "phones-48");
    assert_eq!(pair.second.uid.as_str(), "buds-44");

    service.stop_sharing().await.unwrap();
    assert!(service.status().await.unwrap().pair.is_none());
    service.shutdown().await.unwrap();
}

#[tokio::test]
async fn second_start_during_setup_is_rejected() {
    let hardware = GatedHardware::new(two_headsets());
    let service = service_on(hardware.clone()).await;

    let first = tokio::spawn({
        let service = service.clone();
        async move { service.start_sharing().await }
    });
    wait_for_state(&service, SharingState::Starting).await;

    let second = service.start_sharing().await;
    assert!(matches!(second, Err(AudioError::OperationInProgress)));

    hardware.release();
    first.await.unwrap().unwrap();
    assert_eq!(service.state(), SharingState::Active);
    service.shutdown().await.unwrap();
}

#[tokio::test]
async fn stop_during_setup_tears_down_afterwards() {
    let simulated = two_headsets();
    let hardware = GatedHardware::new(simulated.clone());
    let service = service_on(hardware.clone()).await;

    let start = tokio::spawn({
        let service = service.clone();
        async move { service.start_sharing().await }
    });
    wait_for_state(&service, SharingState::Starting).await;

    let stop = tokio::spawn({
        let service = service.clone();
        async move { service.stop_sharing().await }
    });
    tokio::task::yield_now().await;
    hardware.release();

    start.await.unwrap().unwrap();
    stop.await.unwrap().unwrap();
    assert_eq!(service.state(), SharingState::Inactive);
    assert_eq!(simulated.aggregate_count(), 0);
    service.shutdown().await.unwrap();
}

#[tokio::test]
async fn stop_while_inactive_succeeds() {
    let service = service_on(two_headsets()).await;

    service.stop_sharing().await.unwrap();
    service.stop_sharing().await.unwrap();

    assert_eq!(service.state(), SharingState::Inactive);
    service.shutdown().await.unwrap();
}

#[tokio::test]
async fn failed_setup_returns_to_inactive_with_event() {
    let hardware = two_headsets();
    hardware.fail(HardwareOperation::CreateAggregate, HalStatus(-50));
    let service = service_on(hardware.clone()).await;
    let events = service.events();
    futures::pin_mut!(events);

    let result = service.start_sharing().await;

    assert!(matches!(
        result,
        Err(AudioError::OperationFailed {
            status: HalStatus(-50),
            ..
        })
    ));
    assert_eq!(service.state(), SharingState::Inactive);

    let failure = timeout(WAIT, async {
        while let Some(event) = events.next().await {
            if let SharingEvent::OperationFailed { message } = event {
                return message;
            }
        }
        panic!("event stream ended");
    })
    .await
    .unwrap();
    assert!(failure.contains("-50"));
    service.shutdown().await.unwrap();
}

#[tokio::test]
async fn start_after_active_is_a_no_op() {
    let hardware = two_headsets();
    let service = service_on(hardware.clone()).await;

    service.start_sharing().await.unwrap();
    service.start_sharing().await.unwrap();

    assert_eq!(service.state(), SharingState::Active);
    assert_eq!(hardware.aggregate_count(), 1);
    service.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutdown_while_active_restores_default() {
    let hardware = two_headsets();
    let service = service_on(hardware.clone()).await;
    service.start_sharing().await.unwrap();
    let handle = service.clone();

    service.shutdown().await.unwrap();

    assert_eq!(hardware.aggregate_count(), 0);
    assert_eq!(hardware.topology_listener_count(), 0);
    assert_eq!(hardware.property_listener_count(), 0);
    assert!(hardware.default_output_uid().is_some());
    assert!(matches!(
        handle.start_sharing().await,
        Err(AudioError::ServiceUnavailable)
    ));
}
