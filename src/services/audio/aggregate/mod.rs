//! Aggregate sink construction and teardown

mod controller;
mod descriptor;
mod restore;


pub use controller::AggregateController;
pub use descriptor::{
    AGGREGATE_DEVICE_MASTER_KEY, AGGREGATE_DEVICE_NAME_KEY, AGGREGATE_DEVICE_STACKED_KEY,
    AGGREGATE_DEVICE_SUB_DEVICE_LIST_KEY, AGGREGATE_DEVICE_UID_KEY, AggregateSinkDescriptor,
    SUB_DEVICE_DRIFT_COMPENSATION_KEY, SUB_DEVICE_UID_KEY, SharedDevicePair, SinkIdentity,
    SubDevice,
};
pub use restore::{RestorePolicy, RestoreReason, RestoreTarget};
