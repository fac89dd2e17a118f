//! Sharing lifecycle: state machine, coordinator task and service handle

mod coordinator;
mod service;
mod state;
mod status;

#[cfg(test)]
mod tests;

pub use service::SharingService;
pub use state::{Action, SharingState, Transition, Trigger};
pub use status::SharingStatus;
