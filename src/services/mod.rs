/// Audio output sharing engine
pub mod audio;
/// Building blocks shared by services
pub mod common;

pub use audio::{SharingService, SharingState};
