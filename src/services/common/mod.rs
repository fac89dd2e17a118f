//! Common utilities and abstractions for services

/// Read-only reactive values
pub mod property;

pub use property::Property;
