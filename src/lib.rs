//! Tandem - play one audio stream on two Bluetooth devices at once.
//!
//! Tandem discovers physical output endpoints, combines two compatible
//! ones into a virtual multi-output sink, keeps that sink valid while
//! hardware comes and goes, and keeps per-device volume in sync with the
//! hardware and a persistent cache.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use tandem::{
//!     config::Config,
//!     services::audio::{SharingService, SimulatedDevice, SimulatedHardware},
//! };
//!
//! # async fn run() -> tandem::Result<()> {
//! let hardware = SimulatedHardware::new();
//! hardware.connect(SimulatedDevice::bluetooth("buds", "Buds", 48_000.0));
//! hardware.connect(SimulatedDevice::bluetooth("phones", "Phones", 44_100.0));
//!
//! let service = SharingService::start(Arc::new(hardware), &Config::default()).await?;
//! service.start_sharing().await?;
//! println!("{}", service.status().await?);
//! service.shutdown().await?;
//! # Ok(())
//! # }
//! ```

/// Configuration schema, loading and file locations.
pub mod config;

/// Core error types and result aliases.
pub mod core;

/// Command-line interface.
pub mod cli;

/// Audio sharing services.
pub mod services;

/// Logging initialisation.
pub mod tracing_config;

/// Re-exported core types for convenience.
pub use core::{Result, TandemError};
