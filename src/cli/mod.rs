//! Command-line interface for the sharing engine.
//!
//! Every command runs against a simulated device layout loaded from TOML,
//! since no native platform backend ships with this crate.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
pub mod formatting;
mod types;

pub use commands::{execute, load_hardware};
pub use types::{CliError, CommandResult};

/// Share one audio stream across two Bluetooth outputs
#[derive(Parser, Debug)]
#[command(name = "tandem", version)]
#[command(about = "Share one audio stream across two Bluetooth outputs")]
pub struct Cli {
    /// Device layout to simulate (TOML)
    #[arg(long, global = true, value_name = "LAYOUT")]
    pub hardware: Option<PathBuf>,

    /// Configuration file, defaults to the per-user config location
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List every audio endpoint with diagnostics
    Devices,
    /// Share audio until interrupted with Ctrl-C
    Share,
    /// Set the volume of a compatible device
    Volume {
        /// Device id as shown by `devices`
        device: u32,
        /// Level between 0.0 and 1.0
        level: f32,
    },
    /// Configuration helpers
    Config {
        /// Configuration subcommand
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// `config` subcommands
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Print the configuration JSON schema
    Schema,
}

impl Commands {
    /// Whether the command talks to audio hardware
    pub fn needs_hardware(&self) -> bool {
        !matches!(self, Commands::Config { .. })
    }
}
