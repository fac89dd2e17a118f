mod devices;
mod schema;
mod share;
mod volume;

use std::{fs, path::Path, sync::Arc};

use tracing::{debug, instrument};

use super::{CliError, Commands, CommandResult, ConfigCommand};
use crate::{
    config::Config,
    services::audio::{HardwareLayout, SimulatedHardware},
};

/// Runs a parsed command and returns the text to print
///
/// `hardware` is only consulted by commands that talk to audio devices.
///
/// # Errors
/// Returns error if the command fails or needs a hardware layout that was
/// not provided
pub async fn execute(
    command: &Commands,
    config: &Config,
    hardware: Option<SimulatedHardware>,
) -> CommandResult {
    match command {
        Commands::Config {
            command: ConfigCommand::Schema,
        } => schema::print(),
        Commands::Devices => devices::list(require(hardware)?).await,
        Commands::Share => share::run(Arc::new(require(hardware)?), config).await,
        Commands::Volume { device, level } => {
            volume::set(Arc::new(require(hardware)?), config, *device, *level).await
        }
    }
}

/// Loads a TOML device layout and materialises it
///
/// # Errors
/// Returns `CliError::Layout` if the file cannot be read or describes an
/// unknown transport
#[instrument]
pub fn load_hardware(path: &Path) -> Result<SimulatedHardware, CliError> {
    let text = fs::read_to_string(path)
        .map_err(|e| CliError::Layout(format!("{}: {e}", path.display())))?;
    let layout = HardwareLayout::from_toml(&text)
        .map_err(|e| CliError::Layout(format!("{}: {e}", path.display())))?;
    debug!("Loaded {} simulated devices", layout.devices.len());
    layout
        .build()
        .map_err(|e| CliError::Layout(e.to_string()))
}

fn require(hardware: Option<SimulatedHardware>) -> Result<SimulatedHardware, CliError> {
    hardware.ok_or_else(|| CliError::InvalidArgument {
        arg: "--hardware",
        reason: "a device layout is required for this command".to_string(),
    })
}
