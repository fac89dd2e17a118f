use std::sync::Arc;

use crate::{
    cli::{
        CliError, CommandResult,
        formatting::{format_header, format_volume_map},
    },
    config::Config,
    services::audio::{AudioHardware, DeviceHandle, SharingService},
};

/// Sets one device level and prints the resulting volume map
pub(super) async fn set(
    hardware: Arc<dyn AudioHardware>,
    config: &Config,
    device: u32,
    level: f32,
) -> CommandResult {
    if !(0.0..=1.0).contains(&level) {
        return Err(CliError::InvalidArgument {
            arg: "level",
            reason: "must be between 0.0 and 1.0".to_string(),
        });
    }

    let service = SharingService::start(hardware, config).await?;
    let result = service.set_volume(DeviceHandle(device), level).await;
    let status = service.status().await;
    service.shutdown().await?;
    result?;
    let status = status?;

    Ok(format!(
        "{}\n{}",
        format_header("Volumes:"),
        format_volume_map(&status.volumes, &status.devices)
    ))
}
