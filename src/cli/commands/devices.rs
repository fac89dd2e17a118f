use std::sync::Arc;

use crate::{
    cli::{
        CommandResult,
        formatting::{format_description, format_device_table, format_header},
    },
    services::audio::{AudioHardware, DeviceCatalog, SimulatedHardware},
};

/// Lists every catalogued endpoint, marking compatible ones and the default output
pub(super) async fn list(hardware: SimulatedHardware) -> CommandResult {
    let hardware: Arc<dyn AudioHardware> = Arc::new(hardware);
    let catalog = DeviceCatalog::new(hardware);
    let devices = catalog.list_devices().await?;

    if devices.is_empty() {
        return Ok(format_description("No audio devices found"));
    }

    let default = catalog
        .find_default_output_device()
        .await
        .map(|device| device.id);
    let compatible = devices.iter().filter(|device| device.is_compatible()).count();

    let mut output = format_header(&format!("Found {} audio device(s):", devices.len()));
    output.push_str("\n\n");
    output.push_str(&format_device_table(&devices, default));
    output.push_str(&format!("\n{compatible} compatible for sharing"));
    Ok(output)
}
