//! Formatting utilities for CLI output.
//!
//! Device tables, volume maps and styled headers share these helpers so
//! every command prints the same way.

use std::fmt::Write;

use crate::services::audio::{AudioDevice, DeviceHandle, SharedDevicePair, VolumeMap};

/// ANSI color codes for terminal output
pub struct Colors;

impl Colors {
    /// Reset all formatting
    pub const RESET: &'static str = "\x1b[0m";
    /// Bold text
    pub const BOLD: &'static str = "\x1b[1m";
    /// Dim text
    pub const DIM: &'static str = "\x1b[2m";

    /// Red color
    pub const RED: &'static str = "\x1b[31m";
    /// Green color
    pub const GREEN: &'static str = "\x1b[32m";
    /// Yellow color
    pub const YELLOW: &'static str = "\x1b[33m";
    /// Cyan color
    pub const CYAN: &'static str = "\x1b[36m";
}

/// Formats section headers with styling
pub fn format_header(text: &str) -> String {
    format!("{}{}{}{}", Colors::BOLD, Colors::CYAN, text, Colors::RESET)
}

/// Formats secondary details with muted styling
pub fn format_description(text: &str) -> String {
    format!("{}{}{}", Colors::DIM, text, Colors::RESET)
}

/// Formats success messages with green styling
pub fn format_success(text: &str) -> String {
    format!("{}{}{}{}", Colors::BOLD, Colors::GREEN, text, Colors::RESET)
}

/// Formats warnings with yellow styling
pub fn format_warning(text: &str) -> String {
    format!("{}{}{}", Colors::YELLOW, text, Colors::RESET)
}

/// Formats error messages with red styling
pub fn format_error(text: &str) -> String {
    format!("{}{}{}{}", Colors::BOLD, Colors::RED, text, Colors::RESET)
}

/// Markers shown after a device row
///
/// Returns `compatible` and `default` tags separated by a space, or an
/// empty string when neither applies.
pub fn device_markers(device: &AudioDevice, default: Option<DeviceHandle>) -> String {
    let mut markers = Vec::new();
    if device.is_compatible() {
        markers.push("compatible");
    }
    if default == Some(device.id) {
        markers.push("default");
    }
    markers.join(" ")
}

/// Renders a fixed-width device table
///
/// Columns are id, transport, sample rate, output capability and name,
/// followed by the markers from [`device_markers`].
pub fn format_device_table(devices: &[AudioDevice], default: Option<DeviceHandle>) -> String {
    let mut output = format!(
        "{:<5} {:<13} {:>8} {:<7} {}\n",
        "ID", "Transport", "Rate", "Output", "Name"
    );
    output.push_str(&"-".repeat(70));
    output.push('\n');

    for device in devices {
        let markers = device_markers(device, default);
        let _ = write!(
            output,
            "{:<5} {:<13} {:>8} {:<7} {}",
            device.id.0,
            device.transport.label(),
            device.sample_rate_hz,
            if device.is_output_capable { "yes" } else { "no" },
            device.name,
        );
        if !markers.is_empty() {
            let _ = write!(output, " {}", format_description(&format!("[{markers}]")));
        }
        output.push('\n');
    }
    output
}

/// Renders the master and second device of an active sink
pub fn format_pair(pair: &SharedDevicePair) -> String {
    format!(
        "{} {} ({} Hz)\n{} {} ({} Hz)",
        format_header("Master:"),
        pair.master.name,
        pair.master.sample_rate_hz,
        format_header("Second:"),
        pair.second.name,
        pair.second.sample_rate_hz,
    )
}

/// Renders one line per device level, named where the device is known
pub fn format_volume_map(volumes: &VolumeMap, devices: &[AudioDevice]) -> String {
    if volumes.is_empty() {
        return format_description("No compatible devices");
    }

    volumes
        .iter()
        .map(|(handle, level)| {
            let name = devices
                .iter()
                .find(|device| device.id == *handle)
                .map_or("unknown device", |device| device.name.as_str());
            format!("{:<5} {:>5}  {name}", handle.0, level.to_string())
        })
        .collect::<Vec<_>>()
        .join("\n")
}
