//! Scan command implementation.

use anyhow::{Context, Result};
use gamalta_core::{DeviceDescriptor, ScanOptions, scan};

use crate::cli::OutputFormat;
use crate::config::Config;
use crate::util::print_json;

pub async fn cmd_scan(
    timeout: u64,
    all: bool,
    format: OutputFormat,
    quiet: bool,
    config: &Config,
) -> Result<()> {
    if !quiet && format == OutputFormat::Text {
        eprintln!("Scanning for {}s...", timeout);
    }

    let mut options = ScanOptions::default().duration_secs(timeout);
    if all {
        options = options.all_devices();
    }

    let devices = scan::scan_with_options(&options)
        .await
        .context("Failed to scan for devices")?;

    match format {
        OutputFormat::Json => print_json(&devices)?,
        OutputFormat::Text => print!("{}", format_scan_text(&devices, config)),
    }
    Ok(())
}

fn format_scan_text(devices: &[DeviceDescriptor], config: &Config) -> String {
    if devices.is_empty() {
        return "No Gamalta lights found.\n".to_string();
    }

    let mut out = format!("Found {} light(s):\n", devices.len());
    for device in devices {
        let name = device.name.as_deref().unwrap_or("Unknown");
        let rssi = device
            .rssi
            .map(|r| format!("{} dBm", r))
            .unwrap_or_else(|| "-".to_string());
        let alias = config
            .aliases
            .iter()
            .find(|(_, address)| address.eq_ignore_ascii_case(&device.identifier))
            .map(|(alias, _)| format!(" [{}]", alias))
            .unwrap_or_default();
        out.push_str(&format!(
            "  {:<20} {:<40} {:>8}{}\n",
            name, device.identifier, rssi, alias
        ));
    }
    out
}
