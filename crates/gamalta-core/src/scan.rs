//! Device discovery over btleplug.
//!
//! This module provides functionality to scan for Gamalta lights and to
//! locate a specific light by name, address or platform identifier.

use std::time::Duration;

use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use gamalta_types::DeviceDescriptor;

use crate::error::{DeviceNotFoundReason, Error, Result};
use crate::transport::ScanOptions;

/// Number of scan passes made when looking for one light.
const FIND_ATTEMPTS: u32 = 3;

/// Shortest scan pass when looking for one light.
const MIN_FIND_SCAN: Duration = Duration::from_secs(2);

/// Address reported by CoreBluetooth in place of the real one.
const HIDDEN_ADDRESS: &str = "00:00:00:00:00:00";

/// Get the first available Bluetooth adapter.
pub async fn get_adapter() -> Result<Adapter> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;

    adapters
        .into_iter()
        .next()
        .ok_or(Error::DeviceNotFound(DeviceNotFoundReason::NoAdapter))
}

/// Scan for lights with the default options.
pub async fn scan_for_devices() -> Result<Vec<DeviceDescriptor>> {
    scan_with_options(&ScanOptions::default()).await
}

/// Scan for lights with custom options.
pub async fn scan_with_options(options: &ScanOptions) -> Result<Vec<DeviceDescriptor>> {
    let adapter = get_adapter().await?;
    scan_with_adapter(&adapter, options).await
}

/// Scan using a specific adapter.
pub async fn scan_with_adapter(
    adapter: &Adapter,
    options: &ScanOptions,
) -> Result<Vec<DeviceDescriptor>> {
    info!(
        "Starting BLE scan for {} seconds...",
        options.duration.as_secs()
    );

    adapter.start_scan(ScanFilter::default()).await?;
    sleep(options.duration).await;
    adapter.stop_scan().await?;

    let peripherals = adapter.peripherals().await?;
    let mut discovered = Vec::new();

    for peripheral in peripherals {
        match describe_peripheral(&peripheral).await {
            Ok(Some(device)) if options.matches(device.name.as_deref()) => {
                info!("Found light: {:?}", device.name);
                discovered.push(device);
            }
            Ok(_) => {}
            Err(e) => {
                debug!("Error processing peripheral: {}", e);
            }
        }
    }

    // Strongest signal first
    discovered.sort_by_key(|d| std::cmp::Reverse(d.rssi.unwrap_or(i16::MIN)));

    info!("Scan complete. Found {} light(s)", discovered.len());
    Ok(discovered)
}

async fn describe_peripheral(peripheral: &Peripheral) -> Result<Option<DeviceDescriptor>> {
    let Some(properties) = peripheral.properties().await? else {
        return Ok(None);
    };

    let address = properties.address.to_string();
    Ok(Some(DeviceDescriptor {
        name: properties.local_name,
        identifier: create_identifier(&address, &peripheral.id()),
        address,
        rssi: properties.rssi,
    }))
}

/// Find a light by name, address or identifier.
///
/// Peripherals already known to the adapter are checked first. Otherwise up
/// to three scans are made, each longer than the last, since advertisements
/// are easily missed.
pub async fn find_device(identifier: &str, options: &ScanOptions) -> Result<(Adapter, Peripheral)> {
    let adapter = get_adapter().await?;
    let identifier_lower = identifier.to_lowercase();

    info!("Looking for device: {}", identifier);

    if let Some(peripheral) = find_peripheral_by_identifier(&adapter, &identifier_lower).await? {
        info!("Found device in cache (no scan needed)");
        return Ok((adapter, peripheral));
    }

    let base_duration = (options.duration / 2).max(MIN_FIND_SCAN);

    for attempt in 1..=FIND_ATTEMPTS {
        let scan_duration = base_duration * attempt;
        info!(
            "Scan attempt {}/{} ({}s)...",
            attempt,
            FIND_ATTEMPTS,
            scan_duration.as_secs()
        );

        adapter.start_scan(ScanFilter::default()).await?;
        sleep(scan_duration).await;
        adapter.stop_scan().await?;

        if let Some(peripheral) =
            find_peripheral_by_identifier(&adapter, &identifier_lower).await?
        {
            info!("Found device on attempt {}", attempt);
            return Ok((adapter, peripheral));
        }

        if attempt < FIND_ATTEMPTS {
            warn!("Device not found, retrying...");
        }
    }

    warn!(
        "Device not found after {} attempts: {}",
        FIND_ATTEMPTS, identifier
    );
    Err(Error::device_not_found(identifier))
}

async fn find_peripheral_by_identifier(
    adapter: &Adapter,
    identifier_lower: &str,
) -> Result<Option<Peripheral>> {
    let peripherals = adapter.peripherals().await?;

    for peripheral in peripherals {
        let Ok(Some(props)) = peripheral.properties().await else {
            continue;
        };
        let address = props.address.to_string().to_lowercase();
        let peripheral_id = format_peripheral_id(&peripheral.id()).to_lowercase();

        // macOS hands out UUIDs
        if peripheral_id.contains(identifier_lower) {
            debug!("Matched by peripheral ID: {}", peripheral_id);
            return Ok(Some(peripheral));
        }

        if address != HIDDEN_ADDRESS
            && (address == identifier_lower
                || address.replace(':', "") == identifier_lower.replace(':', ""))
        {
            debug!("Matched by address: {}", address);
            return Ok(Some(peripheral));
        }

        if let Some(name) = &props.local_name
            && name.to_lowercase().contains(identifier_lower)
        {
            debug!("Matched by name: {}", name);
            return Ok(Some(peripheral));
        }
    }

    Ok(None)
}

/// Format a peripheral ID as a plain string.
pub(crate) fn format_peripheral_id(id: &PeripheralId) -> String {
    format!("{:?}", id)
        .trim_start_matches("PeripheralId(")
        .trim_end_matches(')')
        .to_string()
}

/// Pick the identifier to reconnect with: the address, or the peripheral ID
/// where the platform hides addresses.
pub(crate) fn create_identifier(address: &str, peripheral_id: &PeripheralId) -> String {
    if address == HIDDEN_ADDRESS {
        format_peripheral_id(peripheral_id)
    } else {
        address.to_string()
    }
}
