//! Utility functions for CLI operations.

use std::time::Duration;

use anyhow::{Context, Result};
use gamalta_core::{BleTransport, Client, ConnectionConfig};
use serde::Serialize;

use crate::cli::{DEFAULT_TIMEOUT_SECS, DeviceArgs};
use crate::config::{Config, resolve_device, resolve_timeout, update_last_device};

/// Connect to the requested light and run the handshake.
///
/// Without a device from the arguments, environment or config file, the
/// strongest light in range is used.
pub async fn connect_client(args: &DeviceArgs, config: &Config, quiet: bool) -> Result<Client> {
    let identifier = resolve_device(args.device.clone(), config);
    let timeout = resolve_timeout(args.timeout, config, DEFAULT_TIMEOUT_SECS);

    let transport = BleTransport::with_config(
        ConnectionConfig::default().connection_timeout(Duration::from_secs(timeout)),
    );
    let client = Client::with_config(transport, config.session_config()?)
        .context("Failed to create session")?;

    if !quiet {
        match &identifier {
            Some(id) => eprintln!("Connecting to {}...", id),
            None => eprintln!("No device specified. Connecting to the strongest light in range..."),
        }
    }

    let device = client
        .connect(identifier.as_deref())
        .await
        .with_context(|| match &identifier {
            Some(id) => format!("Failed to connect to {}", id),
            None => "Failed to connect to a Gamalta light".to_string(),
        })?;

    if let Err(e) = update_last_device(&device.identifier, device.name.as_deref()) {
        tracing::debug!("Could not remember last device: {}", e);
    }
    Ok(client)
}

/// Print a serializable value as pretty JSON.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", content);
    Ok(())
}
