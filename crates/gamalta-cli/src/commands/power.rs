//! Power command implementation.

use anyhow::{Context, Result};

use crate::cli::{DeviceArgs, PowerState};
use crate::config::Config;
use crate::util::connect_client;

pub async fn cmd_power(
    device: &DeviceArgs,
    state: PowerState,
    quiet: bool,
    config: &Config,
) -> Result<()> {
    let client = connect_client(device, config, quiet).await?;

    let result = match state {
        PowerState::On => client.power_on().await,
        PowerState::Off => client.power_off().await,
    };
    client.disconnect().await.ok();
    result.context("Failed to switch power")?;

    if !quiet {
        println!(
            "Power {}",
            match state {
                PowerState::On => "on",
                PowerState::Off => "off",
            }
        );
    }
    Ok(())
}
