//! Brightness command implementation.

use anyhow::{Context, Result};

use crate::cli::DeviceArgs;
use crate::config::Config;
use crate::util::connect_client;

pub async fn cmd_brightness(
    device: &DeviceArgs,
    percent: u8,
    quiet: bool,
    config: &Config,
) -> Result<()> {
    let client = connect_client(device, config, quiet).await?;
    let result = client.set_brightness(percent).await;
    client.disconnect().await.ok();
    result.context("Failed to set brightness")?;

    if !quiet {
        println!("Brightness set to {}%", percent);
    }
    Ok(())
}
