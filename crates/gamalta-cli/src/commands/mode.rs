//! Mode command implementation.

use anyhow::{Context, Result};
use gamalta_core::Mode;

use crate::cli::DeviceArgs;
use crate::config::Config;
use crate::util::connect_client;

pub async fn cmd_mode(device: &DeviceArgs, mode: Mode, quiet: bool, config: &Config) -> Result<()> {
    let client = connect_client(device, config, quiet).await?;
    let result = client.set_mode(mode).await;
    client.disconnect().await.ok();
    result.with_context(|| format!("Failed to select mode {}", mode))?;

    if !quiet {
        println!("Mode set to {}", mode);
    }
    Ok(())
}
