//! Color command implementation.

use anyhow::{Context, Result};
use gamalta_core::Color;

use crate::cli::DeviceArgs;
use crate::config::Config;
use crate::util::connect_client;

/// Arguments for the color command.
pub struct ColorArgs {
    pub red: i32,
    pub green: i32,
    pub blue: i32,
    pub cool: i32,
    pub warm: i32,
    pub preview: bool,
}

pub async fn cmd_color(
    device: &DeviceArgs,
    args: ColorArgs,
    quiet: bool,
    config: &Config,
) -> Result<()> {
    // Reject bad channels before touching the radio
    let color = Color::checked(args.red, args.green, args.blue, args.cool, args.warm)
        .context("Invalid colour")?;

    let client = connect_client(device, config, quiet).await?;
    let result = if args.preview {
        client.preview_color(color).await
    } else {
        client.set_color(color).await
    };
    client.disconnect().await.ok();
    result.context("Failed to set colour")?;

    if !quiet {
        println!("Color set to {}", color);
    }
    Ok(())
}
