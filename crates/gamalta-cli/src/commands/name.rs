//! Name command implementation.

use anyhow::{Context, Result};
use serde_json::json;

use crate::cli::{DeviceArgs, OutputFormat};
use crate::config::Config;
use crate::util::{connect_client, print_json};

pub async fn cmd_name(
    device: &DeviceArgs,
    new_name: Option<String>,
    format: OutputFormat,
    quiet: bool,
    config: &Config,
) -> Result<()> {
    let client = connect_client(device, config, quiet).await?;

    let result = match &new_name {
        Some(name) => client
            .set_name(name)
            .await
            .map(|()| name.clone())
            .context("Failed to rename device"),
        None => client
            .query_name()
            .await
            .context("Failed to read device name"),
    };
    client.disconnect().await.ok();
    let name = result?;

    match format {
        OutputFormat::Json => print_json(&json!({ "name": name }))?,
        OutputFormat::Text if new_name.is_some() => {
            if !quiet {
                println!("Renamed to {}", name);
            }
        }
        OutputFormat::Text => println!("{}", name),
    }
    Ok(())
}
