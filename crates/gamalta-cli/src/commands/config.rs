//! Config command implementation.

use anyhow::{Context, Result};

use crate::cli::{ConfigAction, OutputFormat};
use crate::config::Config;
use crate::util::print_json;

pub fn cmd_config(action: ConfigAction, format: OutputFormat) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = Config::load();
            match format {
                OutputFormat::Json => print_json(&config)?,
                OutputFormat::Text => {
                    let content =
                        toml::to_string_pretty(&config).context("Failed to serialize config")?;
                    if content.trim().is_empty() {
                        println!("# No settings (using defaults)");
                    } else {
                        print!("{}", content);
                    }
                }
            }
        }
        ConfigAction::Path => println!("{}", Config::path().display()),
        ConfigAction::SetDevice { device } => {
            let mut config = Config::load();
            config.device = Some(device.clone());
            config.save()?;
            println!("Default device set to {}", device);
        }
    }
    Ok(())
}
