//! Command-line interface for Gamalta aquarium lights.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `scan` | Scan for nearby lights |
//! | `status` | Show power, mode, brightness and colour |
//! | `power` | Switch the light on or off |
//! | `color` | Set a manual colour |
//! | `brightness` | Set master brightness |
//! | `mode` | Select a lighting mode |
//! | `lightning` | Preview or schedule the lightning effect |
//! | `name` | Read or change the device name |
//! | `watch` | Stream state reports and session events |
//! | `config` | Manage CLI configuration |
//! | `completions` | Generate shell completions |
//!
//! # Configuration
//!
//! Settings live in `~/.config/gamalta/config.toml` (or platform equivalent).
//! `GAMALTA_DEVICE` overrides the default device and is overridden by `--device`.

mod cli;
mod commands;
mod config;
mod util;

use std::io;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::{
    ColorArgs, cmd_brightness, cmd_color, cmd_config, cmd_lightning, cmd_mode, cmd_name,
    cmd_power, cmd_scan, cmd_status, cmd_watch,
};
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle completions command early (before tracing init)
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "gamalta", &mut io::stdout());
        return Ok(());
    }

    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let config = Config::load();
    let format = cli.format(config.format.as_deref());
    let quiet = cli.quiet;

    match cli.command {
        Commands::Scan { timeout, all } => cmd_scan(timeout, all, format, quiet, &config).await,
        Commands::Status { device } => cmd_status(&device, format, quiet, &config).await,
        Commands::Power { device, state } => cmd_power(&device, state, quiet, &config).await,
        Commands::Color {
            device,
            red,
            green,
            blue,
            cool,
            warm,
            preview,
        } => {
            let args = ColorArgs {
                red,
                green,
                blue,
                cool,
                warm,
                preview,
            };
            cmd_color(&device, args, quiet, &config).await
        }
        Commands::Brightness { device, percent } => {
            cmd_brightness(&device, percent, quiet, &config).await
        }
        Commands::Mode { device, mode } => cmd_mode(&device, mode, quiet, &config).await,
        Commands::Lightning { device, action } => {
            cmd_lightning(&device, action, quiet, &config).await
        }
        Commands::Name { device, name } => cmd_name(&device, name, format, quiet, &config).await,
        Commands::Watch { device, interval } => {
            cmd_watch(&device, interval, format, quiet, &config).await
        }
        Commands::Config { action } => cmd_config(action, format),
        // Already handled above
        Commands::Completions { .. } => Ok(()),
    }
}
