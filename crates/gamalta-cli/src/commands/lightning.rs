//! Lightning command implementation.

use anyhow::{Context, Result};
use gamalta_core::LightningConfig;

use crate::cli::{DeviceArgs, LightningAction};
use crate::config::Config;
use crate::util::connect_client;

pub async fn cmd_lightning(
    device: &DeviceArgs,
    action: LightningAction,
    quiet: bool,
    config: &Config,
) -> Result<()> {
    let schedule = lightning_config(&action);
    if let Some(schedule) = &schedule {
        schedule.validate().context("Invalid lightning schedule")?;
    }

    let client = connect_client(device, config, quiet).await?;
    let result = match &schedule {
        Some(schedule) => client.configure_lightning(schedule).await,
        None => client.preview_lightning().await,
    };
    client.disconnect().await.ok();
    result.context("Failed to send lightning command")?;

    if !quiet {
        match schedule {
            Some(s) => println!(
                "Lightning {} {:02}:{:02}-{:02}:{:02} on {} (intensity {}%, frequency {})",
                if s.enabled { "scheduled" } else { "stored (disabled)" },
                s.start.hour(),
                s.start.minute(),
                s.end.hour(),
                s.end.minute(),
                s.days,
                s.intensity,
                s.frequency
            ),
            None => println!("Lightning preview sent"),
        }
    }
    Ok(())
}

/// Build the schedule for `set`; `preview` has none.
fn lightning_config(action: &LightningAction) -> Option<LightningConfig> {
    match *action {
        LightningAction::Preview => None,
        LightningAction::Set {
            intensity,
            frequency,
            start,
            end,
            days,
            enabled,
        } => Some(LightningConfig::new(intensity, frequency, start, end, days).enabled(enabled)),
    }
}
