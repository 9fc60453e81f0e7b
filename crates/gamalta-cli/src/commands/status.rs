//! Status command implementation.

use anyhow::{Context, Result};
use gamalta_core::DeviceState;
use serde::Serialize;

use crate::cli::{DeviceArgs, OutputFormat};
use crate::config::Config;
use crate::util::{connect_client, print_json};

#[derive(Debug, Serialize)]
struct StatusReport {
    name: Option<String>,
    state: DeviceState,
}

pub async fn cmd_status(
    device: &DeviceArgs,
    format: OutputFormat,
    quiet: bool,
    config: &Config,
) -> Result<()> {
    let client = connect_client(device, config, quiet).await?;

    let state = client
        .query_state()
        .await
        .context("Failed to read device state");
    let name = match &state {
        Ok(_) => client.query_name().await.ok(),
        Err(_) => None,
    };

    client.disconnect().await.ok();

    let report = StatusReport {
        name,
        state: state?,
    };
    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => print!("{}", format_status_text(&report)),
    }
    Ok(())
}

fn format_status_text(report: &StatusReport) -> String {
    let state = &report.state;
    let mut out = String::new();
    if let Some(name) = &report.name {
        out.push_str(&format!("Device:     {}\n", name));
    }
    out.push_str(&format!(
        "Power:      {}\n",
        if state.power { "on" } else { "off" }
    ));
    out.push_str(&format!("Mode:       {}\n", state.mode));
    out.push_str(&format!("Brightness: {}%\n", state.brightness));
    out.push_str(&format!("Color:      {}\n", state.color));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use gamalta_core::{Color, Mode};

    #[test]
    fn test_format_status_text() {
        let report = StatusReport {
            name: Some("Gamalta-1A2B".to_string()),
            state: DeviceState {
                power: true,
                mode: Mode::CoralReef,
                brightness: 75,
                color: Color::rgb(10, 20, 30),
            },
        };
        let text = format_status_text(&report);
        assert!(text.contains("Gamalta-1A2B"));
        assert!(text.contains("Power:      on"));
        assert!(text.contains("Coral Reef"));
        assert!(text.contains("75%"));
    }

    #[test]
    fn test_status_json_shape() {
        let report = StatusReport {
            name: None,
            state: DeviceState::default(),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["state"]["power"], false);
        assert_eq!(json["state"]["mode"], "manual");
        assert!(json["name"].is_null());
    }
}
