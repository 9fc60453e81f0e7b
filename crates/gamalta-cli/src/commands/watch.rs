//! Watch command implementation.
//!
//! Keeps one session open and prints every device state report and session
//! event as it arrives. With a polling interval the state is also queried
//! periodically. A lost link is re-established with exponential backoff.

use std::time::Duration;

use anyhow::Result;
use gamalta_core::{Client, SessionEvent};
use tokio::sync::broadcast::error::RecvError;

use crate::cli::{DeviceArgs, OutputFormat};
use crate::config::Config;
use crate::util::connect_client;

/// Minimum backoff delay for reconnection attempts
const MIN_BACKOFF_SECS: u64 = 2;
/// Maximum backoff delay for reconnection attempts
const MAX_BACKOFF_SECS: u64 = 300; // 5 minutes

pub async fn cmd_watch(
    device: &DeviceArgs,
    interval: u64,
    format: OutputFormat,
    quiet: bool,
    config: &Config,
) -> Result<()> {
    let mut backoff_secs = MIN_BACKOFF_SECS;

    loop {
        let client = match connect_client(device, config, quiet).await {
            Ok(client) => {
                backoff_secs = MIN_BACKOFF_SECS;
                client
            }
            Err(e) => {
                eprintln!("Connection failed: {:#}. Retrying in {}s...", e, backoff_secs);
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        eprintln!("\nShutting down...");
                        return Ok(());
                    }
                    _ = tokio::time::sleep(Duration::from_secs(backoff_secs)) => {}
                }
                backoff_secs = (backoff_secs * 2).min(MAX_BACKOFF_SECS);
                continue;
            }
        };

        if !quiet {
            eprintln!("Watching. Press Ctrl+C to stop");
            eprintln!("{}", "-".repeat(50));
        }

        match watch_session(&client, interval, format).await? {
            WatchEnd::Interrupted => {
                eprintln!("\nShutting down...");
                client.disconnect().await.ok();
                return Ok(());
            }
            WatchEnd::LinkLost => {
                eprintln!("Connection lost. Reconnecting...");
                client.disconnect().await.ok();
            }
        }
    }
}

enum WatchEnd {
    Interrupted,
    LinkLost,
}

async fn watch_session(client: &Client, interval: u64, format: OutputFormat) -> Result<WatchEnd> {
    let mut events = client.events();
    if let Some(snapshot) = client.snapshot() {
        print_event(&SessionEvent::Snapshot { state: snapshot.state }, format)?;
    }

    let polling = interval > 0;
    let mut ticker = tokio::time::interval(Duration::from_secs(interval.max(1)));
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(WatchEnd::Interrupted),
            _ = ticker.tick(), if polling => {
                if let Err(e) = client.query_state().await {
                    tracing::warn!("State query failed: {}", e);
                }
            }
            event = events.recv() => match event {
                Ok(event) => {
                    let lost = matches!(event, SessionEvent::Disconnected { .. });
                    print_event(&event, format)?;
                    if lost {
                        return Ok(WatchEnd::LinkLost);
                    }
                }
                Err(RecvError::Lagged(n)) => tracing::warn!("Dropped {} events", n),
                Err(RecvError::Closed) => return Ok(WatchEnd::LinkLost),
            },
        }
    }
}

fn print_event(event: &SessionEvent, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(event)?),
        OutputFormat::Text => {
            if let Some(line) = format_event_line(event) {
                println!("{}", line);
            }
        }
    }
    Ok(())
}

/// One-line rendering of an event; decoded replies are only shown in JSON.
fn format_event_line(event: &SessionEvent) -> Option<String> {
    let line = match event {
        SessionEvent::Snapshot { state } => format!("state  {}", state),
        SessionEvent::StateChanged { from, to } => format!("session {} -> {}", from, to),
        SessionEvent::MalformedFrame { raw, reason } => {
            format!("malformed frame {:02X?}: {}", raw, reason)
        }
        SessionEvent::UnknownResponse { opcode, .. } => {
            format!("unknown response 0x{:02X}", opcode)
        }
        SessionEvent::Disconnected { reason } => format!("disconnected ({:?})", reason),
        _ => return None,
    };
    Some(line)
}
