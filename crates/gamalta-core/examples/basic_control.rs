//! Example: Basic Lighting Control
//!
//! This example connects to a Gamalta light, sets a manual colour and
//! brightness, switches to a built-in schedule, and prints the state the
//! light reports after each step.
//!
//! Run with: `cargo run --example basic_control -- [DEVICE_ADDRESS_OR_NAME]`
//!
//! Without an argument the strongest light in range is used.

use std::env;
use std::time::Duration;

use gamalta_core::{Client, Color, Mode};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let identifier = env::args().nth(1);

    match &identifier {
        Some(id) => println!("Connecting to {}...", id),
        None => println!("Scanning for the nearest light..."),
    }

    let client = Client::new();
    let device = client.connect(identifier.as_deref()).await?;
    println!(
        "Connected to {} ({})",
        device.name.as_deref().unwrap_or("Unknown"),
        device.identifier
    );
    println!();

    let state = client.query_state().await?;
    println!("Initial state: {}", state);

    println!("Switching to a deep blue...");
    client.power_on().await?;
    client.set_color(Color::new(0, 30, 255, 40, 0)).await?;
    client.set_brightness(60).await?;
    tokio::time::sleep(Duration::from_secs(3)).await;
    println!("  Device reports: {}", client.query_state().await?);

    println!("Handing control to the Coral Reef schedule...");
    client.set_mode(Mode::CoralReef).await?;
    tokio::time::sleep(Duration::from_secs(1)).await;
    println!("  Device reports: {}", client.query_state().await?);

    client.disconnect().await?;
    println!();
    println!("Disconnected.");

    Ok(())
}
