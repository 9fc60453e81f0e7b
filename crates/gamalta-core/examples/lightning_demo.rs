//! Example: Lightning Effects
//!
//! This example flashes a lightning preview, then stores an evening storm
//! schedule for weekdays.
//!
//! Run with: `cargo run --example lightning_demo -- <DEVICE_ADDRESS_OR_NAME>`

use std::env;
use std::time::Duration;

use gamalta_core::{Client, DaySet, LightningConfig};
use time::macros::time;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let identifier = if args.len() > 1 {
        &args[1]
    } else {
        eprintln!("Usage: {} <DEVICE_ADDRESS_OR_NAME>", args[0]);
        eprintln!();
        eprintln!("Example:");
        eprintln!("  {} AA:BB:CC:DD:EE:FF", args[0]);
        eprintln!("  {} \"Gamalta-1A2B\"", args[0]);
        std::process::exit(1);
    };

    let client = Client::new();
    client.connect(Some(identifier)).await?;
    println!("Connected. Watch the tank!");

    client.preview_lightning().await?;
    tokio::time::sleep(Duration::from_secs(5)).await;

    let storm = LightningConfig::new(70, 4, time!(19:30), time!(20:15), DaySet::WEEKDAYS);
    client.configure_lightning(&storm).await?;
    println!(
        "Stored storm: intensity {}%, frequency {}, {} - {} on weekdays",
        storm.intensity, storm.frequency, storm.start, storm.end
    );

    client.disconnect().await?;
    println!("Disconnected.");

    Ok(())
}
