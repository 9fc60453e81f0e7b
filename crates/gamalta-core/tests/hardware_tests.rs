//! Hardware integration tests for gamalta-core
//!
//! These tests require a real light and should be run with:
//! ```
//! cargo test --package gamalta-core --test hardware_tests -- --ignored --nocapture
//! ```
//!
//! Configure the light via the `GAMALTA_DEVICE` environment variable (name or
//! address). Without it the strongest light in range is used.
//!
//! Example:
//! ```
//! GAMALTA_DEVICE="Gamalta-1A2B" cargo test --package gamalta-core --test hardware_tests -- --ignored --nocapture
//! ```
//!
//! The tests change the light's colour and mode; the initial state is
//! restored where possible.

use std::env;
use std::time::Duration;

use gamalta_core::scan::scan_with_options;
use gamalta_core::{Client, Color, Mode, ScanOptions, SessionState};
use tokio::time::timeout;

/// Default timeout for BLE operations
const BLE_TIMEOUT: Duration = Duration::from_secs(45);

/// Get device identifier from environment
fn get_device() -> Option<String> {
    env::var("GAMALTA_DEVICE").ok().filter(|s| !s.is_empty())
}

async fn connect() -> Client {
    let client = Client::new();
    let device = get_device();
    timeout(BLE_TIMEOUT, client.connect(device.as_deref()))
        .await
        .expect("connection timed out")
        .expect("connection failed");
    client
}

#[tokio::test]
#[ignore = "requires BLE hardware"]
async fn test_scan_discovers_lights() {
    let options = ScanOptions::default().duration_secs(10);
    let result = timeout(Duration::from_secs(30), scan_with_options(&options)).await;

    match result {
        Ok(Ok(devices)) => {
            println!("Scan discovered {} lights:", devices.len());
            for device in &devices {
                println!(
                    "  - {} ({}) rssi={:?}",
                    device.name.as_deref().unwrap_or("Unknown"),
                    device.identifier,
                    device.rssi
                );
            }
        }
        Ok(Err(e)) => panic!("Scan failed: {}", e),
        Err(_) => panic!("Scan timed out"),
    }
}

#[tokio::test]
#[ignore = "requires BLE hardware"]
async fn test_handshake_reaches_ready() {
    let client = connect().await;
    assert_eq!(client.state(), SessionState::Ready);

    let snapshot = client.snapshot().expect("stabilization should report state");
    println!("Device state after handshake: {}", snapshot.state);

    client.disconnect().await.unwrap();
    assert_eq!(client.state(), SessionState::Disconnected);
}

#[tokio::test]
#[ignore = "requires BLE hardware"]
async fn test_manual_color_and_restore() {
    let client = connect().await;
    let initial = client.query_state().await.unwrap();
    println!("Initial: {}", initial);

    client.set_mode(Mode::Manual).await.unwrap();
    client.set_color(Color::rgb(0, 0, 255)).await.unwrap();
    client.set_brightness(40).await.unwrap();

    let state = client.query_state().await.unwrap();
    println!("After change: {}", state);
    assert_eq!(state.mode, Mode::Manual);
    assert_eq!(state.brightness, 40);

    client.set_color(initial.color).await.unwrap();
    client.set_brightness(initial.brightness).await.unwrap();
    client.set_mode(initial.mode).await.unwrap();
    client.disconnect().await.unwrap();
}

#[tokio::test]
#[ignore = "requires BLE hardware"]
async fn test_read_device_information() {
    let client = connect().await;

    let name = client.query_name().await.unwrap();
    println!("Name: {}", name);
    assert!(!name.is_empty());

    match client.query_serial().await {
        Ok(serial) => println!("Serial: {}", serial),
        Err(e) => println!("Serial query not answered: {}", e),
    }

    for slot in 1..=2 {
        match client.query_timer(slot).await {
            Ok(timer) => println!("Timer {}: {:02X?}", timer.slot, timer.raw),
            Err(e) => println!("Timer {} not answered: {}", slot, e),
        }
    }

    client.disconnect().await.unwrap();
}
