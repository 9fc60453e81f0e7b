//! Core BLE session library for Gamalta aquarium lights.
//!
//! This crate drives a Gamalta light through its reverse-engineered binary
//! protocol: framing commands, pacing and sequencing writes, running the
//! mandatory handshake, and folding asynchronous notifications into a device
//! state snapshot.
//!
//! # Features
//!
//! - **Device discovery**: Scan for nearby lights via BLE
//! - **Handshake**: Login, clock sync and the stabilization queries the
//!   firmware needs before it accepts commands
//! - **Lighting control**: Power, colour channels, brightness, modes
//! - **Lightning effects**: Preview and schedule storm effects
//! - **Custom scenes**: Write five-point Basic and Pro schedules
//! - **State tracking**: Device-reported snapshots, with provisional updates
//!   after writes
//! - **Testability**: A [`MockTransport`] that simulates a light
//!
//! # Layers
//!
//! | Layer | Type | Role |
//! |-------|------|------|
//! | Facade | [`Client`] | One method per device operation |
//! | Session | [`Session`] | Lifecycle, write serialization, reply matching |
//! | Commands | [`Command`] | Typed frame builders |
//! | Transport | [`Transport`] | Scan, connect, write, notify |
//!
//! # Quick Start
//!
//! ```no_run
//! use gamalta_core::{Client, Color, Mode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect to the strongest light in range
//!     let client = Client::new();
//!     let device = client.connect(None).await?;
//!     println!("Connected to {:?}", device.name);
//!
//!     // Manual colour
//!     client.set_color(Color::new(0, 40, 255, 60, 0)).await?;
//!     client.set_brightness(70).await?;
//!
//!     // Hand control back to a built-in schedule
//!     client.set_mode(Mode::FishBlue).await?;
//!
//!     let state = client.query_state().await?;
//!     println!("{}", state);
//!
//!     client.disconnect().await?;
//!     Ok(())
//! }
//! ```

pub mod ble;
pub mod client;
pub mod commands;
pub mod error;
pub mod events;
pub mod mock;
pub mod scan;
pub mod scene;
pub mod sequence;
pub mod session;
pub mod transport;

pub use gamalta_types::types;
pub use gamalta_types::uuid;

// Core exports
pub use ble::{BleTransport, ConnectionConfig};
pub use client::{Client, TimerSlot};
pub use commands::{AckPolicy, Command, SceneQuery, activation_sequence};
pub use error::{DeviceNotFoundReason, Error, Result};
pub use events::{DisconnectReason, EventDispatcher, EventReceiver, EventSender, SessionEvent};
pub use mock::{MockTransport, MockTransportBuilder};
pub use scene::{SceneDefinition, SceneKind, ScenePoint};
pub use sequence::SequenceCounter;
pub use session::{Session, SessionConfig, Snapshot, SnapshotSource};
pub use transport::{NotificationStream, ScanOptions, Transport, TransportEvent};

// Re-export from gamalta-types
pub use gamalta_types::uuid as uuids;
pub use gamalta_types::{
    Color, DaySet, DeviceDescriptor, DeviceState, Keyframe, LightningConfig, Mode, Packet,
    ParseError, Response, Schedule, SessionState,
};
