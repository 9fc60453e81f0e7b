//! Platform-agnostic protocol types for Gamalta BLE aquarium lights.
//!
//! This crate holds everything about the Gamalta wire protocol that does not
//! need a Bluetooth stack, so it can be shared between the native session
//! layer (gamalta-core) and tooling that only inspects captured frames.
//!
//! # Features
//!
//! - Frame codec ([`Packet`])
//! - Opcode table ([`opcode`])
//! - Notification decoding ([`Response`])
//! - Light state types: colour, mode, lightning, weekday sets
//! - Keyframe schedules for estimating scheduled-mode output
//! - UUID constants for the BLE service
//!
//! # Example
//!
//! ```
//! use gamalta_types::{Packet, Response, DeviceState, Mode};
//!
//! let frame = [0xA5, 0x11, 0x04, 0x08, 0x01, 0x00, 80, 255, 0, 0, 0, 0];
//! let packet = Packet::decode(&frame).unwrap();
//!
//! match Response::decode(&packet).unwrap() {
//!     Response::StateSnapshot { state } => {
//!         assert!(state.power);
//!         assert_eq!(state.mode, Mode::Manual);
//!         assert_eq!(state.brightness, 80);
//!     }
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

pub mod error;
pub mod opcode;
pub mod packet;
pub mod response;
pub mod schedule;
pub mod types;
pub mod uuid;

pub use error::{ParseError, ParseResult};
pub use packet::Packet;
pub use response::Response;
pub use schedule::{Keyframe, Schedule};
pub use types::{
    Color, DaySet, DeviceDescriptor, DeviceState, LIGHTNING_PREVIEW_INTENSITY, LightningConfig,
    MAX_BRIGHTNESS, MAX_LIGHTNING_FREQUENCY, MAX_LIGHTNING_INTENSITY, Mode, SessionState,
};
pub use uuid as uuids;
