//! Bluetooth UUIDs for Gamalta lights.
//!
//! The light exposes a single vendor service with one write characteristic
//! for commands and one notify characteristic for responses.

use uuid::{Uuid, uuid};

// --- Gamalta Service UUIDs ---

/// Vendor service carrying the command and notify characteristics.
pub const GAMALTA_SERVICE: Uuid = uuid!("0000fff0-0000-1000-8000-00805f9b34fb");

// --- Gamalta Characteristic UUIDs ---

/// Command characteristic (write without response).
pub const WRITE_CHARACTERISTIC: Uuid = uuid!("0000fff3-0000-1000-8000-00805f9b34fb");

/// Response characteristic (notify).
pub const NOTIFY_CHARACTERISTIC: Uuid = uuid!("0000fff4-0000-1000-8000-00805f9b34fb");

/// Advertised name prefix used to recognise lights during scanning.
pub const DEVICE_NAME_PREFIX: &str = "Gamalta";
