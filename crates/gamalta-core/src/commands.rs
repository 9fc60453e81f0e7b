//! Typed builders for every Gamalta command.
//!
//! A [`Command`] knows its opcode, meta byte and payload, and whether the
//! device confirms it with a reply. Inputs are validated when the command is
//! encoded, so a bad value fails with [`Error::InvalidArgument`] before
//! anything reaches the transport.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;

use gamalta_types::packet::MAX_PAYLOAD_LEN;
use gamalta_types::{Color, LightningConfig, MAX_BRIGHTNESS, Mode, Packet, opcode};

use crate::error::{Error, Result};
use crate::scene::{FINALIZE_POINT, SCENE_POINT_COUNT, SceneKind, ScenePoint};

/// Password the firmware ships with.
pub const DEFAULT_PASSWORD: &str = "123456";

/// Longest accepted login password.
pub const MAX_PASSWORD_LEN: usize = 16;

/// Login payload marker preceding the password.
const LOGIN_MARKER: u8 = 0x02;

/// First year representable in the time sync payload.
pub const MIN_SYNC_YEAR: i32 = 2000;

/// Last year representable in the time sync payload.
pub const MAX_SYNC_YEAR: i32 = MIN_SYNC_YEAR + 255;

/// Whether a command's success is signalled by a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckPolicy {
    /// The device answers with `opcode + 1`; the sender waits for it.
    Confirmed,
    /// No reliable reply; the sender writes and paces only.
    Inferred,
}

/// The scene queries the device answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneQuery {
    /// One stored point.
    Point(u8),
    /// Number of stored points.
    PointCount,
    /// Scene name.
    Name,
    /// Metadata blob.
    Metadata,
    /// Schedule summary.
    Schedule,
}

impl SceneQuery {
    /// Request opcode for this query.
    pub fn opcode(self) -> u8 {
        match self {
            SceneQuery::Point(_) => opcode::SCENE_POINT_QUERY,
            SceneQuery::PointCount => opcode::SCENE_POINT_COUNT_QUERY,
            SceneQuery::Name => opcode::SCENE_NAME_QUERY,
            SceneQuery::Metadata => opcode::SCENE_METADATA_QUERY,
            SceneQuery::Schedule => opcode::SCENE_SCHEDULE_QUERY,
        }
    }
}

/// A command ready to be framed.
///
/// # Examples
///
/// ```
/// use gamalta_core::{Color, Command};
///
/// let packet = Command::set_color(Color::new(255, 0, 0, 0, 0)).to_packet(0x20).unwrap();
/// assert_eq!(packet.encode().as_ref(), &[0xA5, 0x20, 0x50, 0x06, 255, 0, 0, 0, 0, 0x01]);
///
/// assert!(Command::brightness(101).to_packet(0x21).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Command {
    /// Switch the light on or off.
    Power(bool),
    /// Authenticate the session.
    Login {
        /// ASCII password.
        password: String,
    },
    /// Set the device clock to a local date and time.
    TimeSync(PrimitiveDateTime),
    /// Query the serial number.
    SerialQuery,
    /// Rename the device.
    SetName(String),
    /// Query the device name.
    NameQuery,
    /// Query the full device state.
    StateQuery,
    /// Set the colour channels.
    Color {
        /// Colour to show.
        color: Color,
        /// Store the colour (`true`) or only preview it (`false`).
        apply: bool,
    },
    /// Set brightness in percent.
    Brightness(u8),
    /// Program a timer slot with raw bytes.
    TimerSet {
        /// Slot number.
        slot: u8,
        /// Raw slot contents.
        raw: [u8; 2],
    },
    /// Query a timer slot.
    TimerQuery(u8),
    /// Select the active mode.
    Mode(Mode),
    /// Activate the selected scene.
    SceneActivate,
    /// Begin editing a custom scene.
    SceneEditStart(SceneKind),
    /// Write one scene point, 1-indexed.
    ScenePoint {
        /// Point number, 1 to 5.
        index: u8,
        /// Point contents.
        point: ScenePoint,
    },
    /// Write the metadata blob for a scene kind.
    SceneMetadata(SceneKind),
    /// Terminate a scene edit.
    SceneFinalize,
    /// Query a stored scene.
    SceneQuery {
        /// What to ask.
        query: SceneQuery,
        /// Scene id.
        scene: u8,
    },
    /// Store a lightning schedule.
    Lightning(LightningConfig),
    /// Flash lightning once using a config's other fields.
    LightningPreview(LightningConfig),
}

impl Command {
    /// Power command.
    pub fn power(on: bool) -> Self {
        Command::Power(on)
    }

    /// Login with the given password.
    pub fn login(password: impl Into<String>) -> Self {
        Command::Login {
            password: password.into(),
        }
    }

    /// Time sync to the given local date and time.
    pub fn time_sync(at: PrimitiveDateTime) -> Self {
        Command::TimeSync(at)
    }

    /// Store a colour.
    pub fn set_color(color: Color) -> Self {
        Command::Color { color, apply: true }
    }

    /// Show a colour without storing it.
    pub fn preview_color(color: Color) -> Self {
        Command::Color {
            color,
            apply: false,
        }
    }

    /// Store a colour given as wide integers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] naming the first channel outside 0-255.
    pub fn set_color_channels(
        red: i32,
        green: i32,
        blue: i32,
        cool_white: i32,
        warm_white: i32,
    ) -> Result<Self> {
        let color = Color::checked(red, green, blue, cool_white, warm_white)?;
        Ok(Self::set_color(color))
    }

    /// Brightness command.
    pub fn brightness(percent: u8) -> Self {
        Command::Brightness(percent)
    }

    /// Mode select command.
    pub fn mode(mode: Mode) -> Self {
        Command::Mode(mode)
    }

    /// Lightning schedule command.
    pub fn lightning(config: &LightningConfig) -> Self {
        Command::Lightning(config.clone())
    }

    /// Lightning preview; the intensity is always sent as the preview sentinel.
    pub fn lightning_preview(config: &LightningConfig) -> Self {
        Command::LightningPreview(config.clone())
    }

    /// Request opcode.
    pub fn opcode(&self) -> u8 {
        match self {
            Command::Power(_) => opcode::POWER,
            Command::Login { .. } => opcode::LOGIN,
            Command::TimeSync(_) => opcode::TIME_SYNC,
            Command::SerialQuery => opcode::SERIAL_QUERY,
            Command::SetName(_) => opcode::NAME_SET,
            Command::NameQuery => opcode::NAME_QUERY,
            Command::StateQuery => opcode::STATE_QUERY,
            Command::Color { .. } => opcode::COLOR,
            Command::Brightness(_) => opcode::BRIGHTNESS,
            Command::TimerSet { .. } => opcode::TIMER_SET,
            Command::TimerQuery(_) => opcode::TIMER_QUERY,
            Command::Mode(_) => opcode::MODE,
            Command::SceneActivate => opcode::SCENE_ACTIVATE,
            Command::SceneEditStart(_) => opcode::SCENE_EDIT_START,
            Command::ScenePoint { .. } | Command::SceneFinalize => opcode::SCENE_POINT,
            Command::SceneMetadata(_) => opcode::SCENE_METADATA,
            Command::SceneQuery { query, .. } => query.opcode(),
            Command::Lightning(_) | Command::LightningPreview(_) => opcode::LIGHTNING,
        }
    }

    /// Opcode of the reply this command waits for, if it waits at all.
    pub fn reply_opcode(&self) -> Option<u8> {
        match self.ack_policy() {
            AckPolicy::Confirmed => Some(opcode::response_for(self.opcode())),
            AckPolicy::Inferred => None,
        }
    }

    /// Whether the device confirms this command.
    pub fn ack_policy(&self) -> AckPolicy {
        match self {
            Command::Login { .. }
            | Command::StateQuery
            | Command::Color { .. }
            | Command::Mode(_)
            | Command::Lightning(_)
            | Command::LightningPreview(_)
            | Command::TimerQuery(_)
            | Command::NameQuery
            | Command::SerialQuery
            | Command::SceneQuery { .. } => AckPolicy::Confirmed,
            _ => AckPolicy::Inferred,
        }
    }

    /// Meta byte and payload, after validating inputs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for any out-of-range input.
    pub fn encode_body(&self) -> Result<(u8, Bytes)> {
        let (meta, payload): (u8, Vec<u8>) = match self {
            Command::Power(on) => (0x03, vec![if *on { 0x01 } else { 0x02 }, 0x00, 0x00]),
            Command::Login { password } => {
                validate_ascii("password", password, MAX_PASSWORD_LEN)?;
                let mut payload = Vec::with_capacity(password.len() + 1);
                payload.push(LOGIN_MARKER);
                payload.extend_from_slice(password.as_bytes());
                (payload.len() as u8, payload)
            }
            Command::TimeSync(at) => (0x07, time_sync_payload(at)?.to_vec()),
            Command::SerialQuery => (0x01, vec![0x00]),
            Command::SetName(name) => {
                validate_ascii("device name", name, MAX_PAYLOAD_LEN)?;
                (name.len() as u8, name.as_bytes().to_vec())
            }
            Command::NameQuery | Command::StateQuery => (0x00, Vec::new()),
            Command::Color { color, apply } => {
                let mut payload = color.to_bytes().to_vec();
                payload.push(u8::from(*apply));
                (0x06, payload)
            }
            Command::Brightness(percent) => {
                validate_brightness(*percent)?;
                (0x01, vec![*percent])
            }
            Command::TimerSet { slot, raw } => (0x03, vec![*slot, raw[0], raw[1]]),
            Command::TimerQuery(slot) => (0x01, vec![*slot]),
            Command::Mode(mode) => (0x01, vec![mode.as_byte()]),
            Command::SceneActivate => (0x01, vec![0x00]),
            Command::SceneEditStart(kind) => (0x01, vec![kind.scene_id()]),
            Command::ScenePoint { index, point } => {
                if *index == 0 || usize::from(*index) > SCENE_POINT_COUNT {
                    return Err(Error::invalid_argument(format!(
                        "scene point index must be 1-{}, got {}",
                        SCENE_POINT_COUNT, index
                    )));
                }
                validate_brightness(point.brightness)?;
                (0x0B, point.to_payload(*index).to_vec())
            }
            Command::SceneFinalize => {
                let mut payload = vec![0u8; 11];
                payload[0] = FINALIZE_POINT;
                (0x0B, payload)
            }
            Command::SceneMetadata(kind) => (0x03, kind.metadata().to_vec()),
            Command::SceneQuery { query, scene } => match query {
                SceneQuery::Point(point) => (0x02, vec![*scene, *point]),
                _ => (0x01, vec![*scene]),
            },
            Command::Lightning(config) => (0x07, config.to_bytes()?.to_vec()),
            Command::LightningPreview(config) => (0x07, config.as_preview().to_bytes()?.to_vec()),
        };

        Ok((meta, Bytes::from(payload)))
    }

    /// Frame this command with the given sequence byte.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for any out-of-range input.
    pub fn to_packet(&self, sequence: u8) -> Result<Packet> {
        let (meta, payload) = self.encode_body()?;
        let packet = Packet::new(sequence, self.opcode(), meta, payload);
        if !packet.fits_mtu() {
            return Err(Error::invalid_argument(format!(
                "{} frame of {} bytes exceeds the MTU",
                self,
                packet.len()
            )));
        }
        Ok(packet)
    }

    /// Check inputs without framing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for any out-of-range input.
    pub fn validate(&self) -> Result<()> {
        self.to_packet(0).map(|_| ())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::LightningPreview(_) => f.write_str("lightning_preview"),
            Command::SceneFinalize => f.write_str("scene_finalize"),
            other => f.write_str(opcode::name(other.opcode())),
        }
    }
}

/// The sequence that engages a scheduled mode without a visible jump:
/// colour, brightness, mode select, scene activate.
///
/// For [`Mode::Manual`] only the mode select is sent.
pub fn activation_sequence(mode: Mode, color: Color, brightness: u8) -> Vec<Command> {
    if mode == Mode::Manual {
        return vec![Command::Mode(mode)];
    }
    vec![
        Command::set_color(color),
        Command::Brightness(brightness),
        Command::Mode(mode),
        Command::SceneActivate,
    ]
}

fn validate_brightness(percent: u8) -> Result<()> {
    if percent > MAX_BRIGHTNESS {
        return Err(Error::invalid_argument(format!(
            "brightness must be 0-{}, got {}",
            MAX_BRIGHTNESS, percent
        )));
    }
    Ok(())
}

fn validate_ascii(what: &str, value: &str, max_len: usize) -> Result<()> {
    if value.is_empty() || value.len() > max_len {
        return Err(Error::invalid_argument(format!(
            "{} must be 1-{} characters, got {}",
            what,
            max_len,
            value.len()
        )));
    }
    if !value.bytes().all(|b| b.is_ascii_graphic() || b == b' ') {
        return Err(Error::invalid_argument(format!(
            "{} must be printable ASCII",
            what
        )));
    }
    Ok(())
}

fn time_sync_payload(at: &PrimitiveDateTime) -> Result<[u8; 7]> {
    let year = at.year();
    if !(MIN_SYNC_YEAR..=MAX_SYNC_YEAR).contains(&year) {
        return Err(Error::invalid_argument(format!(
            "year must be {}-{}, got {}",
            MIN_SYNC_YEAR, MAX_SYNC_YEAR, year
        )));
    }
    Ok([
        (year - MIN_SYNC_YEAR) as u8,
        u8::from(at.month()),
        at.day(),
        at.weekday().number_from_monday(),
        at.hour(),
        at.minute(),
        at.second(),
    ])
}
