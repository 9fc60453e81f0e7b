//! Core types for Gamalta light control.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::{Time, Weekday};

use crate::error::{ParseError, ParseResult};

/// Five-channel colour value.
///
/// Channels are always sent in wire order R, G, B, Cool, Warm. Brightness is
/// a separate setting and is not part of the colour.
///
/// # Examples
///
/// ```
/// use gamalta_types::Color;
///
/// let color = Color::new(255, 0, 0, 0, 0);
/// assert_eq!(color.to_bytes(), [255, 0, 0, 0, 0]);
///
/// assert!(Color::checked(256, 0, 0, 0, 0).is_err());
/// assert_eq!(Color::clamped(300, -5, 10, 0, 0), Color::new(255, 0, 10, 0, 0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Color {
    /// Red channel.
    pub red: u8,
    /// Green channel.
    pub green: u8,
    /// Blue channel.
    pub blue: u8,
    /// Cool white LED channel.
    pub cool_white: u8,
    /// Warm white LED channel.
    pub warm_white: u8,
}

impl Color {
    /// All channels off.
    pub const OFF: Self = Self::new(0, 0, 0, 0, 0);

    /// Create a colour from five channel values.
    #[must_use]
    pub const fn new(red: u8, green: u8, blue: u8, cool_white: u8, warm_white: u8) -> Self {
        Self {
            red,
            green,
            blue,
            cool_white,
            warm_white,
        }
    }

    /// Create a colour with the RGB channels only.
    #[must_use]
    pub const fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self::new(red, green, blue, 0, 0)
    }

    /// Create a colour using only the white LED channels.
    #[must_use]
    pub const fn white(cool_white: u8, warm_white: u8) -> Self {
        Self::new(0, 0, 0, cool_white, warm_white)
    }

    /// Create a colour from wide integers, rejecting any channel outside 0..=255.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidValue`] naming the first offending channel.
    pub fn checked(
        red: i32,
        green: i32,
        blue: i32,
        cool_white: i32,
        warm_white: i32,
    ) -> ParseResult<Self> {
        fn channel(name: &str, value: i32) -> ParseResult<u8> {
            u8::try_from(value).map_err(|_| {
                ParseError::invalid_value(format!("{} must be 0-255, got {}", name, value))
            })
        }

        Ok(Self {
            red: channel("red", red)?,
            green: channel("green", green)?,
            blue: channel("blue", blue)?,
            cool_white: channel("cool_white", cool_white)?,
            warm_white: channel("warm_white", warm_white)?,
        })
    }

    /// Create a colour from wide integers, clamping each channel into 0..=255.
    #[must_use]
    pub fn clamped(red: i32, green: i32, blue: i32, cool_white: i32, warm_white: i32) -> Self {
        let clamp = |v: i32| v.clamp(0, 255) as u8;
        Self::new(
            clamp(red),
            clamp(green),
            clamp(blue),
            clamp(cool_white),
            clamp(warm_white),
        )
    }

    /// Channels in wire order.
    #[must_use]
    pub const fn to_bytes(&self) -> [u8; 5] {
        [
            self.red,
            self.green,
            self.blue,
            self.cool_white,
            self.warm_white,
        ]
    }

    /// Parse channels from wire order.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InsufficientBytes`] if fewer than 5 bytes are given.
    pub fn from_bytes(data: &[u8]) -> ParseResult<Self> {
        match data {
            [red, green, blue, cool_white, warm_white, ..] => {
                Ok(Self::new(*red, *green, *blue, *cool_white, *warm_white))
            }
            _ => Err(ParseError::InsufficientBytes {
                expected: 5,
                actual: data.len(),
            }),
        }
    }

    /// Whether every channel is zero.
    #[must_use]
    pub fn is_off(&self) -> bool {
        *self == Self::OFF
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "R:{} G:{} B:{} C:{} W:{}",
            self.red, self.green, self.blue, self.cool_white, self.warm_white
        )
    }
}

/// Operating mode of the light.
///
/// Every mode except [`Mode::Manual`] is a scheduled mode: the device computes
/// colour and brightness itself from its clock and an internal schedule.
///
/// # Examples
///
/// ```
/// use gamalta_types::Mode;
///
/// assert_eq!(Mode::CoralReef.as_byte(), 0x02);
/// assert_eq!(Mode::try_from(0x0B), Ok(Mode::CustomBasic));
/// assert!(Mode::SunSync.is_scheduled());
/// assert!(!Mode::Manual.is_scheduled());
/// assert_eq!("fish-blue".parse::<Mode>(), Ok(Mode::FishBlue));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[repr(u8)]
pub enum Mode {
    /// Static colour; the last colour set is authoritative.
    Manual = 0x00,
    /// 24 hour daylight cycle.
    SunSync = 0x01,
    /// 24 hour cycle tuned for coral reefs.
    CoralReef = 0x02,
    /// 24 hour cycle in deep blue tones.
    FishBlue = 0x03,
    /// 24 hour cycle for plant growth.
    Waterweed = 0x04,
    /// User-defined scene, basic editor.
    CustomBasic = 0x0B,
    /// User-defined scene, pro editor.
    CustomPro = 0x0C,
}

impl Mode {
    /// Every mode, in byte order.
    pub const ALL: [Mode; 7] = [
        Mode::Manual,
        Mode::SunSync,
        Mode::CoralReef,
        Mode::FishBlue,
        Mode::Waterweed,
        Mode::CustomBasic,
        Mode::CustomPro,
    ];

    /// Byte sent in the mode select command.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Whether the device drives colour from its own schedule in this mode.
    #[must_use]
    pub const fn is_scheduled(self) -> bool {
        !matches!(self, Mode::Manual)
    }

    /// Whether this is a user-editable custom scene.
    #[must_use]
    pub const fn is_custom(self) -> bool {
        matches!(self, Mode::CustomBasic | Mode::CustomPro)
    }

    /// Stable lowercase name, as accepted by [`FromStr`].
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Mode::Manual => "manual",
            Mode::SunSync => "sunsync",
            Mode::CoralReef => "coral-reef",
            Mode::FishBlue => "fish-blue",
            Mode::Waterweed => "waterweed",
            Mode::CustomBasic => "custom-basic",
            Mode::CustomPro => "custom-pro",
        }
    }
}

impl TryFrom<u8> for Mode {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Mode::ALL
            .into_iter()
            .find(|mode| mode.as_byte() == value)
            .ok_or(ParseError::UnknownMode(value))
    }
}

impl FromStr for Mode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', ' '], "-");
        match normalized.as_str() {
            "manual" => Ok(Mode::Manual),
            "sunsync" | "sun-sync" => Ok(Mode::SunSync),
            "coral-reef" | "coral" => Ok(Mode::CoralReef),
            "fish-blue" => Ok(Mode::FishBlue),
            "waterweed" | "water-weed" => Ok(Mode::Waterweed),
            "custom-basic" => Ok(Mode::CustomBasic),
            "custom-pro" => Ok(Mode::CustomPro),
            _ => Err(ParseError::invalid_value(format!("unknown mode '{}'", s))),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Manual => write!(f, "Manual"),
            Mode::SunSync => write!(f, "SunSync"),
            Mode::CoralReef => write!(f, "Coral Reef"),
            Mode::FishBlue => write!(f, "Fish Blue"),
            Mode::Waterweed => write!(f, "Waterweed"),
            Mode::CustomBasic => write!(f, "Custom (Basic)"),
            Mode::CustomPro => write!(f, "Custom (Pro)"),
        }
    }
}

/// Set of weekdays used by schedules.
///
/// Bit 0 is Monday through bit 6 for Sunday. Bit 7 of the wire byte is the
/// schedule's master enable and is not part of the set.
///
/// # Examples
///
/// ```
/// use gamalta_types::DaySet;
/// use time::Weekday;
///
/// let days: DaySet = [Weekday::Monday, Weekday::Friday].into_iter().collect();
/// assert_eq!(days.to_byte(true), 0x91);
/// assert_eq!(DaySet::ALL.to_byte(false), 0x7F);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct DaySet(u8);

impl DaySet {
    /// Bit carrying the master enable in the wire byte.
    pub const ENABLE_BIT: u8 = 0x80;

    /// No days.
    pub const EMPTY: Self = Self(0);
    /// Every day of the week.
    pub const ALL: Self = Self(0x7F);
    /// Monday through Friday.
    pub const WEEKDAYS: Self = Self(0x1F);
    /// Saturday and Sunday.
    pub const WEEKEND: Self = Self(0x60);

    /// Build a set from raw bits, ignoring the enable bit.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0x7F)
    }

    /// Raw day bits (enable bit excluded).
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    const fn bit(day: Weekday) -> u8 {
        1 << day.number_days_from_monday()
    }

    /// Add a day.
    #[must_use]
    pub const fn with(self, day: Weekday) -> Self {
        Self(self.0 | Self::bit(day))
    }

    /// Whether the set contains `day`.
    #[must_use]
    pub const fn contains(self, day: Weekday) -> bool {
        self.0 & Self::bit(day) != 0
    }

    /// Whether the set is empty.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Days in the set, Monday first.
    pub fn iter(self) -> impl Iterator<Item = Weekday> {
        let mut day = Weekday::Sunday;
        (0..7)
            .map(move |_| {
                day = day.next();
                day
            })
            .filter(move |day| self.contains(*day))
    }

    /// Wire byte with the master enable in bit 7.
    #[must_use]
    pub const fn to_byte(self, enabled: bool) -> u8 {
        if enabled {
            self.0 | Self::ENABLE_BIT
        } else {
            self.0
        }
    }

    /// Split a wire byte into the day set and the enable flag.
    #[must_use]
    pub const fn from_byte(byte: u8) -> (Self, bool) {
        (Self::from_bits(byte), byte & Self::ENABLE_BIT != 0)
    }
}

impl FromIterator<Weekday> for DaySet {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, Self::with)
    }
}

impl fmt::Display for DaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::ALL => return write!(f, "every day"),
            Self::WEEKDAYS => return write!(f, "weekdays"),
            Self::WEEKEND => return write!(f, "weekend"),
            Self::EMPTY => return write!(f, "never"),
            _ => {}
        }
        let names: Vec<String> = self
            .iter()
            .map(|day| day.to_string()[..3].to_string())
            .collect();
        write!(f, "{}", names.join(","))
    }
}

/// Intensity value that makes the device flash once instead of storing a schedule.
pub const LIGHTNING_PREVIEW_INTENSITY: u8 = 0xFE;

/// Highest storable lightning intensity (percent).
pub const MAX_LIGHTNING_INTENSITY: u8 = 100;

/// Highest lightning frequency.
pub const MAX_LIGHTNING_FREQUENCY: u8 = 10;

/// Automatic lightning storm effect schedule.
///
/// # Examples
///
/// ```
/// use gamalta_types::{DaySet, LightningConfig};
/// use time::macros::time;
///
/// let config = LightningConfig::new(80, 3, time!(20:00), time!(21:30), DaySet::WEEKEND);
/// assert_eq!(config.to_bytes().unwrap(), [80, 3, 20, 0, 21, 30, 0xE0]);
/// assert_eq!(config.as_preview().to_bytes().unwrap()[0], 0xFE);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LightningConfig {
    /// Flash intensity in percent, or [`LIGHTNING_PREVIEW_INTENSITY`].
    pub intensity: u8,
    /// Flashes per interval, 0-10.
    pub frequency: u8,
    /// Daily start of the effect window.
    pub start: Time,
    /// Daily end of the effect window.
    pub end: Time,
    /// Days the effect runs.
    pub days: DaySet,
    /// Master enable switch.
    pub enabled: bool,
}

impl LightningConfig {
    /// Create an enabled schedule.
    #[must_use]
    pub fn new(intensity: u8, frequency: u8, start: Time, end: Time, days: DaySet) -> Self {
        Self {
            intensity,
            frequency,
            start,
            end,
            days,
            enabled: true,
        }
    }

    /// Set the master enable switch.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// A config that makes the device flash once right away.
    ///
    /// Only the intensity matters; the remaining fields are present but ignored
    /// by the device.
    #[must_use]
    pub fn preview() -> Self {
        Self {
            intensity: LIGHTNING_PREVIEW_INTENSITY,
            frequency: 5,
            start: Time::MIDNIGHT,
            end: Time::MIDNIGHT,
            days: DaySet::EMPTY,
            enabled: false,
        }
    }

    /// This config with the intensity replaced by the preview sentinel.
    #[must_use]
    pub fn as_preview(&self) -> Self {
        Self {
            intensity: LIGHTNING_PREVIEW_INTENSITY,
            ..self.clone()
        }
    }

    /// Whether this config triggers a one-shot preview.
    #[must_use]
    pub fn is_preview(&self) -> bool {
        self.intensity == LIGHTNING_PREVIEW_INTENSITY
    }

    /// Wire byte holding the days and the enable bit.
    #[must_use]
    pub fn days_byte(&self) -> u8 {
        self.days.to_byte(self.enabled)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidValue`] for an out-of-range intensity or frequency.
    pub fn validate(&self) -> ParseResult<()> {
        if self.intensity > MAX_LIGHTNING_INTENSITY && !self.is_preview() {
            return Err(ParseError::invalid_value(format!(
                "lightning intensity must be 0-{} or 0x{:02X} for preview, got {}",
                MAX_LIGHTNING_INTENSITY, LIGHTNING_PREVIEW_INTENSITY, self.intensity
            )));
        }
        if self.frequency > MAX_LIGHTNING_FREQUENCY {
            return Err(ParseError::invalid_value(format!(
                "lightning frequency must be 0-{}, got {}",
                MAX_LIGHTNING_FREQUENCY, self.frequency
            )));
        }
        Ok(())
    }

    /// Encode as `[intensity, frequency, sH, sM, eH, eM, days]`.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`LightningConfig::validate`].
    pub fn to_bytes(&self) -> ParseResult<[u8; 7]> {
        self.validate()?;
        Ok([
            self.intensity,
            self.frequency,
            self.start.hour(),
            self.start.minute(),
            self.end.hour(),
            self.end.minute(),
            self.days_byte(),
        ])
    }
}

impl Default for LightningConfig {
    fn default() -> Self {
        Self::new(
            50,
            5,
            time::macros::time!(20:00),
            time::macros::time!(21:00),
            DaySet::ALL,
        )
    }
}

/// Maximum brightness percentage.
pub const MAX_BRIGHTNESS: u8 = 100;

/// State reported by the light.
///
/// Under a scheduled mode, `color` and `brightness` are the live values the
/// firmware computed from its schedule, not a static scene definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceState {
    /// Whether the light is on.
    pub power: bool,
    /// Active mode.
    pub mode: Mode,
    /// Master brightness in percent.
    pub brightness: u8,
    /// Current colour output.
    pub color: Color,
}

impl DeviceState {
    /// Size of the state payload.
    pub const PAYLOAD_LEN: usize = 8;

    /// Parse the state notification payload
    /// `[power, mode, brightness, R, G, B, Cool, Warm]`.
    ///
    /// A power byte of `0x01` means on; anything else means off. Trailing bytes
    /// are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InsufficientBytes`] for a short payload and
    /// [`ParseError::UnknownMode`] for an unrecognised mode byte.
    pub fn from_payload(data: &[u8]) -> ParseResult<Self> {
        if data.len() < Self::PAYLOAD_LEN {
            return Err(ParseError::InsufficientBytes {
                expected: Self::PAYLOAD_LEN,
                actual: data.len(),
            });
        }

        Ok(Self {
            power: data[0] == 0x01,
            mode: Mode::try_from(data[1])?,
            brightness: data[2],
            color: Color::from_bytes(&data[3..8])?,
        })
    }

    /// Encode to the state notification payload.
    #[must_use]
    pub fn to_payload(&self) -> [u8; 8] {
        let [r, g, b, c, w] = self.color.to_bytes();
        [
            if self.power { 0x01 } else { 0x02 },
            self.mode.as_byte(),
            self.brightness,
            r,
            g,
            b,
            c,
            w,
        ]
    }
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            power: false,
            mode: Mode::Manual,
            brightness: 0,
            color: Color::OFF,
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} | {}% | {}",
            if self.power { "on" } else { "off" },
            self.mode,
            self.brightness,
            self.color
        )
    }
}

/// Lifecycle state of a protocol session.
///
/// Transitions are strictly ordered from `Disconnected` to `Ready`; `Faulted`
/// is reachable from any state and only left through an explicit disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SessionState {
    /// No transport link.
    #[default]
    Disconnected,
    /// GATT link is up.
    TransportConnected,
    /// Notifications are flowing.
    Subscribed,
    /// Login sent, waiting for or holding the acknowledgement.
    LoggingIn,
    /// Clock being synchronised.
    SyncingTime,
    /// Settling queries in flight.
    Stabilizing,
    /// Accepting commands.
    Ready,
    /// Unrecoverable error; disconnect to reset.
    Faulted,
}

impl SessionState {
    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// # Examples
    ///
    /// ```
    /// use gamalta_types::SessionState;
    ///
    /// assert!(SessionState::Subscribed.can_transition_to(SessionState::LoggingIn));
    /// assert!(!SessionState::Subscribed.can_transition_to(SessionState::Ready));
    /// assert!(SessionState::LoggingIn.can_transition_to(SessionState::Faulted));
    /// ```
    #[must_use]
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (_, Disconnected) => true,
            (Faulted, _) => false,
            (_, Faulted) => true,
            (Disconnected, TransportConnected)
            | (TransportConnected, Subscribed)
            | (Subscribed, LoggingIn)
            | (LoggingIn, SyncingTime)
            | (SyncingTime, Stabilizing)
            | (Stabilizing, Ready) => true,
            _ => false,
        }
    }

    /// Whether commands may be issued.
    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(self, SessionState::Ready)
    }

    /// Whether the handshake is in progress.
    #[must_use]
    pub const fn is_handshaking(self) -> bool {
        use SessionState::*;
        matches!(
            self,
            TransportConnected | Subscribed | LoggingIn | SyncingTime | Stabilizing
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::TransportConnected => "transport connected",
            SessionState::Subscribed => "subscribed",
            SessionState::LoggingIn => "logging in",
            SessionState::SyncingTime => "syncing time",
            SessionState::Stabilizing => "stabilizing",
            SessionState::Ready => "ready",
            SessionState::Faulted => "faulted",
        };
        f.write_str(s)
    }
}

/// A light found while scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceDescriptor {
    /// Advertised name.
    pub name: Option<String>,
    /// Identifier to connect with (MAC address, or platform UUID on macOS).
    pub identifier: String,
    /// Bluetooth address as reported by the adapter.
    pub address: String,
    /// Signal strength in dBm.
    pub rssi: Option<i16>,
}

impl DeviceDescriptor {
    /// Whether the advertised name looks like a Gamalta light.
    #[must_use]
    pub fn is_gamalta(&self) -> bool {
        let prefix = crate::uuid::DEVICE_NAME_PREFIX.to_lowercase();
        self.name
            .as_deref()
            .is_some_and(|n| n.to_lowercase().contains(&prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::time;

    // --- Color tests ---

    #[test]
    fn test_color_wire_order() {
        let color = Color::new(1, 2, 3, 4, 5);
        assert_eq!(color.to_bytes(), [1, 2, 3, 4, 5]);
        assert_eq!(Color::from_bytes(&[1, 2, 3, 4, 5]).unwrap(), color);
    }

    #[test]
    fn test_color_checked_rejects_out_of_range() {
        let err = Color::checked(256, 0, 0, 0, 0).unwrap_err();
        assert!(err.to_string().contains("red"));
        assert!(Color::checked(0, 0, 0, 0, -1).is_err());
        assert_eq!(
            Color::checked(255, 0, 0, 0, 0).unwrap(),
            Color::new(255, 0, 0, 0, 0)
        );
    }

    #[test]
    fn test_color_clamped() {
        assert_eq!(
            Color::clamped(-10, 999, 128, 0, 255),
            Color::new(0, 255, 128, 0, 255)
        );
    }

    #[test]
    fn test_color_from_short_bytes() {
        assert!(matches!(
            Color::from_bytes(&[1, 2, 3]),
            Err(ParseError::InsufficientBytes {
                expected: 5,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_color_display() {
        assert_eq!(Color::rgb(10, 20, 30).to_string(), "R:10 G:20 B:30 C:0 W:0");
    }

    // --- Mode tests ---

    #[test]
    fn test_mode_bytes() {
        assert_eq!(Mode::Manual.as_byte(), 0x00);
        assert_eq!(Mode::SunSync.as_byte(), 0x01);
        assert_eq!(Mode::CoralReef.as_byte(), 0x02);
        assert_eq!(Mode::FishBlue.as_byte(), 0x03);
        assert_eq!(Mode::Waterweed.as_byte(), 0x04);
        assert_eq!(Mode::CustomBasic.as_byte(), 0x0B);
        assert_eq!(Mode::CustomPro.as_byte(), 0x0C);
    }

    #[test]
    fn test_mode_try_from_round_trips_all() {
        for mode in Mode::ALL {
            assert_eq!(Mode::try_from(mode.as_byte()), Ok(mode));
        }
        assert_eq!(Mode::try_from(0x05), Err(ParseError::UnknownMode(0x05)));
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("Manual".parse::<Mode>(), Ok(Mode::Manual));
        assert_eq!("coral_reef".parse::<Mode>(), Ok(Mode::CoralReef));
        assert_eq!("sun-sync".parse::<Mode>(), Ok(Mode::SunSync));
        assert!("disco".parse::<Mode>().is_err());
        for mode in Mode::ALL {
            assert_eq!(mode.name().parse::<Mode>(), Ok(mode));
        }
    }

    #[test]
    fn test_only_manual_is_unscheduled() {
        let unscheduled: Vec<_> = Mode::ALL.into_iter().filter(|m| !m.is_scheduled()).collect();
        assert_eq!(unscheduled, vec![Mode::Manual]);
    }

    // --- DaySet tests ---

    #[test]
    fn test_days_monday_friday_enabled() {
        let days: DaySet = [Weekday::Monday, Weekday::Friday].into_iter().collect();
        assert_eq!(days.bits(), 0x11);
        assert_eq!(days.to_byte(true), 0x91);
    }

    #[test]
    fn test_days_all_disabled() {
        assert_eq!(DaySet::ALL.to_byte(false), 0x7F);
        assert_eq!(DaySet::ALL.to_byte(true), 0xFF);
    }

    #[test]
    fn test_days_presets() {
        assert!(DaySet::WEEKDAYS.contains(Weekday::Friday));
        assert!(!DaySet::WEEKDAYS.contains(Weekday::Saturday));
        assert!(DaySet::WEEKEND.contains(Weekday::Sunday));
        assert_eq!(DaySet::WEEKDAYS.bits() | DaySet::WEEKEND.bits(), DaySet::ALL.bits());
    }

    #[test]
    fn test_days_iter_monday_first() {
        let days: Vec<_> = DaySet::WEEKEND.with(Weekday::Monday).iter().collect();
        assert_eq!(days, vec![Weekday::Monday, Weekday::Saturday, Weekday::Sunday]);
    }

    #[test]
    fn test_days_from_byte() {
        assert_eq!(DaySet::from_byte(0x91), (DaySet::from_bits(0x11), true));
        assert_eq!(DaySet::from_byte(0x7F), (DaySet::ALL, false));
    }

    #[test]
    fn test_days_display() {
        assert_eq!(DaySet::ALL.to_string(), "every day");
        let days: DaySet = [Weekday::Monday, Weekday::Wednesday].into_iter().collect();
        assert_eq!(days.to_string(), "Mon,Wed");
    }

    // --- LightningConfig tests ---

    #[test]
    fn test_lightning_encoding() {
        let days: DaySet = [Weekday::Monday, Weekday::Friday].into_iter().collect();
        let config = LightningConfig::new(100, 10, time!(6:15), time!(23:59), days);
        assert_eq!(config.to_bytes().unwrap(), [100, 10, 6, 15, 23, 59, 0x91]);
    }

    #[test]
    fn test_lightning_disabled_still_encodes() {
        let config = LightningConfig::new(20, 1, time!(1:00), time!(2:00), DaySet::ALL).enabled(false);
        assert_eq!(config.to_bytes().unwrap()[6], 0x7F);
    }

    #[test]
    fn test_lightning_validation() {
        let mut config = LightningConfig::default();
        config.intensity = 101;
        assert!(config.validate().is_err());

        config.intensity = 100;
        config.frequency = 11;
        assert!(config.validate().is_err());

        config.frequency = 10;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_lightning_preview_sentinel() {
        let preview = LightningConfig::preview();
        assert!(preview.is_preview());
        assert_eq!(preview.to_bytes().unwrap(), [0xFE, 5, 0, 0, 0, 0, 0x00]);

        let configured = LightningConfig::new(80, 3, time!(20:00), time!(21:00), DaySet::ALL);
        let as_preview = configured.as_preview();
        assert_eq!(as_preview.to_bytes().unwrap()[0], LIGHTNING_PREVIEW_INTENSITY);
        assert_eq!(as_preview.frequency, 3);
    }

    // --- DeviceState tests ---

    #[test]
    fn test_device_state_from_payload() {
        let state = DeviceState::from_payload(&[0x01, 0x02, 50, 10, 20, 30, 40, 50]).unwrap();
        assert!(state.power);
        assert_eq!(state.mode, Mode::CoralReef);
        assert_eq!(state.brightness, 50);
        assert_eq!(state.color, Color::new(10, 20, 30, 40, 50));
    }

    #[test]
    fn test_device_state_power_off_values() {
        for byte in [0x00, 0x02] {
            let state = DeviceState::from_payload(&[byte, 0, 0, 0, 0, 0, 0, 0]).unwrap();
            assert!(!state.power);
        }
    }

    #[test]
    fn test_device_state_short_payload() {
        assert!(matches!(
            DeviceState::from_payload(&[0x01, 0x00, 50]),
            Err(ParseError::InsufficientBytes {
                expected: 8,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_device_state_unknown_mode() {
        assert_eq!(
            DeviceState::from_payload(&[0x01, 0x09, 0, 0, 0, 0, 0, 0]),
            Err(ParseError::UnknownMode(0x09))
        );
    }

    #[test]
    fn test_device_state_payload_round_trip() {
        let state = DeviceState {
            power: true,
            mode: Mode::FishBlue,
            brightness: 75,
            color: Color::new(0, 0, 0, 255, 76),
        };
        assert_eq!(DeviceState::from_payload(&state.to_payload()).unwrap(), state);
    }

    // --- SessionState tests ---

    #[test]
    fn test_session_state_happy_path_is_ordered() {
        use SessionState::*;
        let path = [
            Disconnected,
            TransportConnected,
            Subscribed,
            LoggingIn,
            SyncingTime,
            Stabilizing,
            Ready,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
        assert!(!Subscribed.can_transition_to(SyncingTime));
        assert!(!Disconnected.can_transition_to(Ready));
    }

    #[test]
    fn test_session_state_faulted_only_exits_to_disconnected() {
        use SessionState::*;
        assert!(Faulted.can_transition_to(Disconnected));
        assert!(!Faulted.can_transition_to(Ready));
        assert!(!Faulted.can_transition_to(TransportConnected));
        assert!(Ready.can_transition_to(Faulted));
    }

    // --- DeviceDescriptor tests ---

    #[test]
    fn test_descriptor_is_gamalta() {
        let mut device = DeviceDescriptor {
            name: Some("GAMALTA-5F21".to_string()),
            identifier: "AA:BB:CC:DD:EE:FF".to_string(),
            address: "AA:BB:CC:DD:EE:FF".to_string(),
            rssi: Some(-60),
        };
        assert!(device.is_gamalta());
        device.name = Some("Fridge".to_string());
        assert!(!device.is_gamalta());
        device.name = None;
        assert!(!device.is_gamalta());
    }
}
