//! Custom scene editing model.
//!
//! A custom scene is five time windows, each with a colour and brightness.
//! Writing one to the device is a strict sub-sequence: start the edit, write
//! points 1 to 5 in order, write the metadata blob, write the finalize
//! sentinel, then activate the scene. Skipping the sentinel leaves the scene
//! undefined on the device.

use serde::{Deserialize, Serialize};
use time::Time;

use gamalta_types::{Color, MAX_BRIGHTNESS, Mode};

use crate::commands::Command;
use crate::error::{Error, Result};

/// Number of points in a custom scene.
pub const SCENE_POINT_COUNT: usize = 5;

/// Point index that finalizes a scene edit.
pub const FINALIZE_POINT: u8 = 0xFF;

/// Which custom scene slot is being edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneKind {
    /// Slot edited by the vendor app's basic editor.
    Basic,
    /// Slot edited by the vendor app's pro editor.
    Pro,
}

impl SceneKind {
    /// Mode that plays this scene.
    pub fn mode(self) -> Mode {
        match self {
            SceneKind::Basic => Mode::CustomBasic,
            SceneKind::Pro => Mode::CustomPro,
        }
    }

    /// Scene id used by the edit and query commands.
    pub fn scene_id(self) -> u8 {
        self.mode().as_byte()
    }

    /// Metadata blob written after the points.
    ///
    /// Captured from the vendor app; the meaning of the individual bytes is
    /// not known, so they are replayed verbatim.
    pub fn metadata(self) -> [u8; 3] {
        match self {
            SceneKind::Basic => [0xB6, 0x9C, 0x9C],
            SceneKind::Pro => [0xD5, 0xAA, 0xCA],
        }
    }
}

impl TryFrom<Mode> for SceneKind {
    type Error = Error;

    fn try_from(mode: Mode) -> Result<Self> {
        match mode {
            Mode::CustomBasic => Ok(SceneKind::Basic),
            Mode::CustomPro => Ok(SceneKind::Pro),
            other => Err(Error::invalid_argument(format!(
                "{} is not a custom scene mode",
                other
            ))),
        }
    }
}

/// One time window of a custom scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenePoint {
    /// Start of the window.
    pub start: Time,
    /// End of the window. May be earlier than `start` for windows spanning midnight.
    pub end: Time,
    /// Colour during the window.
    pub color: Color,
    /// Brightness during the window, 0-100.
    pub brightness: u8,
}

impl ScenePoint {
    /// Create a scene point.
    pub fn new(start: Time, end: Time, color: Color, brightness: u8) -> Self {
        Self {
            start,
            end,
            color,
            brightness,
        }
    }

    /// Whether `at` falls inside this window.
    pub fn contains(&self, at: Time) -> bool {
        if self.start <= self.end {
            self.start <= at && at < self.end
        } else {
            at >= self.start || at < self.end
        }
    }

    /// Encode as the write payload for point `index`.
    pub(crate) fn to_payload(&self, index: u8) -> [u8; 11] {
        let [r, g, b, c, w] = self.color.to_bytes();
        [
            index,
            self.start.hour(),
            self.start.minute(),
            self.end.hour(),
            self.end.minute(),
            r,
            g,
            b,
            c,
            w,
            self.brightness,
        ]
    }

    fn validate(&self) -> Result<()> {
        if self.brightness > MAX_BRIGHTNESS {
            return Err(Error::invalid_argument(format!(
                "scene point brightness must be 0-{}, got {}",
                MAX_BRIGHTNESS, self.brightness
            )));
        }
        Ok(())
    }
}

/// A complete custom scene.
///
/// # Examples
///
/// ```
/// use gamalta_core::{Color, SceneDefinition, SceneKind, ScenePoint};
/// use time::macros::time;
///
/// let point = |start, end, blue, brightness| {
///     ScenePoint::new(start, end, Color::rgb(0, 0, blue), brightness)
/// };
/// let scene = SceneDefinition::new(
///     SceneKind::Basic,
///     [
///         point(time!(6:00), time!(9:00), 80, 30),
///         point(time!(9:00), time!(12:00), 160, 60),
///         point(time!(12:00), time!(16:00), 255, 100),
///         point(time!(16:00), time!(20:00), 160, 60),
///         point(time!(20:00), time!(6:00), 0, 0),
///     ],
/// );
///
/// let commands = scene.edit_commands().unwrap();
/// assert_eq!(commands.len(), 8);
/// assert_eq!(scene.active_point(time!(22:00)).brightness, 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneDefinition {
    /// Target slot.
    pub kind: SceneKind,
    /// Points 1 to 5, in order.
    pub points: [ScenePoint; SCENE_POINT_COUNT],
}

impl SceneDefinition {
    /// Create a scene definition.
    pub fn new(kind: SceneKind, points: [ScenePoint; SCENE_POINT_COUNT]) -> Self {
        Self { kind, points }
    }

    /// Check every point.
    pub fn validate(&self) -> Result<()> {
        self.points.iter().try_for_each(ScenePoint::validate)
    }

    /// Point whose window contains `at`, or the first point if none does.
    pub fn active_point(&self, at: Time) -> &ScenePoint {
        self.points
            .iter()
            .find(|point| point.contains(at))
            .unwrap_or(&self.points[0])
    }

    /// The write sequence up to and including the finalize sentinel.
    ///
    /// Activation is not included; it depends on the time of day and is
    /// sequenced by the session.
    pub fn edit_commands(&self) -> Result<Vec<Command>> {
        self.validate()?;

        let mut commands = Vec::with_capacity(SCENE_POINT_COUNT + 3);
        commands.push(Command::SceneEditStart(self.kind));
        for (index, point) in (1u8..).zip(self.points.iter()) {
            commands.push(Command::ScenePoint {
                index,
                point: *point,
            });
        }
        commands.push(Command::SceneMetadata(self.kind));
        commands.push(Command::SceneFinalize);
        Ok(commands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gamalta_types::opcode;
    use time::macros::time;

    fn sample() -> SceneDefinition {
        let point = |start, end, level| ScenePoint::new(start, end, Color::white(level, level), level);
        SceneDefinition::new(
            SceneKind::Pro,
            [
                point(time!(7:00), time!(10:00), 20),
                point(time!(10:00), time!(13:00), 60),
                point(time!(13:00), time!(17:00), 100),
                point(time!(17:00), time!(21:00), 40),
                point(time!(21:00), time!(23:00), 5),
            ],
        )
    }

    #[test]
    fn test_scene_kind_ids_and_metadata() {
        assert_eq!(SceneKind::Basic.scene_id(), 0x0B);
        assert_eq!(SceneKind::Pro.scene_id(), 0x0C);
        assert_eq!(SceneKind::Basic.metadata(), [0xB6, 0x9C, 0x9C]);
        assert_eq!(SceneKind::Pro.metadata(), [0xD5, 0xAA, 0xCA]);
        assert_eq!(SceneKind::try_from(Mode::CustomPro).unwrap(), SceneKind::Pro);
        assert!(SceneKind::try_from(Mode::FishBlue).is_err());
    }

    #[test]
    fn test_point_contains_handles_midnight() {
        let night = ScenePoint::new(time!(22:00), time!(6:00), Color::OFF, 0);
        assert!(night.contains(time!(23:30)));
        assert!(night.contains(time!(3:00)));
        assert!(!night.contains(time!(6:00)));
        assert!(!night.contains(time!(12:00)));
    }

    #[test]
    fn test_active_point_falls_back_to_first() {
        let scene = sample();
        assert_eq!(scene.active_point(time!(11:00)).brightness, 60);
        // 23:00 - 07:00 is not covered by any window
        assert_eq!(scene.active_point(time!(2:00)).brightness, 20);
    }

    #[test]
    fn test_edit_commands_order() {
        let commands = sample().edit_commands().unwrap();
        let opcodes: Vec<u8> = commands.iter().map(Command::opcode).collect();
        assert_eq!(
            opcodes,
            vec![
                opcode::SCENE_EDIT_START,
                opcode::SCENE_POINT,
                opcode::SCENE_POINT,
                opcode::SCENE_POINT,
                opcode::SCENE_POINT,
                opcode::SCENE_POINT,
                opcode::SCENE_METADATA,
                opcode::SCENE_POINT,
            ]
        );
        for (expected, command) in (1u8..=5).zip(&commands[1..6]) {
            assert!(matches!(command, Command::ScenePoint { index, .. } if *index == expected));
        }
        assert_eq!(commands[7], Command::SceneFinalize);
    }

    #[test]
    fn test_point_payload_layout() {
        let point = ScenePoint::new(time!(6:30), time!(9:15), Color::new(1, 2, 3, 4, 5), 70);
        assert_eq!(point.to_payload(2), [2, 6, 30, 9, 15, 1, 2, 3, 4, 5, 70]);
    }

    #[test]
    fn test_invalid_brightness_rejected() {
        let mut scene = sample();
        scene.points[3].brightness = 101;
        assert!(matches!(scene.edit_commands(), Err(Error::InvalidArgument(_))));
    }
}
