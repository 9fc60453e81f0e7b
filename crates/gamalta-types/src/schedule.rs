//! Keyframe schedules for predicting scheduled-mode output.
//!
//! Scheduled modes are computed by the firmware. A [`Schedule`] reproduces
//! that computation from captured keyframes so a client can estimate what the
//! light shows at a given time of day. Estimates are never authoritative: the
//! next state report from the device replaces them.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::Time;

use crate::types::{Color, Mode};

const MINUTES_PER_DAY: i32 = 24 * 60;

/// One point of a 24 hour schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Keyframe {
    /// Time of day the keyframe applies.
    pub time: Time,
    /// Colour at that time.
    pub color: Color,
    /// Brightness at that time, percent.
    pub brightness: u8,
}

impl Keyframe {
    /// Create a keyframe at `hour:minute`. Out-of-range times fall back to midnight.
    #[must_use]
    pub fn at(hour: u8, minute: u8, color: Color, brightness: u8) -> Self {
        Self {
            time: Time::from_hms(hour, minute, 0).unwrap_or(Time::MIDNIGHT),
            color,
            brightness,
        }
    }

    fn minutes(&self) -> i32 {
        i32::from(self.time.hour()) * 60 + i32::from(self.time.minute())
    }
}

/// A 24 hour keyframe schedule with linear interpolation between keyframes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Schedule {
    /// Mode this schedule describes.
    pub mode: Mode,
    keyframes: Vec<Keyframe>,
}

impl Schedule {
    /// Create a schedule; keyframes are sorted by time of day.
    #[must_use]
    pub fn new(mode: Mode, mut keyframes: Vec<Keyframe>) -> Self {
        keyframes.sort_by_key(Keyframe::minutes);
        Self { mode, keyframes }
    }

    /// Keyframes in time order.
    #[must_use]
    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    /// Estimated colour and brightness at `at`.
    ///
    /// Interpolates linearly between the surrounding keyframes, wrapping across
    /// midnight. An empty schedule yields darkness.
    ///
    /// # Examples
    ///
    /// ```
    /// use gamalta_types::{Color, Keyframe, Mode, Schedule};
    /// use time::macros::time;
    ///
    /// let schedule = Schedule::new(
    ///     Mode::CustomBasic,
    ///     vec![
    ///         Keyframe::at(8, 0, Color::rgb(0, 0, 0), 0),
    ///         Keyframe::at(10, 0, Color::rgb(200, 100, 0), 100),
    ///     ],
    /// );
    /// assert_eq!(schedule.state_at(time!(9:00)), (Color::rgb(100, 50, 0), 50));
    /// ```
    #[must_use]
    pub fn state_at(&self, at: Time) -> (Color, u8) {
        let (Some(first), Some(last)) = (self.keyframes.first(), self.keyframes.last()) else {
            return (Color::OFF, 0);
        };

        let mut now = i32::from(at.hour()) * 60 + i32::from(at.minute());
        let mut prev = last;
        let mut next = first;
        for (i, keyframe) in self.keyframes.iter().enumerate() {
            if keyframe.minutes() <= now {
                prev = keyframe;
                next = &self.keyframes[(i + 1) % self.keyframes.len()];
            } else {
                next = keyframe;
                break;
            }
        }

        let prev_time = prev.minutes();
        let mut next_time = next.minutes();
        if next_time <= prev_time {
            next_time += MINUTES_PER_DAY;
            if now < prev_time {
                now += MINUTES_PER_DAY;
            }
        }

        let t = if next_time == prev_time {
            0.0
        } else {
            (f64::from(now - prev_time) / f64::from(next_time - prev_time)).clamp(0.0, 1.0)
        };
        let lerp = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8;

        let color = Color::new(
            lerp(prev.color.red, next.color.red),
            lerp(prev.color.green, next.color.green),
            lerp(prev.color.blue, next.color.blue),
            lerp(prev.color.cool_white, next.color.cool_white),
            lerp(prev.color.warm_white, next.color.warm_white),
        );
        (color, lerp(prev.brightness, next.brightness))
    }

    /// Built-in schedule captured from the vendor app, if one is known for `mode`.
    #[must_use]
    pub fn builtin(mode: Mode) -> Option<Self> {
        match mode {
            Mode::FishBlue => Some(Self::new(mode, fish_blue())),
            _ => None,
        }
    }
}

fn fish_blue() -> Vec<Keyframe> {
    let k = |h, m, r, g, b, c, w, brightness| Keyframe::at(h, m, Color::new(r, g, b, c, w), brightness);
    vec![
        k(5, 20, 0, 0, 0, 234, 70, 46),
        k(6, 0, 0, 0, 0, 255, 76, 50),
        k(8, 0, 0, 0, 0, 255, 76, 75),
        k(9, 0, 64, 64, 64, 255, 38, 75),
        k(10, 0, 127, 127, 127, 255, 0, 75),
        k(11, 0, 191, 191, 191, 255, 0, 88),
        k(12, 0, 255, 255, 255, 255, 0, 100),
        k(13, 0, 255, 255, 255, 255, 128, 100),
        k(14, 0, 255, 255, 255, 255, 255, 100),
        k(15, 0, 191, 191, 255, 191, 255, 85),
        k(16, 0, 127, 127, 255, 127, 255, 70),
        k(17, 0, 127, 89, 191, 64, 191, 50),
        k(18, 0, 127, 51, 127, 0, 127, 30),
        k(18, 15, 118, 43, 126, 0, 118, 24),
        k(19, 0, 89, 26, 127, 0, 89, 20),
        k(20, 0, 51, 0, 127, 0, 51, 10),
        k(21, 0, 26, 0, 64, 0, 26, 5),
        k(22, 0, 0, 0, 0, 0, 0, 0),
    ]
}
