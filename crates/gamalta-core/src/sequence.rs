//! Per-connection frame sequence numbering.
//!
//! Every outgoing frame carries a sequence byte. The device silently drops a
//! frame whose sequence equals the one before it, so the counter only ever
//! moves forward. The starting point is randomised per connection to avoid
//! colliding with the vendor app if it was connected just before.

use rand::Rng;

/// Lowest randomised starting value.
pub const INITIAL_MIN: u8 = 10;

/// Highest randomised starting value.
pub const INITIAL_MAX: u8 = 100;

/// Sequence counter, wrapping modulo 256.
///
/// Owned by a single session command channel; not synchronised.
///
/// # Examples
///
/// ```
/// use gamalta_core::SequenceCounter;
///
/// let mut seq = SequenceCounter::starting_at(0xFE);
/// assert_eq!(seq.next(), 0xFF);
/// assert_eq!(seq.next(), 0x00);
/// assert_eq!(seq.current(), 0x00);
/// ```
#[derive(Debug, Clone)]
pub struct SequenceCounter {
    current: u8,
}

impl SequenceCounter {
    /// Counter starting at a random value in `INITIAL_MIN..=INITIAL_MAX`.
    pub fn random() -> Self {
        Self {
            current: rand::rng().random_range(INITIAL_MIN..=INITIAL_MAX),
        }
    }

    /// Counter starting at a fixed value.
    pub fn starting_at(value: u8) -> Self {
        Self { current: value }
    }

    /// Last value handed out (or the starting value).
    pub fn current(&self) -> u8 {
        self.current
    }

    /// Advance and return the new value, wrapping 255 to 0.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> u8 {
        self.current = self.current.wrapping_add(1);
        self.current
    }

    /// Pick a fresh random starting value, as on a new connection.
    pub fn reset(&mut self) {
        *self = Self::random();
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::random()
    }
}
