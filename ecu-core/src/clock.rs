//! Wrap-safe bookkeeping for the 16-bit millisecond tick counter.
//!
//! The tick source is a free-running 16-bit counter that wraps roughly every
//! 65.5 seconds. Elapsed times are computed with wrapping subtraction, and
//! every tracked timestamp is slid forward once per control cycle so a
//! long-lived timestamp can never appear to sit in the future after a wrap.

/// Millisecond tick in the wrapping 16-bit counter domain.
pub type TickMs = u16;

/// Oldest age a tracked timestamp is allowed to reach before it is pinned.
///
/// Half the counter range: any wrapping delta above this value is
/// indistinguishable from a timestamp in the future.
pub const MAX_TRACKED_AGE_MS: u16 = i16::MAX as u16;

/// Wrapping elapsed time between a stored timestamp and `now`.
#[must_use]
pub const fn elapsed_ms(now: TickMs, then: TickMs) -> u16 {
    now.wrapping_sub(then)
}

/// Slides a timestamp forward when its age exceeds [`MAX_TRACKED_AGE_MS`].
///
/// Returns the timestamp unchanged while it is younger than half the counter
/// range, otherwise pins it to exactly `MAX_TRACKED_AGE_MS` ticks in the
/// past. Called once per control cycle for every tracked timestamp.
#[must_use]
pub const fn slide(timestamp: TickMs, now: TickMs) -> TickMs {
    if now.wrapping_sub(timestamp) > MAX_TRACKED_AGE_MS {
        now.wrapping_sub(MAX_TRACKED_AGE_MS)
    } else {
        timestamp
    }
}
