//! Poll-budget arithmetic for refill attempts.
//!
//! The budget is measured from the last observed activity rather than from
//! the start of the attempt, so a consumer that is mid-frame gets the full
//! inactivity window again every time a byte arrives.

use core::time::Duration;
use std::time::Instant;

/// Upper bound on a single poll: `i32::MAX` milliseconds, the largest timeout
/// a millisecond-based `poll` call can express.
pub const MAX_POLL_TIMEOUT: Duration = Duration::from_millis(i32::MAX as u64);

/// Compute how long the next poll may block.
///
/// - `wait == false` always yields zero (non-blocking drain).
/// - Otherwise the remainder of `window` after `last_activity`, zero once the
///   window has elapsed, and never more than [`MAX_POLL_TIMEOUT`].
///
/// A `now` earlier than `last_activity` counts as no time elapsed.
#[must_use]
pub fn poll_budget(wait: bool, now: Instant, last_activity: Instant, window: Duration) -> Duration {
    if !wait {
        return Duration::ZERO;
    }
    let elapsed = now.saturating_duration_since(last_activity);
    window
        .checked_sub(elapsed)
        .map_or(Duration::ZERO, |remaining| remaining.min(MAX_POLL_TIMEOUT))
}
