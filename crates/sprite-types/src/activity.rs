//! Activity scoring rule shared by the store and its callers.
//!
//! A score is bumped only by messages spaced out between the debounce and
//! growth windows, decays in the window after that, and resets once the
//! gap exceeds the reset horizon.

pub const SCORE_MIN: u8 = 1;
pub const SCORE_MAX: u8 = 10;

/// Messages closer together than this leave the score alone.
pub const DEBOUNCE_SECS: i64 = 90;

/// Upper bound (inclusive) of the gap that still earns a point.
pub const GROWTH_WINDOW_SECS: i64 = 20 * 60;

/// Gaps beyond this reset the score, and rows older than this are pruned.
pub const RESET_HORIZON_SECS: i64 = 30 * 60;

/// Compute the next score given the current one and the seconds since the
/// previous tracked message.
pub fn next_score(score: u8, delta_secs: i64) -> u8 {
    if delta_secs < DEBOUNCE_SECS {
        score
    } else if delta_secs <= GROWTH_WINDOW_SECS {
        score.saturating_add(1).min(SCORE_MAX)
    } else if delta_secs <= RESET_HORIZON_SECS {
        score.saturating_sub(1).max(SCORE_MIN)
    } else {
        SCORE_MIN
    }
}
