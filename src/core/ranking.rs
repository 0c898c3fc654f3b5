//! The score engine: a pure, time-decayed ranking value.
//!
//! `(vote_sum + 0.5 * comment_count) / (hours_since + 2)^1.5` — the classic
//! gravity formula with comments weighted in. Only the "top" sort uses it;
//! "discussed" ranks by raw comment count and "new" by creation time.

pub const COMMENT_WEIGHT: f64 = 0.5;
pub const HOURS_OFFSET: f64 = 2.0;
pub const DECAY_EXPONENT: f64 = 1.5;

const MS_PER_HOUR: f64 = 3_600_000.0;

/// Deterministic given `now_ms`. `hours_since` may be negative under clock
/// skew; a non-positive denominator degrades to the unscaled numerator.
pub fn ranking_score(vote_sum: i64, comment_count: i64, created_at_ms: i64, now_ms: i64) -> f64 {
    let numerator = vote_sum as f64 + COMMENT_WEIGHT * comment_count as f64;
    let hours_since = (now_ms - created_at_ms) as f64 / MS_PER_HOUR;
    let denominator = (hours_since + HOURS_OFFSET).powf(DECAY_EXPONENT);
    if denominator > 0.0 {
        numerator / denominator
    } else {
        numerator
    }
}
