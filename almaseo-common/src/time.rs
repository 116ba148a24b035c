//! Timestamp utilities
//!
//! Content timestamps are stored as unix seconds (UTC).

use chrono::{DateTime, Utc};

/// Seconds in one day
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current time as unix seconds
pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}

/// Convert unix seconds to a UTC timestamp
///
/// Returns None for values outside chrono's representable range.
pub fn from_unix(seconds: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, 0)
}

/// Whole days elapsed from `earlier` to `now` (unix seconds)
///
/// Timestamps in the future clamp to zero.
pub fn days_since(earlier: i64, now: i64) -> i64 {
    (now - earlier).max(0) / SECONDS_PER_DAY
}
