//! Content age from publish/modify timestamps

use almaseo_common::time::days_since;
use serde::Serialize;

/// Age of a content item in whole days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContentAge {
    /// Days since first publication
    pub published_days: i64,
    /// Days since the last meaningful update
    pub updated_days: i64,
}

impl ContentAge {
    /// Derive age from unix-second timestamps
    ///
    /// A missing modify timestamp, or one earlier than the publish timestamp,
    /// counts as "never updated" and falls back to the publish time.
    pub fn from_timestamps(published_at: i64, modified_at: Option<i64>, now: i64) -> Self {
        let last_update = modified_at
            .map(|modified| modified.max(published_at))
            .unwrap_or(published_at);

        Self {
            published_days: days_since(published_at, now),
            updated_days: days_since(last_update, now),
        }
    }
}
