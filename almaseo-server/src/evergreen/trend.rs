//! Traffic trend between two 90-day click windows

use serde::{Deserialize, Serialize};

/// Click counts for the current and the preceding 90-day window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficWindow {
    pub clicks_current: u64,
    pub clicks_previous: u64,
}

impl TrafficWindow {
    pub fn new(clicks_current: u64, clicks_previous: u64) -> Self {
        Self {
            clicks_current,
            clicks_previous,
        }
    }

    /// Signed percentage change, see [`traffic_trend`]
    pub fn trend(&self) -> f64 {
        traffic_trend(self.clicks_current, self.clicks_previous)
    }
}

/// Signed percentage change from `previous` to `current`, one decimal place
///
/// - both zero → `0.0`
/// - previous zero, current positive → `100.0`
/// - otherwise `round(100 * (current - previous) / previous, 1)`
///
/// Rounding is half away from zero.
pub fn traffic_trend(current: u64, previous: u64) -> f64 {
    if previous == 0 {
        return if current == 0 { 0.0 } else { 100.0 };
    }

    let change = (current as f64 - previous as f64) / previous as f64 * 100.0;
    (change * 10.0).round() / 10.0
}
