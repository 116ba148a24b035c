//! Evergreen thresholds and batch parameters
//!
//! Stored in the `settings` table; defaults are seeded by
//! `almaseo_common::db::init_database`.

use almaseo_common::db::{get_setting_or, set_settings};
use almaseo_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

/// Longest accepted `rescore_after_days` (ten years)
pub const MAX_RESCORE_AFTER_DAYS: i64 = 3_650;

/// Shortest accepted scan interval
pub const MIN_SCAN_INTERVAL_SECS: u64 = 60;

/// Longest accepted scan interval (30 days)
pub const MAX_SCAN_INTERVAL_SECS: u64 = 30 * 86_400;

/// Evergreen configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvergreenSettings {
    /// Days without update before an item needs watching (default: 180)
    pub watch_days: i64,
    /// Days without update before an item is stale (default: 365)
    pub stale_days: i64,
    /// Traffic decline in percent that flags watch (default: 20)
    pub watch_traffic_drop: f64,
    /// Traffic decline in percent that flags stale (default: 40)
    pub stale_traffic_drop: f64,
    /// Soften stale verdicts for seasonal content (default: true)
    pub seasonal_detection: bool,
    /// Items per batch page (default: 50)
    pub batch_size: i64,
    /// Scores older than this are picked up again by non-forced runs (default: 7)
    pub rescore_after_days: i64,
    /// Recurring batch interval (default: 86400 = daily)
    pub scan_interval_secs: u64,
    /// Dashboard aggregate cache lifetime (default: 3600)
    pub cache_ttl_secs: u64,
}

impl Default for EvergreenSettings {
    fn default() -> Self {
        Self {
            watch_days: 180,
            stale_days: 365,
            watch_traffic_drop: 20.0,
            stale_traffic_drop: 40.0,
            seasonal_detection: true,
            batch_size: 50,
            rescore_after_days: 7,
            scan_interval_secs: 86_400,
            cache_ttl_secs: 3_600,
        }
    }
}

impl EvergreenSettings {
    /// Load settings from the database, falling back to defaults per key
    pub async fn from_database(db: &SqlitePool) -> Result<Self> {
        let defaults = Self::default();

        let seasonal: String = get_setting_or(
            db,
            "evergreen_seasonal_detection",
            defaults.seasonal_detection.to_string(),
        )
        .await?;

        Ok(Self {
            watch_days: get_setting_or(db, "evergreen_watch_days", defaults.watch_days).await?,
            stale_days: get_setting_or(db, "evergreen_stale_days", defaults.stale_days).await?,
            watch_traffic_drop: get_setting_or(
                db,
                "evergreen_watch_traffic_drop",
                defaults.watch_traffic_drop,
            )
            .await?,
            stale_traffic_drop: get_setting_or(
                db,
                "evergreen_stale_traffic_drop",
                defaults.stale_traffic_drop,
            )
            .await?,
            seasonal_detection: seasonal.trim().eq_ignore_ascii_case("true")
                || seasonal.trim() == "1",
            batch_size: get_setting_or(db, "evergreen_batch_size", defaults.batch_size).await?,
            rescore_after_days: get_setting_or(
                db,
                "evergreen_rescore_after_days",
                defaults.rescore_after_days,
            )
            .await?,
            scan_interval_secs: get_setting_or(
                db,
                "evergreen_scan_interval_secs",
                defaults.scan_interval_secs,
            )
            .await?,
            cache_ttl_secs: get_setting_or(db, "evergreen_cache_ttl_secs", defaults.cache_ttl_secs)
                .await?,
        })
    }

    /// Check threshold ordering and ranges
    pub fn validate(&self) -> Result<()> {
        if self.watch_days <= 0 || self.watch_days > self.stale_days {
            return Err(Error::InvalidInput(format!(
                "watch_days must be positive and not exceed stale_days (got {} / {})",
                self.watch_days, self.stale_days
            )));
        }

        if !(self.watch_traffic_drop > 0.0
            && self.watch_traffic_drop <= self.stale_traffic_drop
            && self.stale_traffic_drop <= 100.0)
        {
            return Err(Error::InvalidInput(format!(
                "traffic drops must satisfy 0 < watch <= stale <= 100 (got {} / {})",
                self.watch_traffic_drop, self.stale_traffic_drop
            )));
        }

        if !(1..=1000).contains(&self.batch_size) {
            return Err(Error::InvalidInput(format!(
                "batch_size must be between 1 and 1000 (got {})",
                self.batch_size
            )));
        }

        if !(0..=MAX_RESCORE_AFTER_DAYS).contains(&self.rescore_after_days) {
            return Err(Error::InvalidInput(format!(
                "rescore_after_days must be between 0 and {} (got {})",
                MAX_RESCORE_AFTER_DAYS, self.rescore_after_days
            )));
        }

        if !(MIN_SCAN_INTERVAL_SECS..=MAX_SCAN_INTERVAL_SECS).contains(&self.scan_interval_secs) {
            return Err(Error::InvalidInput(format!(
                "scan_interval_secs must be between {} and {} (got {})",
                MIN_SCAN_INTERVAL_SECS, MAX_SCAN_INTERVAL_SECS, self.scan_interval_secs
            )));
        }

        Ok(())
    }

    /// Validate and persist every field
    ///
    /// Nothing is written when validation fails, and the values are stored
    /// in a single transaction.
    pub async fn save(&self, db: &SqlitePool) -> Result<()> {
        self.validate()?;

        let values = [
            ("evergreen_watch_days", self.watch_days.to_string()),
            ("evergreen_stale_days", self.stale_days.to_string()),
            ("evergreen_watch_traffic_drop", self.watch_traffic_drop.to_string()),
            ("evergreen_stale_traffic_drop", self.stale_traffic_drop.to_string()),
            ("evergreen_seasonal_detection", self.seasonal_detection.to_string()),
            ("evergreen_batch_size", self.batch_size.to_string()),
            ("evergreen_rescore_after_days", self.rescore_after_days.to_string()),
            ("evergreen_scan_interval_secs", self.scan_interval_secs.to_string()),
            ("evergreen_cache_ttl_secs", self.cache_ttl_secs.to_string()),
        ];

        set_settings(db, &values).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(EvergreenSettings::default().validate().is_ok());
    }

    #[test]
    fn test_watch_days_must_not_exceed_stale_days() {
        let settings = EvergreenSettings {
            watch_days: 400,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_equal_day_thresholds_allowed() {
        let settings = EvergreenSettings {
            watch_days: 365,
            ..Default::default()
        };
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_traffic_drop_ordering() {
        let settings = EvergreenSettings {
            watch_traffic_drop: 50.0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());

        let settings = EvergreenSettings {
            watch_traffic_drop: 0.0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());

        let settings = EvergreenSettings {
            stale_traffic_drop: 120.0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_batch_size_bounds() {
        for batch_size in [0, 1001] {
            let settings = EvergreenSettings {
                batch_size,
                ..Default::default()
            };
            assert!(settings.validate().is_err(), "batch_size {} accepted", batch_size);
        }
    }

    #[test]
    fn test_scan_interval_bounds() {
        for scan_interval_secs in [5, MAX_SCAN_INTERVAL_SECS + 1, u64::MAX] {
            let settings = EvergreenSettings {
                scan_interval_secs,
                ..Default::default()
            };
            assert!(settings.validate().is_err(), "interval {} accepted", scan_interval_secs);
        }

        let settings = EvergreenSettings {
            scan_interval_secs: MAX_SCAN_INTERVAL_SECS,
            ..Default::default()
        };
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_rescore_after_days_bounds() {
        for rescore_after_days in [-1, MAX_RESCORE_AFTER_DAYS + 1, i64::MAX / 2] {
            let settings = EvergreenSettings {
                rescore_after_days,
                ..Default::default()
            };
            assert!(settings.validate().is_err(), "{} days accepted", rescore_after_days);
        }

        let settings = EvergreenSettings {
            rescore_after_days: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_ok());
    }
}
