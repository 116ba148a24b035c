//! Evergreen status scoring
//!
//! # Decision order
//! 1. Pinned items are always evergreen.
//! 2. Stale: `updated_days > stale_days` OR `trend <= -stale_traffic_drop`.
//! 3. Watch: `updated_days > watch_days` OR `trend <= -watch_traffic_drop`.
//! 4. Otherwise evergreen.
//!
//! Seasonal content turns a stale verdict into watch; evergreen and watch
//! verdicts are left alone. Items without traffic data are judged on age only.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::age::ContentAge;
use super::settings::EvergreenSettings;

/// Freshness classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvergreenStatus {
    /// Still fresh and relevant
    Evergreen,
    /// Trending toward staleness, flagged for review
    Watch,
    /// Outdated by age or traffic decline
    Stale,
}

impl EvergreenStatus {
    pub const ALL: [EvergreenStatus; 3] = [Self::Evergreen, Self::Watch, Self::Stale];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Evergreen => "evergreen",
            Self::Watch => "watch",
            Self::Stale => "stale",
        }
    }
}

impl fmt::Display for EvergreenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvergreenStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "evergreen" | "fresh" => Ok(Self::Evergreen),
            "watch" => Ok(Self::Watch),
            "stale" => Ok(Self::Stale),
            other => Err(format!("unknown evergreen status: {}", other)),
        }
    }
}

/// Signals for one content item
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreInput {
    pub age: ContentAge,
    /// Percentage traffic change; None when no traffic data exists
    pub trend: Option<f64>,
    /// Matched seasonal marker, if any
    pub seasonal_marker: Option<String>,
    pub pinned: bool,
}

/// Verdict with the reasons that produced it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreResult {
    pub status: EvergreenStatus,
    pub reasons: Vec<String>,
}

/// Classify one item
pub fn score(input: &ScoreInput, settings: &EvergreenSettings) -> ScoreResult {
    if input.pinned {
        return ScoreResult {
            status: EvergreenStatus::Evergreen,
            reasons: vec!["Pinned as evergreen".to_string()],
        };
    }

    let updated_days = input.age.updated_days;
    let mut reasons = Vec::new();

    let stale_by_age = updated_days > settings.stale_days;
    let stale_by_traffic = input
        .trend
        .is_some_and(|trend| trend <= -settings.stale_traffic_drop);

    let mut status = if stale_by_age || stale_by_traffic {
        if stale_by_age {
            reasons.push(format!(
                "Not updated in {} days (stale after {})",
                updated_days, settings.stale_days
            ));
        }
        if stale_by_traffic {
            reasons.push(traffic_reason(input.trend, settings.stale_traffic_drop));
        }
        EvergreenStatus::Stale
    } else {
        let watch_by_age = updated_days > settings.watch_days;
        let watch_by_traffic = input
            .trend
            .is_some_and(|trend| trend <= -settings.watch_traffic_drop);

        if watch_by_age {
            reasons.push(format!(
                "Not updated in {} days (watch after {})",
                updated_days, settings.watch_days
            ));
        }
        if watch_by_traffic {
            reasons.push(traffic_reason(input.trend, settings.watch_traffic_drop));
        }

        if watch_by_age || watch_by_traffic {
            EvergreenStatus::Watch
        } else {
            EvergreenStatus::Evergreen
        }
    };

    if status == EvergreenStatus::Stale {
        if let Some(marker) = &input.seasonal_marker {
            reasons.push(format!(
                "Seasonal content (\"{}\"): stale verdict softened to watch",
                marker
            ));
            status = EvergreenStatus::Watch;
        }
    }

    if status == EvergreenStatus::Evergreen {
        reasons.push(format!("Updated {} days ago", updated_days));
        if let Some(trend) = input.trend {
            reasons.push(format!("Traffic {:+.1}% over the last 90 days", trend));
        }
    }

    ScoreResult { status, reasons }
}

fn traffic_reason(trend: Option<f64>, threshold: f64) -> String {
    format!(
        "Traffic down {:.1}% over the last 90 days (threshold {:.1}%)",
        trend.map(f64::abs).unwrap_or_default(),
        threshold
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(updated_days: i64, trend: Option<f64>) -> ScoreInput {
        ScoreInput {
            age: ContentAge {
                published_days: updated_days + 30,
                updated_days,
            },
            trend,
            seasonal_marker: None,
            pinned: false,
        }
    }

    fn status_of(input: &ScoreInput) -> EvergreenStatus {
        score(input, &EvergreenSettings::default()).status
    }

    #[test]
    fn test_recent_content_is_evergreen() {
        let result = score(&input(10, Some(5.0)), &EvergreenSettings::default());
        assert_eq!(result.status, EvergreenStatus::Evergreen);
        assert_eq!(result.reasons[0], "Updated 10 days ago");
        assert_eq!(result.reasons[1], "Traffic +5.0% over the last 90 days");
    }

    #[test]
    fn test_age_thresholds_are_strict() {
        assert_eq!(status_of(&input(180, None)), EvergreenStatus::Evergreen);
        assert_eq!(status_of(&input(181, None)), EvergreenStatus::Watch);
        assert_eq!(status_of(&input(365, None)), EvergreenStatus::Watch);
        assert_eq!(status_of(&input(366, None)), EvergreenStatus::Stale);
    }

    #[test]
    fn test_traffic_thresholds_are_inclusive() {
        assert_eq!(status_of(&input(10, Some(-19.9))), EvergreenStatus::Evergreen);
        assert_eq!(status_of(&input(10, Some(-20.0))), EvergreenStatus::Watch);
        assert_eq!(status_of(&input(10, Some(-39.9))), EvergreenStatus::Watch);
        assert_eq!(status_of(&input(10, Some(-40.0))), EvergreenStatus::Stale);
    }

    #[test]
    fn test_missing_traffic_judged_on_age_only() {
        assert_eq!(status_of(&input(10, None)), EvergreenStatus::Evergreen);
    }

    #[test]
    fn test_stale_reasons_name_both_signals() {
        let result = score(&input(400, Some(-55.0)), &EvergreenSettings::default());
        assert_eq!(result.status, EvergreenStatus::Stale);
        assert_eq!(result.reasons.len(), 2);
        assert!(result.reasons[0].contains("400 days"));
        assert!(result.reasons[1].contains("55.0%"));
    }

    #[test]
    fn test_pinned_overrides_everything() {
        let mut pinned = input(2000, Some(-100.0));
        pinned.pinned = true;
        let result = score(&pinned, &EvergreenSettings::default());
        assert_eq!(result.status, EvergreenStatus::Evergreen);
        assert_eq!(result.reasons, vec!["Pinned as evergreen".to_string()]);
    }

    #[test]
    fn test_seasonal_softens_stale_to_watch() {
        let mut seasonal = input(400, None);
        seasonal.seasonal_marker = Some("christmas".to_string());
        let result = score(&seasonal, &EvergreenSettings::default());
        assert_eq!(result.status, EvergreenStatus::Watch);
        assert!(result.reasons.last().unwrap().contains("christmas"));
    }

    #[test]
    fn test_seasonal_does_not_touch_watch_or_evergreen() {
        let mut watch = input(200, None);
        watch.seasonal_marker = Some("summer".to_string());
        assert_eq!(status_of(&watch), EvergreenStatus::Watch);

        let mut fresh = input(5, None);
        fresh.seasonal_marker = Some("summer".to_string());
        assert_eq!(status_of(&fresh), EvergreenStatus::Evergreen);
    }

    #[test]
    fn test_custom_thresholds() {
        let settings = EvergreenSettings {
            watch_days: 30,
            stale_days: 90,
            watch_traffic_drop: 10.0,
            stale_traffic_drop: 25.0,
            ..Default::default()
        };
        assert_eq!(score(&input(31, None), &settings).status, EvergreenStatus::Watch);
        assert_eq!(score(&input(91, None), &settings).status, EvergreenStatus::Stale);
        assert_eq!(score(&input(1, Some(-25.0)), &settings).status, EvergreenStatus::Stale);
    }

    #[test]
    fn test_status_parse_and_display() {
        for status in EvergreenStatus::ALL {
            assert_eq!(status.to_string().parse::<EvergreenStatus>().unwrap(), status);
        }
        assert_eq!("fresh".parse::<EvergreenStatus>().unwrap(), EvergreenStatus::Evergreen);
        assert!("rotten".parse::<EvergreenStatus>().is_err());
    }
}
