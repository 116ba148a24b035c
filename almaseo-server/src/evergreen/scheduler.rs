//! Batch scoring and the recurring scan timer
//!
//! A run walks published posts needing a score with a keyset cursor
//! (`id > cursor ORDER BY id`). Posts scored during the run drop out of the
//! "needs scoring" set, and failing posts stay in it; an offset would skip or
//! repeat rows in both cases, the cursor does neither.

use almaseo_common::time::{now, unix_now, SECONDS_PER_DAY};
use almaseo_common::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::age::ContentAge;
use super::dashboard::DashboardCache;
use super::scoring::{score, EvergreenStatus, ScoreInput};
use super::seasonal::detect_seasonal;
use super::settings::{
    EvergreenSettings, MAX_RESCORE_AFTER_DAYS, MAX_SCAN_INTERVAL_SECS, MIN_SCAN_INTERVAL_SECS,
};
use super::store::{self, Post, ScoreRecord};
use super::traffic::TrafficSource;
use crate::not_found;

/// Error samples kept per report
pub const MAX_ERROR_SAMPLES: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchTrigger {
    Scheduled,
    Manual,
}

/// One failed item
#[derive(Debug, Clone, Serialize)]
pub struct ItemError {
    /// None when the failure was not tied to a post (page fetch)
    pub post_id: Option<i64>,
    pub message: String,
}

/// Outcome of a batch run
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub trigger: BatchTrigger,
    pub force: bool,
    pub processed: u64,
    pub errors: u64,
    pub pages: u64,
    /// Run stopped early because a page could not be fetched
    pub aborted: bool,
    pub error_samples: Vec<ItemError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchReport {
    fn start(trigger: BatchTrigger, force: bool) -> Self {
        let started_at = now();
        Self {
            run_id: Uuid::new_v4(),
            trigger,
            force,
            processed: 0,
            errors: 0,
            pages: 0,
            aborted: false,
            error_samples: Vec::new(),
            started_at,
            finished_at: started_at,
        }
    }

    fn record_error(&mut self, post_id: Option<i64>, err: &Error) {
        self.errors += 1;
        if self.error_samples.len() < MAX_ERROR_SAMPLES {
            self.error_samples.push(ItemError {
                post_id,
                message: err.to_string(),
            });
        }
    }
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("A batch run is already in progress")]
    AlreadyRunning,

    #[error(transparent)]
    Common(#[from] Error),
}

/// Result of scoring one post
#[derive(Debug, Clone, Serialize)]
pub struct ScoreOutcome {
    pub post_id: i64,
    pub status: EvergreenStatus,
    pub previous: Option<EvergreenStatus>,
    pub reasons: Vec<String>,
}

/// Clears the running flag when a run ends, including on early return
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs evergreen scoring over the content store
pub struct BatchScheduler {
    db: SqlitePool,
    traffic: Arc<dyn TrafficSource>,
    dashboard: Arc<DashboardCache>,
    running: AtomicBool,
    last_report: RwLock<Option<BatchReport>>,
}

impl BatchScheduler {
    pub fn new(
        db: SqlitePool,
        traffic: Arc<dyn TrafficSource>,
        dashboard: Arc<DashboardCache>,
    ) -> Self {
        Self {
            db,
            traffic,
            dashboard,
            running: AtomicBool::new(false),
            last_report: RwLock::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub async fn last_report(&self) -> Option<BatchReport> {
        self.last_report.read().await.clone()
    }

    fn try_acquire(&self) -> std::result::Result<RunGuard<'_>, BatchError> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| RunGuard(&self.running))
            .map_err(|_| BatchError::AlreadyRunning)
    }

    /// Score every post needing it
    ///
    /// `force` rescores all published posts regardless of score age.
    pub async fn run_batch(
        &self,
        trigger: BatchTrigger,
        force: bool,
    ) -> std::result::Result<BatchReport, BatchError> {
        let _guard = self.try_acquire()?;

        let settings = EvergreenSettings::from_database(&self.db).await?;
        let rescore_before = if force {
            None
        } else {
            let window = settings
                .rescore_after_days
                .clamp(0, MAX_RESCORE_AFTER_DAYS)
                .saturating_mul(SECONDS_PER_DAY);
            Some(unix_now().saturating_sub(window))
        };

        let mut report = BatchReport::start(trigger, force);
        info!(
            "Evergreen batch {} started ({:?}, force={}, page size {})",
            report.run_id, trigger, force, settings.batch_size
        );

        let mut cursor = i64::MIN;
        loop {
            let page =
                match store::fetch_scoring_page(&self.db, cursor, settings.batch_size, rescore_before)
                    .await
                {
                    Ok(page) => page,
                    Err(e) => {
                        error!("Evergreen batch {} aborted: {}", report.run_id, e);
                        report.record_error(None, &e);
                        report.aborted = true;
                        break;
                    }
                };

            let Some(last) = page.last() else {
                break;
            };
            cursor = last.id;
            report.pages += 1;
            debug!(
                "Evergreen batch {} page {}: {} posts",
                report.run_id,
                report.pages,
                page.len()
            );

            let short_page = (page.len() as i64) < settings.batch_size;

            for post in &page {
                match self.score_post(post, &settings).await {
                    Ok(_) => report.processed += 1,
                    Err(e) => {
                        warn!("Failed to score post {}: {}", post.id, e);
                        report.record_error(Some(post.id), &e);
                    }
                }
            }

            if short_page {
                break;
            }
        }

        report.finished_at = now();
        info!(
            "Evergreen batch {} finished: {} processed, {} errors, {} pages",
            report.run_id, report.processed, report.errors, report.pages
        );

        if report.processed > 0 {
            self.dashboard.invalidate().await;
        }

        *self.last_report.write().await = Some(report.clone());
        Ok(report)
    }

    /// Score one post immediately
    pub async fn rescore_post(&self, post_id: i64) -> Result<ScoreOutcome> {
        let post = store::get_post(&self.db, post_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Post {} not found", post_id)))?;

        if !post.published {
            return Err(Error::InvalidInput(format!(
                "Post {} is not published",
                post_id
            )));
        }

        let settings = EvergreenSettings::from_database(&self.db).await?;
        let outcome = self.score_post(&post, &settings).await?;
        self.dashboard.invalidate().await;
        Ok(outcome)
    }

    async fn score_post(&self, post: &Post, settings: &EvergreenSettings) -> Result<ScoreOutcome> {
        let scored_at = unix_now();
        let window = self.traffic.window(post.id).await?;

        let age = ContentAge::from_timestamps(post.published_at, post.modified_at, scored_at);
        let trend = window.map(|w| w.trend());
        let seasonal_marker = if settings.seasonal_detection {
            detect_seasonal(&post.title, &post.body)
        } else {
            None
        };

        let input = ScoreInput {
            age,
            trend,
            seasonal_marker,
            pinned: post.pinned,
        };
        let result = score(&input, settings);

        let record = ScoreRecord {
            status: result.status,
            reasons: result.reasons,
            age,
            trend,
            seasonal_marker: input.seasonal_marker,
            scored_at,
        };
        let previous = store::save_score(&self.db, post.id, &record).await?;

        if let Some(previous) = previous.filter(|p| *p != record.status) {
            info!(
                "Post {} evergreen status changed: {} -> {}",
                post.id, previous, record.status
            );
        }

        Ok(ScoreOutcome {
            post_id: post.id,
            status: record.status,
            previous,
            reasons: record.reasons,
        })
    }

    /// Start the recurring scan
    ///
    /// Each tick runs a non-forced batch and purges expired 404 entries. The
    /// interval follows `evergreen_scan_interval_secs` when it changes.
    pub fn spawn_timer(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut period = self.scan_interval().await;
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!("Evergreen scan timer started (every {}s)", period.as_secs());

            loop {
                ticker.tick().await;

                if self.is_running() {
                    debug!("Evergreen batch still running; skipping scheduled tick");
                } else {
                    match self.run_batch(BatchTrigger::Scheduled, false).await {
                        Ok(_) | Err(BatchError::AlreadyRunning) => {}
                        Err(BatchError::Common(e)) => error!("Scheduled evergreen batch failed: {}", e),
                    }
                }

                self.purge_not_found().await;

                let configured = self.scan_interval().await;
                if configured != period {
                    info!(
                        "Evergreen scan interval changed: {}s -> {}s",
                        period.as_secs(),
                        configured.as_secs()
                    );
                    period = configured;
                    ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                }
            }
        })
    }

    async fn scan_interval(&self) -> Duration {
        let secs = match EvergreenSettings::from_database(&self.db).await {
            Ok(settings) => settings.scan_interval_secs,
            Err(e) => {
                warn!("Failed to read scan interval, using default: {}", e);
                EvergreenSettings::default().scan_interval_secs
            }
        };
        Duration::from_secs(secs.clamp(MIN_SCAN_INTERVAL_SECS, MAX_SCAN_INTERVAL_SECS))
    }

    async fn purge_not_found(&self) {
        let result: Result<u64> = async {
            let days = not_found::retention_days(&self.db).await?;
            not_found::purge_older_than(&self.db, days, unix_now()).await
        }
        .await;

        match result {
            Ok(0) => {}
            Ok(purged) => info!("Purged {} expired 404 entries", purged),
            Err(e) => warn!("Failed to purge 404 log: {}", e),
        }
    }
}
