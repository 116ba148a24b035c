//! Integration tests for evergreen batch runs
//!
//! Covers keyset paging (page count and item accounting), forced and
//! incremental runs, per-item failure handling and dashboard invalidation.

use almaseo_common::db::{init_database, set_setting};
use almaseo_common::time::{unix_now, SECONDS_PER_DAY};
use almaseo_common::{Error, Result};
use almaseo_server::evergreen::store::{self, PostUpsert};
use almaseo_server::evergreen::trend::TrafficWindow;
use almaseo_server::evergreen::{
    BatchScheduler, BatchTrigger, DashboardCache, EvergreenStatus, SqliteTrafficSource,
    TrafficSource,
};
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::TempDir;

/// Traffic source failing for selected posts
struct FlakyTraffic {
    inner: SqliteTrafficSource,
    failing: HashSet<i64>,
}

#[async_trait]
impl TrafficSource for FlakyTraffic {
    async fn window(&self, post_id: i64) -> Result<Option<TrafficWindow>> {
        if self.failing.contains(&post_id) {
            return Err(Error::Internal(format!("traffic lookup failed for {}", post_id)));
        }
        self.inner.window(post_id).await
    }
}

struct Fixture {
    _dir: TempDir,
    pool: SqlitePool,
    dashboard: Arc<DashboardCache>,
    scheduler: BatchScheduler,
}

async fn fixture_with_failures(failing: &[i64]) -> Fixture {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("test.db")).await.unwrap();
    let dashboard = Arc::new(DashboardCache::new(3600));
    let traffic = Arc::new(FlakyTraffic {
        inner: SqliteTrafficSource::new(pool.clone()),
        failing: failing.iter().copied().collect(),
    });
    let scheduler = BatchScheduler::new(pool.clone(), traffic, dashboard.clone());

    Fixture {
        _dir: dir,
        pool,
        dashboard,
        scheduler,
    }
}

async fn fixture() -> Fixture {
    fixture_with_failures(&[]).await
}

async fn add_posts(pool: &SqlitePool, ids: impl IntoIterator<Item = i64>, published: bool) {
    for id in ids {
        let post = PostUpsert {
            title: format!("Guide number {}", id),
            body: "<p>Plain content</p>".to_string(),
            url: format!("https://example.com/guide-{}", id),
            post_type: "post".to_string(),
            published,
            published_at: unix_now() - 30 * SECONDS_PER_DAY,
            modified_at: None,
        };
        store::upsert_post(pool, id, &post).await.unwrap();
    }
}

async fn set_batch_size(pool: &SqlitePool, size: i64) {
    set_setting(pool, "evergreen_batch_size", &size.to_string())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_page_count_and_accounting() {
    for (n, page_size) in [(0_i64, 5_i64), (1, 50), (10, 5), (11, 5), (120, 50), (7, 1)] {
        let f = fixture().await;
        add_posts(&f.pool, 1..=n, true).await;
        set_batch_size(&f.pool, page_size).await;

        let report = f
            .scheduler
            .run_batch(BatchTrigger::Manual, false)
            .await
            .unwrap();

        let expected_pages = ((n + page_size - 1) / page_size) as u64;
        assert_eq!(report.pages, expected_pages, "N={} P={}", n, page_size);
        assert_eq!(report.processed + report.errors, n as u64, "N={} P={}", n, page_size);
        assert!(!report.aborted);
    }
}

#[tokio::test]
async fn test_failures_counted_and_run_continues() {
    let failing = [2, 5, 9];
    let f = fixture_with_failures(&failing).await;
    add_posts(&f.pool, 1..=10, true).await;
    set_batch_size(&f.pool, 3).await;

    let report = f
        .scheduler
        .run_batch(BatchTrigger::Manual, false)
        .await
        .unwrap();

    assert_eq!(report.pages, 4);
    assert_eq!(report.processed, 7);
    assert_eq!(report.errors, 3);
    let sampled: Vec<i64> = report
        .error_samples
        .iter()
        .filter_map(|e| e.post_id)
        .collect();
    assert_eq!(sampled, failing.to_vec());

    // Failed posts stay unscored and are picked up by the next run
    assert!(store::get_score(&f.pool, 2).await.unwrap().is_none());
    let again = f
        .scheduler
        .run_batch(BatchTrigger::Manual, false)
        .await
        .unwrap();
    assert_eq!(again.processed + again.errors, 3);
}

#[tokio::test]
async fn test_error_samples_capped_at_twenty() {
    let failing: Vec<i64> = (1..=30).collect();
    let f = fixture_with_failures(&failing).await;
    add_posts(&f.pool, 1..=30, true).await;

    let report = f
        .scheduler
        .run_batch(BatchTrigger::Manual, false)
        .await
        .unwrap();

    assert_eq!(report.errors, 30);
    assert_eq!(report.processed, 0);
    assert_eq!(report.error_samples.len(), 20);
}

#[tokio::test]
async fn test_incremental_run_skips_fresh_scores() {
    let f = fixture().await;
    add_posts(&f.pool, 1..=6, true).await;

    let first = f.scheduler.run_batch(BatchTrigger::Manual, false).await.unwrap();
    assert_eq!(first.processed, 6);

    let second = f.scheduler.run_batch(BatchTrigger::Scheduled, false).await.unwrap();
    assert_eq!(second.processed, 0);
    assert_eq!(second.pages, 0);

    // Age one score past the rescore window
    sqlx::query("UPDATE evergreen_scores SET scored_at = scored_at - ? WHERE post_id = 4")
        .bind(8 * SECONDS_PER_DAY)
        .execute(&f.pool)
        .await
        .unwrap();
    let third = f.scheduler.run_batch(BatchTrigger::Scheduled, false).await.unwrap();
    assert_eq!(third.processed, 1);

    let forced = f.scheduler.run_batch(BatchTrigger::Manual, true).await.unwrap();
    assert_eq!(forced.processed, 6);
    assert!(forced.force);
}

#[tokio::test]
async fn test_unpublished_posts_not_scored() {
    let f = fixture().await;
    add_posts(&f.pool, 1..=3, true).await;
    add_posts(&f.pool, 4..=5, false).await;

    let report = f.scheduler.run_batch(BatchTrigger::Manual, true).await.unwrap();
    assert_eq!(report.processed, 3);
    assert!(store::get_score(&f.pool, 4).await.unwrap().is_none());
}

#[tokio::test]
async fn test_statuses_persisted_with_reasons() {
    let f = fixture().await;
    add_posts(&f.pool, [1], true).await;

    let stale = PostUpsert {
        title: "Old comparison".to_string(),
        body: String::new(),
        url: "https://example.com/old".to_string(),
        post_type: "post".to_string(),
        published: true,
        published_at: unix_now() - 900 * SECONDS_PER_DAY,
        modified_at: Some(unix_now() - 400 * SECONDS_PER_DAY),
    };
    store::upsert_post(&f.pool, 2, &stale).await.unwrap();
    store::save_traffic(&f.pool, 1, TrafficWindow::new(75, 100))
        .await
        .unwrap();

    f.scheduler.run_batch(BatchTrigger::Manual, false).await.unwrap();

    let watch = store::get_score(&f.pool, 1).await.unwrap().unwrap();
    assert_eq!(watch.status, EvergreenStatus::Watch);
    assert_eq!(watch.trend, Some(-25.0));
    assert!(watch.reasons[0].contains("25.0%"));

    let stale = store::get_score(&f.pool, 2).await.unwrap().unwrap();
    assert_eq!(stale.status, EvergreenStatus::Stale);
    assert_eq!(stale.updated_days, 400);
    assert_eq!(stale.published_days, 900);
}

#[tokio::test]
async fn test_batch_invalidates_dashboard() {
    let f = fixture().await;
    add_posts(&f.pool, 1..=4, true).await;

    let before = f.dashboard.get(&f.pool).await.unwrap();
    assert_eq!(before.unscored, 4);
    assert!(f.dashboard.is_cached().await);

    f.scheduler.run_batch(BatchTrigger::Manual, false).await.unwrap();
    assert!(!f.dashboard.is_cached().await);

    let after = f.dashboard.get(&f.pool).await.unwrap();
    assert_eq!(after.unscored, 0);
    assert_eq!(after.evergreen, 4);
    assert!(after.last_scored_at.is_some());
}

#[tokio::test]
async fn test_empty_run_keeps_dashboard_cache() {
    let f = fixture().await;
    f.dashboard.get(&f.pool).await.unwrap();

    let report = f.scheduler.run_batch(BatchTrigger::Manual, false).await.unwrap();
    assert_eq!(report.processed, 0);
    assert!(f.dashboard.is_cached().await);
}

#[tokio::test]
async fn test_last_report_kept() {
    let f = fixture().await;
    assert!(f.scheduler.last_report().await.is_none());

    add_posts(&f.pool, 1..=2, true).await;
    let report = f.scheduler.run_batch(BatchTrigger::Manual, false).await.unwrap();

    let last = f.scheduler.last_report().await.unwrap();
    assert_eq!(last.run_id, report.run_id);
    assert_eq!(last.trigger, BatchTrigger::Manual);
}

#[tokio::test]
async fn test_pinned_post_scores_evergreen_in_batch() {
    let f = fixture().await;
    let ancient = PostUpsert {
        title: "Timeless reference".to_string(),
        body: String::new(),
        url: "https://example.com/reference".to_string(),
        post_type: "page".to_string(),
        published: true,
        published_at: unix_now() - 3000 * SECONDS_PER_DAY,
        modified_at: None,
    };
    store::upsert_post(&f.pool, 1, &ancient).await.unwrap();
    store::set_pinned(&f.pool, 1, true).await.unwrap();

    f.scheduler.run_batch(BatchTrigger::Manual, false).await.unwrap();
    let score = store::get_score(&f.pool, 1).await.unwrap().unwrap();
    assert_eq!(score.status, EvergreenStatus::Evergreen);
    assert!(score.pinned);
}
