//! Dashboard aggregate with TTL cache
//!
//! Counting every score on each dashboard view is wasteful on large sites, so
//! the aggregate is cached until it expires or a batch invalidates it.

use almaseo_common::time::{from_unix, now};
use almaseo_common::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

use super::store;

/// Status distribution over published posts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total: i64,
    pub evergreen: i64,
    pub watch: i64,
    pub stale: i64,
    pub unscored: i64,
    pub pinned: i64,
    pub last_scored_at: Option<DateTime<Utc>>,
    pub computed_at: DateTime<Utc>,
}

impl DashboardStats {
    pub async fn compute(db: &SqlitePool) -> Result<Self> {
        let counts = store::status_counts(db).await?;

        Ok(Self {
            total: counts.total,
            evergreen: counts.evergreen,
            watch: counts.watch,
            stale: counts.stale,
            unscored: counts.unscored,
            pinned: counts.pinned,
            last_scored_at: counts.last_scored_at.and_then(from_unix),
            computed_at: now(),
        })
    }
}

struct CachedStats {
    stored_at: Instant,
    stats: DashboardStats,
}

/// TTL cache for [`DashboardStats`]
///
/// The generation counter stops a computation that raced with
/// `invalidate()` from storing its already outdated result.
pub struct DashboardCache {
    ttl_secs: AtomicU64,
    generation: AtomicU64,
    entry: RwLock<Option<CachedStats>>,
}

impl DashboardCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl_secs: AtomicU64::new(ttl_secs),
            generation: AtomicU64::new(0),
            entry: RwLock::new(None),
        }
    }

    pub fn set_ttl(&self, ttl_secs: u64) {
        self.ttl_secs.store(ttl_secs, Ordering::Relaxed);
    }

    fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs.load(Ordering::Relaxed))
    }

    /// Cached stats if fresh, otherwise recompute and store
    pub async fn get(&self, db: &SqlitePool) -> Result<DashboardStats> {
        let ttl = self.ttl();

        if let Some(cached) = self.entry.read().await.as_ref() {
            if cached.stored_at.elapsed() < ttl {
                return Ok(cached.stats.clone());
            }
        }

        let generation = self.generation.load(Ordering::Acquire);
        let stats = DashboardStats::compute(db).await?;

        if ttl > Duration::ZERO {
            let mut entry = self.entry.write().await;
            if self.generation.load(Ordering::Acquire) == generation {
                *entry = Some(CachedStats {
                    stored_at: Instant::now(),
                    stats: stats.clone(),
                });
            } else {
                debug!("Dashboard invalidated during computation; not caching");
            }
        }

        Ok(stats)
    }

    pub async fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        *self.entry.write().await = None;
    }

    pub async fn is_cached(&self) -> bool {
        let ttl = self.ttl();
        self.entry
            .read()
            .await
            .as_ref()
            .is_some_and(|cached| cached.stored_at.elapsed() < ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evergreen::store::{upsert_post, PostUpsert};
    use almaseo_common::db::init_database;
    use almaseo_common::time::unix_now;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, SqlitePool) {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("test.db")).await.unwrap();
        (dir, pool)
    }

    async fn add_post(pool: &SqlitePool, id: i64) {
        let post = PostUpsert {
            title: format!("Post {}", id),
            body: String::new(),
            url: format!("https://example.com/{}", id),
            post_type: "post".to_string(),
            published: true,
            published_at: unix_now(),
            modified_at: None,
        };
        upsert_post(pool, id, &post).await.unwrap();
    }

    #[tokio::test]
    async fn test_cache_serves_until_invalidated() {
        let (_dir, pool) = setup().await;
        let cache = DashboardCache::new(3600);

        add_post(&pool, 1).await;
        assert_eq!(cache.get(&pool).await.unwrap().total, 1);
        assert!(cache.is_cached().await);

        add_post(&pool, 2).await;
        assert_eq!(cache.get(&pool).await.unwrap().total, 1, "cached value served");

        cache.invalidate().await;
        assert!(!cache.is_cached().await);
        assert_eq!(cache.get(&pool).await.unwrap().total, 2);
    }

    #[tokio::test]
    async fn test_zero_ttl_never_caches() {
        let (_dir, pool) = setup().await;
        let cache = DashboardCache::new(0);

        add_post(&pool, 1).await;
        cache.get(&pool).await.unwrap();
        assert!(!cache.is_cached().await);
    }

    #[tokio::test]
    async fn test_empty_database() {
        let (_dir, pool) = setup().await;
        let stats = DashboardStats::compute(&pool).await.unwrap();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.unscored, 0);
        assert!(stats.last_scored_at.is_none());
    }
}
