//! Delta ring persisted to the `sitemap_delta` table

use almaseo_common::db::get_setting_or;
use almaseo_common::Result;
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::ring::{DeltaEntry, DeltaRing};

/// Default ring capacity when the setting is missing
pub const DEFAULT_MAX_URLS: usize = 500;

/// Write-through wrapper around [`DeltaRing`]
///
/// The lock is held across the database write so the table and the ring
/// see pushes in the same order.
pub struct DeltaTracker {
    db: SqlitePool,
    ring: Mutex<DeltaRing>,
}

impl DeltaTracker {
    /// Load persisted entries, pruning the table to the configured capacity
    pub async fn load(db: SqlitePool) -> Result<Self> {
        let capacity = max_urls(&db).await?;
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT url, changed_at FROM sitemap_delta ORDER BY changed_at, rowid",
        )
        .fetch_all(&db)
        .await?;

        let mut ring = DeltaRing::new(capacity);
        let mut evicted = Vec::new();
        for (url, changed_at) in rows {
            evicted.extend(ring.push(url, changed_at));
        }
        remove_urls(&db, &evicted).await?;

        info!(
            "Loaded sitemap delta: {} URLs (capacity {}, pruned {})",
            ring.len(),
            ring.capacity(),
            evicted.len()
        );

        Ok(Self {
            db,
            ring: Mutex::new(ring),
        })
    }

    /// Record a changed URL
    ///
    /// Picks up a changed `sitemap_delta_max_urls` before inserting.
    pub async fn push(&self, url: &str, changed_at: i64) -> Result<()> {
        let mut ring = self.ring.lock().await;
        self.apply_capacity(&mut ring).await?;

        sqlx::query(
            r#"
            INSERT INTO sitemap_delta (url, changed_at) VALUES (?, ?)
            ON CONFLICT(url) DO UPDATE SET changed_at = excluded.changed_at
            "#,
        )
        .bind(url)
        .bind(changed_at)
        .execute(&self.db)
        .await?;

        let evicted = ring.push(url, changed_at);
        remove_urls(&self.db, &evicted).await?;
        debug!("Sitemap delta: {} changed", url);
        Ok(())
    }

    /// Re-read `sitemap_delta_max_urls` and shrink or grow the ring to match
    pub async fn refresh_capacity(&self) -> Result<()> {
        let mut ring = self.ring.lock().await;
        self.apply_capacity(&mut ring).await
    }

    async fn apply_capacity(&self, ring: &mut DeltaRing) -> Result<()> {
        let capacity = max_urls(&self.db).await?.max(1);
        if capacity == ring.capacity() {
            return Ok(());
        }

        let evicted = ring.set_capacity(capacity);
        remove_urls(&self.db, &evicted).await?;
        info!(
            "Sitemap delta capacity now {} (pruned {})",
            ring.capacity(),
            evicted.len()
        );
        Ok(())
    }

    pub async fn recent(&self, limit: usize) -> Vec<DeltaEntry> {
        self.ring.lock().await.recent(limit)
    }

    pub async fn since(&self, since: i64) -> Vec<DeltaEntry> {
        self.ring.lock().await.since(since)
    }

    pub async fn len(&self) -> usize {
        self.ring.lock().await.len()
    }

    pub async fn capacity(&self) -> usize {
        self.ring.lock().await.capacity()
    }
}

/// `sitemap_delta_max_urls` setting
pub async fn max_urls(db: &SqlitePool) -> Result<usize> {
    get_setting_or(db, "sitemap_delta_max_urls", DEFAULT_MAX_URLS).await
}

async fn remove_urls(db: &SqlitePool, urls: &[String]) -> Result<()> {
    for url in urls {
        sqlx::query("DELETE FROM sitemap_delta WHERE url = ?")
            .bind(url)
            .execute(db)
            .await?;
    }
    Ok(())
}
