//! Traffic data source for trend calculation
//!
//! Click windows normally come from a search-analytics sync. The scheduler
//! only depends on this trait, so the source can be swapped (or faked in
//! tests) without touching scoring.

use almaseo_common::Result;
use async_trait::async_trait;
use sqlx::SqlitePool;

use super::store;
use super::trend::TrafficWindow;

/// Provides 90-day click windows per content item
#[async_trait]
pub trait TrafficSource: Send + Sync {
    /// Click windows for a post, or None when no data has been collected
    async fn window(&self, post_id: i64) -> Result<Option<TrafficWindow>>;
}

/// Reads click windows from the `post_traffic` table
#[derive(Clone)]
pub struct SqliteTrafficSource {
    db: SqlitePool,
}

impl SqliteTrafficSource {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TrafficSource for SqliteTrafficSource {
    async fn window(&self, post_id: i64) -> Result<Option<TrafficWindow>> {
        store::load_traffic(&self.db, post_id).await
    }
}
