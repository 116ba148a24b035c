//! almaseo-server library
//!
//! Content freshness services for a publishing site: evergreen scoring,
//! a 404 monitor and sitemap delta tracking with IndexNow submission.

use axum::Router;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod evergreen;
pub mod not_found;
pub mod pagination;
pub mod sitemap_delta;

pub use error::{ApiError, ApiResult};

use evergreen::{BatchScheduler, DashboardCache, EvergreenSettings, SqliteTrafficSource};
use sitemap_delta::{DeltaTracker, IndexNowClient};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub scheduler: Arc<BatchScheduler>,
    pub dashboard: Arc<DashboardCache>,
    pub delta: Arc<DeltaTracker>,
    pub indexnow: Arc<IndexNowClient>,
}

impl AppState {
    /// Build services on top of an initialized database
    pub async fn initialize(db: SqlitePool) -> anyhow::Result<Self> {
        let settings = EvergreenSettings::from_database(&db).await?;
        let dashboard = Arc::new(DashboardCache::new(settings.cache_ttl_secs));
        let traffic = Arc::new(SqliteTrafficSource::new(db.clone()));
        let scheduler = Arc::new(BatchScheduler::new(db.clone(), traffic, dashboard.clone()));
        let delta = Arc::new(DeltaTracker::load(db.clone()).await?);
        let indexnow = Arc::new(IndexNowClient::new()?);

        Ok(Self {
            db,
            scheduler,
            dashboard,
            delta,
            indexnow,
        })
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::posts_routes())
        .merge(api::evergreen_routes())
        .merge(api::not_found_routes())
        .merge(api::sitemap_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
