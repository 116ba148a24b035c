//! Sitemap delta feed and IndexNow submission

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::sitemap_delta::indexnow::SubmitOutcome;
use crate::sitemap_delta::{DeltaEntry, IndexNowConfig};
use crate::{ApiError, ApiResult, AppState};

const DEFAULT_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct DeltaQuery {
    pub limit: Option<usize>,
    /// Only entries changed at or after this unix time
    pub since: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct DeltaResponse {
    pub entries: Vec<DeltaEntry>,
    pub capacity: usize,
}

/// GET /api/sitemap/delta?limit=&since=
pub async fn get_delta(
    State(state): State<AppState>,
    Query(query): Query<DeltaQuery>,
) -> Json<DeltaResponse> {
    if let Err(e) = state.delta.refresh_capacity().await {
        warn!("Failed to apply sitemap delta capacity: {}", e);
    }

    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).max(1);
    let mut entries = match query.since {
        Some(since) => state.delta.since(since).await,
        None => state.delta.recent(limit).await,
    };
    entries.truncate(limit);

    Json(DeltaResponse {
        entries,
        capacity: state.delta.capacity().await,
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub since: Option<i64>,
}

/// POST /api/sitemap/delta/submit
///
/// Sends every tracked URL (or those changed since `since`) to IndexNow.
pub async fn submit_delta(
    State(state): State<AppState>,
    payload: Option<Json<SubmitRequest>>,
) -> ApiResult<Json<SubmitOutcome>> {
    let request = payload.map(|Json(r)| r).unwrap_or_default();
    let config = IndexNowConfig::from_database(&state.db).await?;

    let entries = match request.since {
        Some(since) => state.delta.since(since).await,
        None => state.delta.recent(usize::MAX).await,
    };
    if entries.is_empty() {
        return Err(ApiError::BadRequest("No changed URLs to submit".to_string()));
    }

    let urls = entries.into_iter().map(|e| e.url).collect();
    Ok(Json(state.indexnow.submit(&config, urls).await?))
}

pub fn sitemap_routes() -> Router<AppState> {
    Router::new()
        .route("/api/sitemap/delta", get(get_delta))
        .route("/api/sitemap/delta/submit", post(submit_delta))
}
