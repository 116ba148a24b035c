//! Content ingestion endpoints
//!
//! The publishing site pushes content items and click windows here. Each
//! write rescores the affected item so the dashboard never lags a change.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::put,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::evergreen::scheduler::ScoreOutcome;
use crate::evergreen::store::{self, PostUpsert};
use crate::evergreen::trend::TrafficWindow;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct UpsertResponse {
    pub post_id: i64,
    pub created: bool,
    pub content_changed: bool,
    /// None for unpublished items
    pub score: Option<ScoreOutcome>,
}

/// PUT /api/posts/:id
///
/// Upserts the item, records its URL in the sitemap delta when its content
/// changed, and rescores it. Unpublishing an item drops its score.
pub async fn upsert_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<PostUpsert>,
) -> ApiResult<(StatusCode, Json<UpsertResponse>)> {
    let outcome = store::upsert_post(&state.db, id, &payload).await?;

    if outcome.content_changed {
        let changed_at = payload.modified_at.unwrap_or(payload.published_at);
        if let Err(e) = state.delta.push(payload.url.trim(), changed_at).await {
            warn!("Failed to record sitemap delta for post {}: {}", id, e);
        }
    }

    let score = if payload.published {
        Some(state.scheduler.rescore_post(id).await?)
    } else {
        if store::delete_score(&state.db, id).await? {
            info!("Post {} unpublished; score removed", id);
        }
        state.dashboard.invalidate().await;
        None
    };

    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(UpsertResponse {
            post_id: id,
            created: outcome.created,
            content_changed: outcome.content_changed,
            score,
        }),
    ))
}

/// DELETE /api/posts/:id
pub async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if !store::delete_post(&state.db, id).await? {
        return Err(ApiError::NotFound(format!("Post {} not found", id)));
    }
    state.dashboard.invalidate().await;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct TrafficRequest {
    /// Clicks in the last 90 days
    pub clicks_current: u64,
    /// Clicks in the 90 days before that
    pub clicks_previous: u64,
}

#[derive(Debug, Serialize)]
pub struct TrafficResponse {
    pub post_id: i64,
    pub trend: f64,
    pub score: Option<ScoreOutcome>,
}

/// PUT /api/posts/:id/traffic
pub async fn put_traffic(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<TrafficRequest>,
) -> ApiResult<Json<TrafficResponse>> {
    let window = TrafficWindow::new(payload.clicks_current, payload.clicks_previous);

    if !store::save_traffic(&state.db, id, window).await? {
        return Err(ApiError::NotFound(format!("Post {} not found", id)));
    }

    let published = store::get_post(&state.db, id)
        .await?
        .is_some_and(|post| post.published);
    let score = if published {
        Some(state.scheduler.rescore_post(id).await?)
    } else {
        None
    };

    Ok(Json(TrafficResponse {
        post_id: id,
        trend: window.trend(),
        score,
    }))
}

pub fn posts_routes() -> Router<AppState> {
    Router::new()
        .route("/api/posts/:id", put(upsert_post).delete(delete_post))
        .route("/api/posts/:id/traffic", put(put_traffic))
}
