//! Evergreen dashboard, score listing, overrides and batch control

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::evergreen::scheduler::ScoreOutcome;
use crate::evergreen::store::{self, StoredScore};
use crate::evergreen::{
    BatchReport, BatchTrigger, DashboardStats, EvergreenSettings, EvergreenStatus,
};
use crate::pagination::{calculate_pagination, Pagination, PAGE_SIZE};
use crate::{ApiError, ApiResult, AppState};

/// GET /api/evergreen/dashboard
pub async fn get_dashboard(State(state): State<AppState>) -> ApiResult<Json<DashboardStats>> {
    Ok(Json(state.dashboard.get(&state.db).await?))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ScoreListResponse {
    pub scores: Vec<StoredScore>,
    pub pagination: Pagination,
}

/// GET /api/evergreen/posts?status=&page=
pub async fn list_scores(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<ScoreListResponse>> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.trim().is_empty() && *s != "all")
        .map(str::parse::<EvergreenStatus>)
        .transpose()
        .map_err(ApiError::BadRequest)?;

    let total = store::count_scores(&state.db, status).await?;
    let pagination = calculate_pagination(total, query.page.unwrap_or(1));
    let scores = store::list_scores(&state.db, status, PAGE_SIZE, pagination.offset).await?;

    Ok(Json(ScoreListResponse { scores, pagination }))
}

/// GET /api/evergreen/posts/:id
pub async fn get_score(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<StoredScore>> {
    if let Some(score) = store::get_score(&state.db, id).await? {
        return Ok(Json(score));
    }

    let message = if store::get_post(&state.db, id).await?.is_some() {
        format!("Post {} has not been scored yet", id)
    } else {
        format!("Post {} not found", id)
    };
    Err(ApiError::NotFound(message))
}

#[derive(Debug, Serialize)]
pub struct PinResponse {
    pub post_id: i64,
    pub pinned: bool,
    /// None for unpublished items
    pub score: Option<ScoreOutcome>,
}

async fn set_pinned(state: &AppState, id: i64, pinned: bool) -> ApiResult<Json<PinResponse>> {
    if !store::set_pinned(&state.db, id, pinned).await? {
        return Err(ApiError::NotFound(format!("Post {} not found", id)));
    }
    info!("Post {} {}", id, if pinned { "pinned" } else { "unpinned" });

    let published = store::get_post(&state.db, id)
        .await?
        .is_some_and(|post| post.published);
    let score = if published {
        Some(state.scheduler.rescore_post(id).await?)
    } else {
        None
    };

    Ok(Json(PinResponse {
        post_id: id,
        pinned,
        score,
    }))
}

/// POST /api/evergreen/posts/:id/pin
pub async fn pin_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<PinResponse>> {
    set_pinned(&state, id, true).await
}

/// POST /api/evergreen/posts/:id/unpin
pub async fn unpin_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<PinResponse>> {
    set_pinned(&state, id, false).await
}

/// POST /api/evergreen/posts/:id/rescore
pub async fn rescore_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ScoreOutcome>> {
    Ok(Json(state.scheduler.rescore_post(id).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct BatchRequest {
    #[serde(default)]
    pub force: bool,
}

/// POST /api/evergreen/batch
///
/// Runs to completion and returns the report; 409 while another run is active.
pub async fn run_batch(
    State(state): State<AppState>,
    payload: Option<Json<BatchRequest>>,
) -> ApiResult<Json<BatchReport>> {
    let request = payload.map(|Json(r)| r).unwrap_or_default();
    let report = state
        .scheduler
        .run_batch(BatchTrigger::Manual, request.force)
        .await?;
    Ok(Json(report))
}

#[derive(Debug, Serialize)]
pub struct BatchStatusResponse {
    pub running: bool,
    pub report: Option<BatchReport>,
}

/// GET /api/evergreen/batch/last
pub async fn last_batch(State(state): State<AppState>) -> Json<BatchStatusResponse> {
    Json(BatchStatusResponse {
        running: state.scheduler.is_running(),
        report: state.scheduler.last_report().await,
    })
}

/// GET /api/evergreen/settings
pub async fn get_settings(State(state): State<AppState>) -> ApiResult<Json<EvergreenSettings>> {
    Ok(Json(EvergreenSettings::from_database(&state.db).await?))
}

/// PUT /api/evergreen/settings
///
/// Validates before writing; new thresholds apply to the next scoring pass
/// and the cached dashboard is dropped.
pub async fn put_settings(
    State(state): State<AppState>,
    Json(settings): Json<EvergreenSettings>,
) -> ApiResult<Json<EvergreenSettings>> {
    settings.save(&state.db).await?;
    state.dashboard.set_ttl(settings.cache_ttl_secs);
    state.dashboard.invalidate().await;
    info!("Evergreen settings updated: {:?}", settings);
    Ok(Json(settings))
}

pub fn evergreen_routes() -> Router<AppState> {
    Router::new()
        .route("/api/evergreen/dashboard", get(get_dashboard))
        .route("/api/evergreen/posts", get(list_scores))
        .route("/api/evergreen/posts/:id", get(get_score))
        .route("/api/evergreen/posts/:id/pin", post(pin_post))
        .route("/api/evergreen/posts/:id/unpin", post(unpin_post))
        .route("/api/evergreen/posts/:id/rescore", post(rescore_post))
        .route("/api/evergreen/batch", post(run_batch))
        .route("/api/evergreen/batch/last", get(last_batch))
        .route("/api/evergreen/settings", get(get_settings).put(put_settings))
}
