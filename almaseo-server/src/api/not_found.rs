//! 404 monitor endpoints

use almaseo_common::time::unix_now;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::not_found::{self, NotFoundEntry, NotFoundSort};
use crate::pagination::Pagination;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct RecordHitRequest {
    pub path: String,
    #[serde(default)]
    pub referrer: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecordHitResponse {
    pub id: i64,
}

/// POST /api/404
pub async fn record_hit(
    State(state): State<AppState>,
    Json(payload): Json<RecordHitRequest>,
) -> ApiResult<Json<RecordHitResponse>> {
    let id = not_found::record_hit(
        &state.db,
        &payload.path,
        payload.referrer.as_deref(),
        payload.user_agent.as_deref(),
        unix_now(),
    )
    .await?;
    Ok(Json(RecordHitResponse { id }))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    #[serde(default)]
    pub sort: NotFoundSort,
    #[serde(default)]
    pub include_ignored: bool,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub entries: Vec<NotFoundEntry>,
    pub pagination: Pagination,
}

/// GET /api/404?page=&sort=hits|recent&include_ignored=
pub async fn list_hits(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<ListResponse>> {
    let (entries, pagination) = not_found::list(
        &state.db,
        query.page.unwrap_or(1),
        query.sort,
        query.include_ignored,
    )
    .await?;
    Ok(Json(ListResponse {
        entries,
        pagination,
    }))
}

#[derive(Debug, Deserialize)]
pub struct PurgeQuery {
    /// Defaults to the `not_found_retention_days` setting
    pub older_than_days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub purged: u64,
    pub older_than_days: i64,
}

/// DELETE /api/404?older_than_days=
pub async fn purge(
    State(state): State<AppState>,
    Query(query): Query<PurgeQuery>,
) -> ApiResult<Json<PurgeResponse>> {
    let days = match query.older_than_days {
        Some(days) => days,
        None => not_found::retention_days(&state.db).await?,
    };
    let purged = not_found::purge_older_than(&state.db, days, unix_now()).await?;
    Ok(Json(PurgeResponse {
        purged,
        older_than_days: days,
    }))
}

#[derive(Debug, Deserialize)]
pub struct IgnoreRequest {
    #[serde(default = "default_ignored")]
    pub ignored: bool,
}

fn default_ignored() -> bool {
    true
}

/// POST /api/404/:id/ignore
///
/// Body is optional; `{"ignored": false}` un-ignores.
pub async fn set_ignored(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Option<Json<IgnoreRequest>>,
) -> ApiResult<StatusCode> {
    let ignored = payload.map_or(true, |Json(r)| r.ignored);
    if !not_found::set_ignored(&state.db, id, ignored).await? {
        return Err(ApiError::NotFound(format!("404 entry {} not found", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/404/:id
pub async fn delete_entry(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if !not_found::delete(&state.db, id).await? {
        return Err(ApiError::NotFound(format!("404 entry {} not found", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub fn not_found_routes() -> Router<AppState> {
    Router::new()
        .route("/api/404", post(record_hit).get(list_hits).delete(purge))
        .route("/api/404/:id/ignore", post(set_ignored))
        .route("/api/404/:id", delete(delete_entry))
}
