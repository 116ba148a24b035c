//! Evergreen persistence: posts, traffic windows and scores

use almaseo_common::time::from_unix;
use almaseo_common::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::age::ContentAge;
use super::scoring::EvergreenStatus;
use super::trend::TrafficWindow;

/// Content item as stored
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    #[serde(skip_serializing)]
    pub body: String,
    pub url: String,
    pub post_type: String,
    pub published: bool,
    pub published_at: i64,
    pub modified_at: Option<i64>,
    pub pinned: bool,
}

impl Post {
    fn from_row(row: &SqliteRow) -> Self {
        Self {
            id: row.get("id"),
            title: row.get("title"),
            body: row.get("body"),
            url: row.get("url"),
            post_type: row.get("post_type"),
            published: row.get::<i64, _>("published") != 0,
            published_at: row.get("published_at"),
            modified_at: row.get("modified_at"),
            pinned: row.get::<i64, _>("evergreen_pinned") != 0,
        }
    }
}

/// Content fields supplied by the publisher
#[derive(Debug, Clone, Deserialize)]
pub struct PostUpsert {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub url: String,
    #[serde(default = "default_post_type")]
    pub post_type: String,
    #[serde(default = "default_published")]
    pub published: bool,
    pub published_at: i64,
    #[serde(default)]
    pub modified_at: Option<i64>,
}

fn default_post_type() -> String {
    "post".to_string()
}

fn default_published() -> bool {
    true
}

/// What an upsert changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub created: bool,
    /// New published item, changed modify time, or newly published
    pub content_changed: bool,
}

/// Insert or update a content item; the pinned flag is preserved
pub async fn upsert_post(db: &SqlitePool, id: i64, post: &PostUpsert) -> Result<UpsertOutcome> {
    if post.url.trim().is_empty() {
        return Err(Error::InvalidInput("url must not be empty".to_string()));
    }

    let mut tx = db.begin().await?;

    let existing: Option<(Option<i64>, i64)> =
        sqlx::query_as("SELECT modified_at, published FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

    sqlx::query(
        r#"
        INSERT INTO posts (id, title, body, url, post_type, published, published_at, modified_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            body = excluded.body,
            url = excluded.url,
            post_type = excluded.post_type,
            published = excluded.published,
            published_at = excluded.published_at,
            modified_at = excluded.modified_at,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(id)
    .bind(&post.title)
    .bind(&post.body)
    .bind(post.url.trim())
    .bind(&post.post_type)
    .bind(post.published as i64)
    .bind(post.published_at)
    .bind(post.modified_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    let outcome = match existing {
        None => UpsertOutcome {
            created: true,
            content_changed: post.published,
        },
        Some((previous_modified, previous_published)) => UpsertOutcome {
            created: false,
            content_changed: post.published
                && (previous_modified != post.modified_at || previous_published == 0),
        },
    };

    Ok(outcome)
}

pub async fn get_post(db: &SqlitePool, id: i64) -> Result<Option<Post>> {
    let row = sqlx::query(
        r#"
        SELECT id, title, body, url, post_type, published, published_at, modified_at, evergreen_pinned
        FROM posts
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;

    Ok(row.as_ref().map(Post::from_row))
}

/// Delete a content item; its score and traffic rows cascade
pub async fn delete_post(db: &SqlitePool, id: i64) -> Result<bool> {
    let deleted = sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?
        .rows_affected();
    Ok(deleted > 0)
}

/// Set or clear the manual pinned override
///
/// Returns false when the post does not exist.
pub async fn set_pinned(db: &SqlitePool, id: i64, pinned: bool) -> Result<bool> {
    let updated = sqlx::query(
        "UPDATE posts SET evergreen_pinned = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
    )
    .bind(pinned as i64)
    .bind(id)
    .execute(db)
    .await?
    .rows_affected();
    Ok(updated > 0)
}

/// Fetch one keyset page of published posts needing a score
///
/// `rescore_before` selects posts with no score or a score older than the
/// given unix time; None selects every published post (forced run).
pub async fn fetch_scoring_page(
    db: &SqlitePool,
    after_id: i64,
    limit: i64,
    rescore_before: Option<i64>,
) -> Result<Vec<Post>> {
    let rows = sqlx::query(
        r#"
        SELECT p.id, p.title, p.body, p.url, p.post_type, p.published, p.published_at,
               p.modified_at, p.evergreen_pinned
        FROM posts p
        LEFT JOIN evergreen_scores s ON s.post_id = p.id
        WHERE p.published = 1
          AND p.id > ?
          AND (? IS NULL OR s.post_id IS NULL OR s.scored_at < ?)
        ORDER BY p.id
        LIMIT ?
        "#,
    )
    .bind(after_id)
    .bind(rescore_before)
    .bind(rescore_before)
    .bind(limit)
    .fetch_all(db)
    .await?;

    Ok(rows.iter().map(Post::from_row).collect())
}

/// Record click windows for a post
///
/// Returns false when the post does not exist.
pub async fn save_traffic(db: &SqlitePool, post_id: i64, window: TrafficWindow) -> Result<bool> {
    let current = i64::try_from(window.clicks_current)
        .map_err(|_| Error::InvalidInput("clicks_current out of range".to_string()))?;
    let previous = i64::try_from(window.clicks_previous)
        .map_err(|_| Error::InvalidInput("clicks_previous out of range".to_string()))?;

    let exists: i64 = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM posts WHERE id = ?)")
        .bind(post_id)
        .fetch_one(db)
        .await?;
    if exists == 0 {
        return Ok(false);
    }

    sqlx::query(
        r#"
        INSERT INTO post_traffic (post_id, clicks_current, clicks_previous, updated_at)
        VALUES (?, ?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(post_id) DO UPDATE SET
            clicks_current = excluded.clicks_current,
            clicks_previous = excluded.clicks_previous,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(post_id)
    .bind(current)
    .bind(previous)
    .execute(db)
    .await?;

    Ok(true)
}

pub async fn load_traffic(db: &SqlitePool, post_id: i64) -> Result<Option<TrafficWindow>> {
    let row: Option<(i64, i64)> = sqlx::query_as(
        "SELECT clicks_current, clicks_previous FROM post_traffic WHERE post_id = ?",
    )
    .bind(post_id)
    .fetch_optional(db)
    .await?;

    Ok(row.map(|(current, previous)| {
        TrafficWindow::new(current.max(0) as u64, previous.max(0) as u64)
    }))
}

/// Score to persist for one post
#[derive(Debug, Clone)]
pub struct ScoreRecord {
    pub status: EvergreenStatus,
    pub reasons: Vec<String>,
    pub age: ContentAge,
    pub trend: Option<f64>,
    pub seasonal_marker: Option<String>,
    pub scored_at: i64,
}

/// Persist a score, returning the status it replaced
pub async fn save_score(
    db: &SqlitePool,
    post_id: i64,
    record: &ScoreRecord,
) -> Result<Option<EvergreenStatus>> {
    let reasons = serde_json::to_string(&record.reasons)
        .map_err(|e| Error::Internal(format!("Failed to encode reasons: {}", e)))?;

    let mut tx = db.begin().await?;

    let previous: Option<String> =
        sqlx::query_scalar("SELECT status FROM evergreen_scores WHERE post_id = ?")
            .bind(post_id)
            .fetch_optional(&mut *tx)
            .await?;

    sqlx::query(
        r#"
        INSERT INTO evergreen_scores (
            post_id, status, reasons, published_days, updated_days, trend, seasonal_marker, scored_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(post_id) DO UPDATE SET
            status = excluded.status,
            reasons = excluded.reasons,
            published_days = excluded.published_days,
            updated_days = excluded.updated_days,
            trend = excluded.trend,
            seasonal_marker = excluded.seasonal_marker,
            scored_at = excluded.scored_at
        "#,
    )
    .bind(post_id)
    .bind(record.status.as_str())
    .bind(reasons)
    .bind(record.age.published_days)
    .bind(record.age.updated_days)
    .bind(record.trend)
    .bind(&record.seasonal_marker)
    .bind(record.scored_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    previous
        .map(|status| status.parse::<EvergreenStatus>())
        .transpose()
        .map_err(Error::Internal)
}

/// Drop the score of a post (e.g. after it was unpublished)
pub async fn delete_score(db: &SqlitePool, post_id: i64) -> Result<bool> {
    let deleted = sqlx::query("DELETE FROM evergreen_scores WHERE post_id = ?")
        .bind(post_id)
        .execute(db)
        .await?
        .rows_affected();
    Ok(deleted > 0)
}

/// Score joined with the post it belongs to
#[derive(Debug, Clone, Serialize)]
pub struct StoredScore {
    pub post_id: i64,
    pub title: String,
    pub url: String,
    pub status: EvergreenStatus,
    pub reasons: Vec<String>,
    pub published_days: i64,
    pub updated_days: i64,
    pub trend: Option<f64>,
    pub seasonal_marker: Option<String>,
    pub pinned: bool,
    pub scored_at: Option<DateTime<Utc>>,
}

impl StoredScore {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        let status: String = row.get("status");
        let reasons: String = row.get("reasons");

        Ok(Self {
            post_id: row.get("post_id"),
            title: row.get("title"),
            url: row.get("url"),
            status: status.parse().map_err(Error::Internal)?,
            reasons: serde_json::from_str(&reasons)
                .map_err(|e| Error::Internal(format!("Corrupt reasons column: {}", e)))?,
            published_days: row.get("published_days"),
            updated_days: row.get("updated_days"),
            trend: row.get("trend"),
            seasonal_marker: row.get("seasonal_marker"),
            pinned: row.get::<i64, _>("evergreen_pinned") != 0,
            scored_at: from_unix(row.get("scored_at")),
        })
    }
}

const SCORE_COLUMNS: &str = r#"
    s.post_id, p.title, p.url, s.status, s.reasons, s.published_days, s.updated_days,
    s.trend, s.seasonal_marker, p.evergreen_pinned, s.scored_at
"#;

pub async fn get_score(db: &SqlitePool, post_id: i64) -> Result<Option<StoredScore>> {
    let sql = format!(
        "SELECT {} FROM evergreen_scores s JOIN posts p ON p.id = s.post_id WHERE s.post_id = ?",
        SCORE_COLUMNS
    );
    let row = sqlx::query(&sql).bind(post_id).fetch_optional(db).await?;

    row.as_ref().map(StoredScore::from_row).transpose()
}

/// Scores of published posts, most outdated first
pub async fn list_scores(
    db: &SqlitePool,
    status: Option<EvergreenStatus>,
    limit: i64,
    offset: i64,
) -> Result<Vec<StoredScore>> {
    let sql = format!(
        r#"
        SELECT {}
        FROM evergreen_scores s
        JOIN posts p ON p.id = s.post_id
        WHERE p.published = 1 AND (? IS NULL OR s.status = ?)
        ORDER BY s.updated_days DESC, s.post_id
        LIMIT ? OFFSET ?
        "#,
        SCORE_COLUMNS
    );
    let status = status.map(|s| s.as_str());

    let rows = sqlx::query(&sql)
        .bind(status)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;

    rows.iter().map(StoredScore::from_row).collect()
}

pub async fn count_scores(db: &SqlitePool, status: Option<EvergreenStatus>) -> Result<i64> {
    let status = status.map(|s| s.as_str());
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM evergreen_scores s
        JOIN posts p ON p.id = s.post_id
        WHERE p.published = 1 AND (? IS NULL OR s.status = ?)
        "#,
    )
    .bind(status)
    .bind(status)
    .fetch_one(db)
    .await?;
    Ok(count)
}

/// Per-status totals over published posts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub total: i64,
    pub evergreen: i64,
    pub watch: i64,
    pub stale: i64,
    pub unscored: i64,
    pub pinned: i64,
    pub last_scored_at: Option<i64>,
}

pub async fn status_counts(db: &SqlitePool) -> Result<StatusCounts> {
    let row = sqlx::query(
        r#"
        SELECT
            COUNT(*) AS total,
            COALESCE(SUM(CASE WHEN s.status = 'evergreen' THEN 1 ELSE 0 END), 0) AS evergreen,
            COALESCE(SUM(CASE WHEN s.status = 'watch' THEN 1 ELSE 0 END), 0) AS watch,
            COALESCE(SUM(CASE WHEN s.status = 'stale' THEN 1 ELSE 0 END), 0) AS stale,
            COALESCE(SUM(CASE WHEN s.post_id IS NULL THEN 1 ELSE 0 END), 0) AS unscored,
            COALESCE(SUM(p.evergreen_pinned), 0) AS pinned,
            MAX(s.scored_at) AS last_scored_at
        FROM posts p
        LEFT JOIN evergreen_scores s ON s.post_id = p.id
        WHERE p.published = 1
        "#,
    )
    .fetch_one(db)
    .await?;

    Ok(StatusCounts {
        total: row.get("total"),
        evergreen: row.get("evergreen"),
        watch: row.get("watch"),
        stale: row.get("stale"),
        unscored: row.get("unscored"),
        pinned: row.get("pinned"),
        last_scored_at: row.get("last_scored_at"),
    })
}
