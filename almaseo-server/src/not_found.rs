//! 404 monitor
//!
//! Aggregates requests for missing paths so broken links can be found and
//! redirected. One row per normalised path; repeat hits bump the counter.

use almaseo_common::db::get_setting_or;
use almaseo_common::time::{from_unix, SECONDS_PER_DAY};
use almaseo_common::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::pagination::{calculate_pagination, Pagination, PAGE_SIZE};

/// Longest path accepted, in characters
pub const MAX_PATH_LEN: usize = 2048;

/// Default retention when the setting is missing
pub const DEFAULT_RETENTION_DAYS: i64 = 90;

/// Logged 404 path
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotFoundEntry {
    pub id: i64,
    pub path: String,
    pub hits: i64,
    pub last_referrer: Option<String>,
    pub last_user_agent: Option<String>,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
    pub ignored: bool,
}

impl NotFoundEntry {
    fn from_row(row: &SqliteRow) -> Self {
        Self {
            id: row.get("id"),
            path: row.get("path"),
            hits: row.get("hits"),
            last_referrer: row.get("last_referrer"),
            last_user_agent: row.get("last_user_agent"),
            first_seen: from_unix(row.get("first_seen")),
            last_seen: from_unix(row.get("last_seen")),
            ignored: row.get::<i64, _>("ignored") != 0,
        }
    }
}

/// List ordering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotFoundSort {
    /// Most hits first
    #[default]
    Hits,
    /// Most recently seen first
    Recent,
}

impl NotFoundSort {
    fn order_by(self) -> &'static str {
        match self {
            Self::Hits => "hits DESC, last_seen DESC, id",
            Self::Recent => "last_seen DESC, id",
        }
    }
}

/// Strip query and fragment, trim, and validate a request path
pub fn normalize_path(raw: &str) -> Result<String> {
    let path = raw
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim();

    if !path.starts_with('/') {
        return Err(Error::InvalidInput(format!(
            "path must start with '/': {:?}",
            raw
        )));
    }
    if path.chars().count() > MAX_PATH_LEN {
        return Err(Error::InvalidInput(format!(
            "path longer than {} characters",
            MAX_PATH_LEN
        )));
    }

    Ok(path.to_string())
}

/// Record one 404 hit, returning the row id
pub async fn record_hit(
    db: &SqlitePool,
    path: &str,
    referrer: Option<&str>,
    user_agent: Option<&str>,
    at: i64,
) -> Result<i64> {
    let path = normalize_path(path)?;
    let referrer = referrer.map(str::trim).filter(|r| !r.is_empty());
    let user_agent = user_agent.map(str::trim).filter(|u| !u.is_empty());

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO not_found_log (path, hits, last_referrer, last_user_agent, first_seen, last_seen)
        VALUES (?, 1, ?, ?, ?, ?)
        ON CONFLICT(path) DO UPDATE SET
            hits = hits + 1,
            last_referrer = COALESCE(excluded.last_referrer, last_referrer),
            last_user_agent = COALESCE(excluded.last_user_agent, last_user_agent),
            last_seen = MAX(last_seen, excluded.last_seen)
        RETURNING id
        "#,
    )
    .bind(&path)
    .bind(referrer)
    .bind(user_agent)
    .bind(at)
    .bind(at)
    .fetch_one(db)
    .await?;

    Ok(id)
}

pub async fn count(db: &SqlitePool, include_ignored: bool) -> Result<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM not_found_log WHERE ? OR ignored = 0")
            .bind(include_ignored)
            .fetch_one(db)
            .await?;
    Ok(count)
}

/// One page of logged paths
pub async fn list(
    db: &SqlitePool,
    page: i64,
    sort: NotFoundSort,
    include_ignored: bool,
) -> Result<(Vec<NotFoundEntry>, Pagination)> {
    let total = count(db, include_ignored).await?;
    let pagination = calculate_pagination(total, page);

    let sql = format!(
        r#"
        SELECT id, path, hits, last_referrer, last_user_agent, first_seen, last_seen, ignored
        FROM not_found_log
        WHERE ? OR ignored = 0
        ORDER BY {}
        LIMIT ? OFFSET ?
        "#,
        sort.order_by()
    );

    let rows = sqlx::query(&sql)
        .bind(include_ignored)
        .bind(PAGE_SIZE)
        .bind(pagination.offset)
        .fetch_all(db)
        .await?;

    Ok((rows.iter().map(NotFoundEntry::from_row).collect(), pagination))
}

/// Returns false when the entry does not exist
pub async fn set_ignored(db: &SqlitePool, id: i64, ignored: bool) -> Result<bool> {
    let updated = sqlx::query("UPDATE not_found_log SET ignored = ? WHERE id = ?")
        .bind(ignored as i64)
        .bind(id)
        .execute(db)
        .await?
        .rows_affected();
    Ok(updated > 0)
}

pub async fn delete(db: &SqlitePool, id: i64) -> Result<bool> {
    let deleted = sqlx::query("DELETE FROM not_found_log WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?
        .rows_affected();
    Ok(deleted > 0)
}

/// Delete entries not seen for more than `days` days
pub async fn purge_older_than(db: &SqlitePool, days: i64, now: i64) -> Result<u64> {
    if days < 0 {
        return Err(Error::InvalidInput(
            "retention days must not be negative".to_string(),
        ));
    }

    let cutoff = now - days * SECONDS_PER_DAY;
    let purged = sqlx::query("DELETE FROM not_found_log WHERE last_seen < ?")
        .bind(cutoff)
        .execute(db)
        .await?
        .rows_affected();
    Ok(purged)
}

/// `not_found_retention_days` setting
pub async fn retention_days(db: &SqlitePool) -> Result<i64> {
    get_setting_or(db, "not_found_retention_days", DEFAULT_RETENTION_DAYS).await
}
