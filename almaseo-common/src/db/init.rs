//! Database initialization
//!
//! Opens (or creates) the SQLite database, creates every table idempotently,
//! runs versioned migrations and seeds default settings.

use crate::Result;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Default values for every key in the `settings` table
///
/// Missing keys are inserted at startup and NULL values are reset.
pub const DEFAULT_SETTINGS: &[(&str, &str)] = &[
    // Evergreen thresholds
    ("evergreen_watch_days", "180"),
    ("evergreen_stale_days", "365"),
    ("evergreen_watch_traffic_drop", "20"),
    ("evergreen_stale_traffic_drop", "40"),
    ("evergreen_seasonal_detection", "true"),
    // Evergreen batch processing
    ("evergreen_batch_size", "50"),
    ("evergreen_rescore_after_days", "7"),
    ("evergreen_scan_interval_secs", "86400"), // daily
    ("evergreen_cache_ttl_secs", "3600"),      // 1 hour
    // 404 monitor
    ("not_found_retention_days", "90"),
    // Sitemap delta / IndexNow
    ("sitemap_delta_max_urls", "500"),
    ("indexnow_endpoint", "https://api.indexnow.org/indexnow"),
    ("indexnow_key", ""),
    ("site_host", ""),
];

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Options apply to every pooled connection, not just the first one
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        // Scores and traffic rows cascade with their post
        .foreign_keys(true)
        // WAL lets the dashboard read while a batch is writing
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    // Complex transformations run after CREATE TABLE IF NOT EXISTS
    crate::db::migrations::run_migrations(&pool).await?;

    init_default_settings(&pool).await?;

    Ok(pool)
}

/// Create every table (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_settings_table(pool).await?;
    create_posts_table(pool).await?;
    create_post_traffic_table(pool).await?;
    create_evergreen_scores_table(pool).await?;
    create_not_found_log_table(pool).await?;
    create_sitemap_delta_table(pool).await?;
    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the settings table
///
/// Stores application configuration key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Content items published by the site
///
/// `id` is the publisher's identifier, not generated here. Timestamps are
/// unix seconds. `evergreen_pinned` is owned by this service and is never
/// overwritten by content upserts.
async fn create_posts_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS posts (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL DEFAULT '',
            body TEXT NOT NULL DEFAULT '',
            url TEXT NOT NULL,
            post_type TEXT NOT NULL DEFAULT 'post',
            published INTEGER NOT NULL DEFAULT 1,
            published_at INTEGER NOT NULL,
            modified_at INTEGER,
            evergreen_pinned INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Click counts for the current and previous 90-day windows
async fn create_post_traffic_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS post_traffic (
            post_id INTEGER PRIMARY KEY REFERENCES posts(id) ON DELETE CASCADE,
            clicks_current INTEGER NOT NULL DEFAULT 0 CHECK (clicks_current >= 0),
            clicks_previous INTEGER NOT NULL DEFAULT 0 CHECK (clicks_previous >= 0),
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_evergreen_scores_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS evergreen_scores (
            post_id INTEGER PRIMARY KEY REFERENCES posts(id) ON DELETE CASCADE,
            status TEXT NOT NULL CHECK (status IN ('evergreen', 'watch', 'stale')),
            reasons TEXT NOT NULL DEFAULT '[]',
            published_days INTEGER NOT NULL,
            updated_days INTEGER NOT NULL,
            trend REAL,
            seasonal_marker TEXT,
            scored_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_not_found_log_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS not_found_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            path TEXT NOT NULL UNIQUE,
            hits INTEGER NOT NULL DEFAULT 1,
            last_referrer TEXT,
            last_user_agent TEXT,
            first_seen INTEGER NOT NULL,
            last_seen INTEGER NOT NULL,
            ignored INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_sitemap_delta_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sitemap_delta (
            url TEXT PRIMARY KEY,
            changed_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Initialize or update default settings
///
/// Ensures all required settings exist with default values.
/// It also handles NULL values by resetting them to defaults.
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    for (key, default_value) in DEFAULT_SETTINGS {
        ensure_setting(pool, key, default_value).await?;
    }
    Ok(())
}

async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    // INSERT OR IGNORE handles concurrent initialization
    let inserted = sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(default_value)
        .execute(pool)
        .await?
        .rows_affected();

    if inserted > 0 {
        info!("Initialized setting '{}' with default value: {}", key, default_value);
        return Ok(());
    }

    let reset = sqlx::query(
        "UPDATE settings SET value = ?, updated_at = CURRENT_TIMESTAMP WHERE key = ? AND value IS NULL",
    )
    .bind(default_value)
    .bind(key)
    .execute(pool)
    .await?
    .rows_affected();

    if reset > 0 {
        info!("Reset NULL setting '{}' to default value: {}", key, default_value);
    }

    Ok(())
}
