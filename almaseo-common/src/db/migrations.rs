//! Database schema migrations
//!
//! Versioned migrations tracked in the `schema_version` table. Each migration
//! is idempotent and safe to run against a database that already has the
//! change.
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations**
//! 2. **Always add new migrations** and bump `CURRENT_SCHEMA_VERSION`
//! 3. **Use ALTER TABLE** - Prefer ALTER TABLE over DROP/CREATE to preserve data

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Get current schema version from database
///
/// Returns 0 if schema_version table doesn't exist or has no rows
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("✓ Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("✓ Migration v2 completed");
    }

    info!("All migrations completed successfully");
    Ok(())
}

/// Migration v1: Add seasonal_marker column to evergreen_scores
///
/// Early score tables only stored a boolean seasonal flag inside the reasons
/// list; the matched marker now has its own column.
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v1: Add seasonal_marker column to evergreen_scores");

    let has_column: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('evergreen_scores') WHERE name = 'seasonal_marker'",
    )
    .fetch_one(pool)
    .await?;

    if has_column > 0 {
        info!("  seasonal_marker column already exists - skipping");
        return Ok(());
    }

    sqlx::query("ALTER TABLE evergreen_scores ADD COLUMN seasonal_marker TEXT")
        .execute(pool)
        .await?;

    info!("  ✓ Added seasonal_marker column to evergreen_scores table");
    Ok(())
}

/// Migration v2: Indexes for dashboard counts and batch selection
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v2: Add evergreen and 404 indexes");

    for statement in [
        "CREATE INDEX IF NOT EXISTS idx_evergreen_scores_status ON evergreen_scores(status)",
        "CREATE INDEX IF NOT EXISTS idx_evergreen_scores_scored_at ON evergreen_scores(scored_at)",
        "CREATE INDEX IF NOT EXISTS idx_posts_published ON posts(published)",
        "CREATE INDEX IF NOT EXISTS idx_not_found_last_seen ON not_found_log(last_seen)",
        "CREATE INDEX IF NOT EXISTS idx_sitemap_delta_changed_at ON sitemap_delta(changed_at)",
    ] {
        sqlx::query(statement).execute(pool).await?;
    }

    Ok(())
}
