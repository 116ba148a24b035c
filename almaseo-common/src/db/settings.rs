//! Key/value access to the `settings` table

use crate::{Error, Result};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::warn;

/// Read a raw setting value
///
/// Returns None when the key is missing or its value is NULL.
pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    Ok(value.flatten())
}

/// Read and parse a setting, falling back to `default`
///
/// Unparsable values are logged and replaced by the default rather than
/// failing the caller.
pub async fn get_setting_or<T>(pool: &SqlitePool, key: &str, default: T) -> Result<T>
where
    T: FromStr,
{
    match get_setting(pool, key).await? {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => Ok(value),
            Err(_) => {
                warn!("Setting '{}' has unparsable value '{}', using default", key, raw);
                Ok(default)
            }
        },
        None => Ok(default),
    }
}

const UPSERT_SETTING: &str = r#"
    INSERT INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
    ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
"#;

fn check_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(Error::InvalidInput("setting key must not be empty".to_string()));
    }
    Ok(())
}

/// Insert or replace a setting value
pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    check_key(key)?;

    sqlx::query(UPSERT_SETTING)
        .bind(key)
        .bind(value)
        .execute(pool)
        .await?;

    Ok(())
}

/// Write several settings in one transaction
///
/// Either every value is stored or none is.
pub async fn set_settings(pool: &SqlitePool, values: &[(&str, String)]) -> Result<()> {
    for (key, _) in values {
        check_key(key)?;
    }

    let mut tx = pool.begin().await?;
    for (key, value) in values {
        sqlx::query(UPSERT_SETTING)
            .bind(*key)
            .bind(value.as_str())
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    Ok(())
}
