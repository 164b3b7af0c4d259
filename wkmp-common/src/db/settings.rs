//! Settings table access
//!
//! Key-value settings shared by WKMP modules. wkmp-sc keeps its bearer token
//! signing secret here so that tokens survive restarts.

use crate::{Error, Result};
use rand::RngCore;
use sqlx::SqlitePool;
use tracing::info;

/// Settings key holding the bearer token signing secret (hex)
pub const TOKEN_SECRET_KEY: &str = "subsonic_token_secret";

/// Read a setting value; NULL and missing both map to `None`
pub async fn get_setting(db: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(db)
            .await?;

    Ok(value.flatten())
}

/// Insert or overwrite a setting value
pub async fn set_setting(db: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
    )
    .bind(key)
    .bind(value)
    .execute(db)
    .await?;

    Ok(())
}

/// Load the bearer token signing secret, generating it on first use
///
/// Two modules starting at once may both generate a secret; `INSERT OR IGNORE`
/// keeps the first one stored and both callers return that value.
///
/// # Examples
///
/// ```ignore
/// let secret = load_token_secret(&db).await?;
/// let codec = TokenCodec::new(secret, "wkmp-sc");
/// ```
pub async fn load_token_secret(db: &SqlitePool) -> Result<Vec<u8>> {
    if let Some(existing) = get_setting(db, TOKEN_SECRET_KEY).await? {
        if !existing.is_empty() {
            return hex::decode(&existing).map_err(|e| {
                Error::Config(format!("Setting '{}' is not valid hex: {}", TOKEN_SECRET_KEY, e))
            });
        }
    }

    let mut secret = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut secret);

    sqlx::query(
        "INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)",
    )
    .bind(TOKEN_SECRET_KEY)
    .bind(hex::encode(secret))
    .execute(db)
    .await?;

    // Empty value left behind by hand editing: replace it
    sqlx::query("UPDATE settings SET value = ? WHERE key = ? AND (value IS NULL OR value = '')")
        .bind(hex::encode(secret))
        .bind(TOKEN_SECRET_KEY)
        .execute(db)
        .await?;

    info!("Initialized bearer token signing secret");

    let stored = get_setting(db, TOKEN_SECRET_KEY)
        .await?
        .ok_or_else(|| Error::Internal("Token secret vanished after insert".to_string()))?;
    hex::decode(&stored)
        .map_err(|e| Error::Config(format!("Setting '{}' is not valid hex: {}", TOKEN_SECRET_KEY, e)))
}
