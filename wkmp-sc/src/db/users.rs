//! Credential store
//!
//! The negotiator only ever sees the [`CredentialStore`] trait; production
//! uses [`SqliteCredentialStore`] over the shared `users` table, tests use an
//! in-memory double.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::info;
use wkmp_common::api::{generate_api_key, hash_password};
use wkmp_common::{Error, Result};

/// Everything the negotiator needs to verify one user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub id: i64,
    pub username: String,
    /// Argon2 PHC string
    pub password_hash: String,
    /// Plaintext kept only for the salted-digest scheme
    pub legacy_password: Option<String>,
    pub is_admin: bool,
    pub api_key: Option<String>,
    pub email: Option<String>,
}

/// The authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: i64,
    pub username: String,
    pub is_admin: bool,
}

impl From<&CredentialRecord> for Identity {
    fn from(record: &CredentialRecord) -> Self {
        Self {
            id: record.id,
            username: record.username.clone(),
            is_admin: record.is_admin,
        }
    }
}

/// Read-mostly access to user credentials
///
/// `Ok(None)` means the row is absent; `Err` is a store failure.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn lookup_by_username(&self, username: &str) -> Result<Option<CredentialRecord>>;

    async fn lookup_by_api_key(&self, api_key: &str) -> Result<Option<Identity>>;

    /// Replace (or clear, with `None`) a user's API key
    async fn set_api_key(&self, user_id: i64, api_key: Option<&str>) -> Result<()>;
}

/// Return the user's API key, generating and storing one if absent
///
/// Two concurrent first-time calls may both generate a key; the last write
/// wins and each caller gets back what it wrote.
pub async fn issue_api_key<S: CredentialStore + ?Sized>(store: &S, username: &str) -> Result<String> {
    let record = store
        .lookup_by_username(username)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User '{}'", username)))?;

    if let Some(existing) = record.api_key.filter(|k| !k.is_empty()) {
        return Ok(existing);
    }

    let key = generate_api_key();
    store.set_api_key(record.id, Some(&key)).await?;
    info!("Issued API key for user {}", record.username);
    Ok(key)
}

/// Remove a user's API key
pub async fn revoke_api_key<S: CredentialStore + ?Sized>(store: &S, username: &str) -> Result<()> {
    let record = store
        .lookup_by_username(username)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User '{}'", username)))?;

    store.set_api_key(record.id, None).await?;
    info!("Revoked API key for user {}", record.username);
    Ok(())
}

/// [`CredentialStore`] over the `users` table
#[derive(Debug, Clone)]
pub struct SqliteCredentialStore {
    db: SqlitePool,
}

impl SqliteCredentialStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn lookup_by_username(&self, username: &str) -> Result<Option<CredentialRecord>> {
        let row = sqlx::query(
            "SELECT id, username, password_hash, legacy_password, is_admin, api_key, email
             FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(|row| CredentialRecord {
            id: row.get("id"),
            username: row.get("username"),
            password_hash: row.get("password_hash"),
            legacy_password: row.get("legacy_password"),
            is_admin: row.get::<i64, _>("is_admin") != 0,
            api_key: row.get("api_key"),
            email: row.get("email"),
        }))
    }

    async fn lookup_by_api_key(&self, api_key: &str) -> Result<Option<Identity>> {
        let row = sqlx::query("SELECT id, username, is_admin FROM users WHERE api_key = ?")
            .bind(api_key)
            .fetch_optional(&self.db)
            .await?;

        Ok(row.map(|row| Identity {
            id: row.get("id"),
            username: row.get("username"),
            is_admin: row.get::<i64, _>("is_admin") != 0,
        }))
    }

    async fn set_api_key(&self, user_id: i64, api_key: Option<&str>) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users SET api_key = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(api_key)
        .bind(user_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("User id {}", user_id)));
        }
        Ok(())
    }
}

/// Create a user with an Argon2id password hash
///
/// `keep_legacy_password` additionally stores the plaintext so the user can
/// log in with the salted-digest scheme.
pub async fn create_user(
    db: &SqlitePool,
    username: &str,
    password: &str,
    is_admin: bool,
    keep_legacy_password: bool,
) -> Result<i64> {
    if username.is_empty() {
        return Err(Error::InvalidInput("Username must not be empty".to_string()));
    }
    if password.is_empty() {
        return Err(Error::InvalidInput("Password must not be empty".to_string()));
    }

    let password_hash = hash_password(password)?;
    let legacy_password = keep_legacy_password.then_some(password);

    let id = sqlx::query(
        "INSERT INTO users (username, password_hash, legacy_password, is_admin)
         VALUES (?, ?, ?, ?)",
    )
    .bind(username)
    .bind(&password_hash)
    .bind(legacy_password)
    .bind(is_admin as i64)
    .execute(db)
    .await?
    .last_insert_rowid();

    info!("Created user {} (id {}, admin: {})", username, id, is_admin);
    Ok(id)
}

/// Username for an id (playlist owners)
pub async fn username_for_id(db: &SqlitePool, user_id: i64) -> Result<Option<String>> {
    let name = sqlx::query_scalar("SELECT username FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(db)
        .await?;
    Ok(name)
}
