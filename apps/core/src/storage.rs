//! Namespaced key/value storage.
//!
//! Every record is a JSON document stored verbatim under its own key, the way a browser
//! would keep it in local storage. Lists are trimmed to their last N items on write;
//! that is the only retention policy.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use std::path::Path;
use std::sync::LazyLock;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::AppError;

/// Storage keys and their retention.
pub mod keys {
    pub const KNOWLEDGE_GRAPHS: &str = "gyaanforge_knowledge_graphs";
    pub const ERROR_HISTORY: &str = "gyaanforge_error_history";
    pub const TRACES: &str = "gyaanforge_traces";
    pub const LEARNING_SESSION: &str = "gyaanforge_learning_session:v1";
    pub const TIMEBOX: &str = "timebox:v1";

    pub const MAX_KNOWLEDGE_GRAPHS: usize = 10;
    pub const MAX_ERROR_HISTORY: usize = 20;
    pub const MAX_TRACES: usize = 50;
}

/// Serializes writers. Two deferred SQLite transactions that both read before writing
/// fail with SQLITE_BUSY instead of waiting.
static WRITE_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub async fn init_db(db_path: &Path) -> Result<SqlitePool, AppError> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    info!("Initializing database at: {}", db_path.display());

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    info!("Database initialized and migrations applied.");

    Ok(pool)
}

async fn read_raw(tx: &mut Transaction<'_, Sqlite>, key: &str) -> Result<Option<String>, AppError> {
    let value = sqlx::query_scalar::<_, String>("SELECT value FROM kv_store WHERE key = ?")
        .bind(key)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(value)
}

async fn write_raw(tx: &mut Transaction<'_, Sqlite>, key: &str, value: &str) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO kv_store (key, value, updated_at)
        VALUES (?, ?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
    )
    .bind(key)
    .bind(value)
    .bind(Utc::now().timestamp())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Serializes `value` and stores it under `key`, replacing what was there.
pub async fn set_item<T: Serialize>(pool: &SqlitePool, key: &str, value: &T) -> Result<(), AppError> {
    let json = serde_json::to_string(value)?;
    let _guard = WRITE_LOCK.lock().await;
    let mut tx = pool.begin().await?;
    write_raw(&mut tx, key, &json).await?;
    tx.commit().await?;
    Ok(())
}

/// Reads and deserializes the value under `key`. Missing keys are `Ok(None)`; a value that
/// no longer matches `T` is an error.
pub async fn get_item<T: DeserializeOwned>(pool: &SqlitePool, key: &str) -> Result<Option<T>, AppError> {
    let raw = sqlx::query_scalar::<_, String>("SELECT value FROM kv_store WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    match raw {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

/// Like [`get_item`] but never fails: storage or decoding problems are logged and the
/// default is returned. Meant for values that only feed a view.
pub async fn load_or_default<T: DeserializeOwned + Default>(pool: &SqlitePool, key: &str) -> T {
    match get_item(pool, key).await {
        Ok(Some(value)) => value,
        Ok(None) => T::default(),
        Err(e) => {
            warn!("Falling back to default for '{}': {}", key, e);
            T::default()
        }
    }
}

/// Returns whether something was removed.
pub async fn remove_item(pool: &SqlitePool, key: &str) -> Result<bool, AppError> {
    let _guard = WRITE_LOCK.lock().await;
    let result = sqlx::query("DELETE FROM kv_store WHERE key = ?")
        .bind(key)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_keys(pool: &SqlitePool) -> Result<Vec<String>, AppError> {
    let keys = sqlx::query_scalar::<_, String>("SELECT key FROM kv_store ORDER BY key ASC")
        .fetch_all(pool)
        .await?;
    Ok(keys)
}

/// Appends `item` to the list under `key`, keeping only the last `max` items.
///
/// Runs as one transaction. A stored value that is not a list of `T` is discarded and
/// the list restarts with `item`.
pub async fn push_capped<T>(pool: &SqlitePool, key: &str, item: T, max: usize) -> Result<Vec<T>, AppError>
where
    T: Serialize + DeserializeOwned,
{
    let _guard = WRITE_LOCK.lock().await;
    let mut tx = pool.begin().await?;

    let mut items: Vec<T> = match read_raw(&mut tx, key).await? {
        Some(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
            warn!("Discarding unreadable list under '{}': {}", key, e);
            Vec::new()
        }),
        None => Vec::new(),
    };

    items.push(item);
    if items.len() > max {
        let overflow = items.len() - max;
        items.drain(..overflow);
    }

    let json = serde_json::to_string(&items)?;
    write_raw(&mut tx, key, &json).await?;
    tx.commit().await?;

    Ok(items)
}
