use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use thiserror::Error;

use super::Database;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Cached payload for '{key}' is unreadable: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Cache lock poisoned")]
    LockPoisoned,
}

/// Key-scoped JSON blob cache on top of the local database.
///
/// Writes are synchronous and ordered by call order.
#[derive(Clone)]
pub struct LocalCache {
    db: Arc<Database>,
}

impl LocalCache {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn read_raw(&self, key: &str) -> Result<Option<String>, CacheError> {
        let conn = self.db.conn.lock().map_err(|_| CacheError::LockPoisoned)?;

        let payload = conn
            .query_row(
                "SELECT payload FROM local_cache WHERE key = ?",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        Ok(payload)
    }

    pub fn write_raw(&self, key: &str, payload: &str) -> Result<(), CacheError> {
        let conn = self.db.conn.lock().map_err(|_| CacheError::LockPoisoned)?;

        conn.execute(
            "INSERT INTO local_cache (key, payload, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at",
            params![key, payload, Utc::now().timestamp()],
        )?;

        Ok(())
    }

    /// Read and decode a cached value. An undecodable blob is reported as `Corrupt`.
    pub fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        let Some(payload) = self.read_raw(key)? else {
            return Ok(None);
        };

        serde_json::from_str(&payload)
            .map(Some)
            .map_err(|source| CacheError::Corrupt {
                key: key.to_string(),
                source,
            })
    }

    pub fn write_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        let payload = serde_json::to_string(value)?;
        self.write_raw(key, &payload)
    }

    /// Unix seconds of the last write to `key`
    pub fn updated_at(&self, key: &str) -> Result<Option<i64>, CacheError> {
        let conn = self.db.conn.lock().map_err(|_| CacheError::LockPoisoned)?;

        let ts = conn
            .query_row(
                "SELECT updated_at FROM local_cache WHERE key = ?",
                [key],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;

        Ok(ts)
    }
}
