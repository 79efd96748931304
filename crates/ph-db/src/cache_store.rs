use crate::schema::open_and_migrate;
use crate::util::{decode_json, encode_json, from_rfc3339, to_rfc3339};
use chrono::{DateTime, Utc};
use ph_core::cache::{CacheStore, Expiry};
use ph_core::error::CacheError;
use rusqlite::Connection;
use serde_json::Value;
use std::path::Path;

/// Cache entries persisted in the index database, so derived listings
/// survive process restarts.
pub struct SqliteCache {
    conn: Connection,
}

fn unavailable(err: impl std::fmt::Display) -> CacheError {
    CacheError::Unavailable {
        message: err.to_string(),
    }
}

impl SqliteCache {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn open(path: &Path) -> Result<Self, CacheError> {
        open_and_migrate(path).map(Self::new).map_err(unavailable)
    }

    /// Drops expired entries and returns how many went.
    pub fn cleanup(&self, now: DateTime<Utc>) -> Result<u64, CacheError> {
        let affected = self
            .conn
            .execute(
                "DELETE FROM cache_entries WHERE expires_at IS NOT NULL AND expires_at <= ?1",
                [to_rfc3339(&now)],
            )
            .map_err(unavailable)?;
        Ok(affected as u64)
    }
}

impl CacheStore for SqliteCache {
    fn get(&self, app_id: &str, key: &str) -> Result<Option<Value>, CacheError> {
        let mut stmt = self
            .conn
            .prepare("SELECT value_json, expires_at FROM cache_entries WHERE app_id = ?1 AND key = ?2")
            .map_err(unavailable)?;
        let mut rows = stmt.query([app_id, key]).map_err(unavailable)?;
        let Some(row) = rows.next().map_err(unavailable)? else {
            return Ok(None);
        };
        let value_json: String = row.get(0).map_err(unavailable)?;
        let expires_at: Option<String> = row.get(1).map_err(unavailable)?;

        if let Some(expires_at) = expires_at {
            let expires_at = from_rfc3339(&expires_at).map_err(unavailable)?;
            if expires_at <= Utc::now() {
                self.evict(app_id, key)?;
                return Ok(None);
            }
        }
        decode_json(&value_json).map(Some).map_err(unavailable)
    }

    fn set(
        &self,
        app_id: &str,
        key: &str,
        value: Value,
        expiry: Expiry,
        category: &str,
    ) -> Result<(), CacheError> {
        let now = Utc::now();
        let expires_at = match expiry {
            Expiry::Never => None,
            Expiry::After(ttl) => {
                let ttl = chrono::Duration::from_std(ttl).map_err(|err| CacheError::Encode {
                    message: err.to_string(),
                })?;
                Some(to_rfc3339(&(now + ttl)))
            }
        };
        let value_json = encode_json(&value).map_err(|err| CacheError::Encode {
            message: err.to_string(),
        })?;
        self.conn
            .execute(
                "INSERT INTO cache_entries (app_id, key, category, value_json, expires_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6) ON CONFLICT(app_id, key) DO UPDATE SET category = excluded.category, value_json = excluded.value_json, expires_at = excluded.expires_at, updated_at = excluded.updated_at",
                (app_id, key, category, value_json, expires_at, to_rfc3339(&now)),
            )
            .map_err(unavailable)?;
        Ok(())
    }

    fn evict(&self, app_id: &str, key: &str) -> Result<(), CacheError> {
        self.conn
            .execute(
                "DELETE FROM cache_entries WHERE app_id = ?1 AND key = ?2",
                [app_id, key],
            )
            .map_err(unavailable)?;
        Ok(())
    }

    fn evict_category(&self, app_id: &str, category: &str) -> Result<usize, CacheError> {
        self.conn
            .execute(
                "DELETE FROM cache_entries WHERE app_id = ?1 AND category = ?2",
                [app_id, category],
            )
            .map_err(unavailable)
    }
}
