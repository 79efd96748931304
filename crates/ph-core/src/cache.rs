use crate::error::CacheError;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const ALL_SKILLETS_KEY: &str = "all_skillets";
pub const COLLECTION_SUMMARY_KEY: &str = "collection_summary";
pub const REPOSITORIES_KEY: &str = "imported_repositories";

pub const SKILLETS_CATEGORY: &str = "skillets";
pub const REPOSITORIES_CATEGORY: &str = "repositories";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    Never,
    After(Duration),
}

impl Expiry {
    pub fn from_secs(secs: u64) -> Self {
        Expiry::After(Duration::from_secs(secs))
    }
}

/// Key/value store for derived data, namespaced by application id and
/// grouped into categories for bulk eviction.
pub trait CacheStore {
    fn get(&self, app_id: &str, key: &str) -> Result<Option<Value>, CacheError>;
    fn set(
        &self,
        app_id: &str,
        key: &str,
        value: Value,
        expiry: Expiry,
        category: &str,
    ) -> Result<(), CacheError>;
    fn evict(&self, app_id: &str, key: &str) -> Result<(), CacheError>;
    /// Removes every entry of `category` and returns how many went.
    fn evict_category(&self, app_id: &str, category: &str) -> Result<usize, CacheError>;
}

impl<C: CacheStore + ?Sized> CacheStore for &C {
    fn get(&self, app_id: &str, key: &str) -> Result<Option<Value>, CacheError> {
        (**self).get(app_id, key)
    }

    fn set(
        &self,
        app_id: &str,
        key: &str,
        value: Value,
        expiry: Expiry,
        category: &str,
    ) -> Result<(), CacheError> {
        (**self).set(app_id, key, value, expiry, category)
    }

    fn evict(&self, app_id: &str, key: &str) -> Result<(), CacheError> {
        (**self).evict(app_id, key)
    }

    fn evict_category(&self, app_id: &str, category: &str) -> Result<usize, CacheError> {
        (**self).evict_category(app_id, category)
    }
}

struct MemoryEntry {
    value: Value,
    category: String,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Process-local cache, used by tests and when no database cache is wanted.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<(String, String), MemoryEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<(String, String), MemoryEntry>>, CacheError>
    {
        self.entries.lock().map_err(|_| CacheError::Unavailable {
            message: "cache lock poisoned".to_string(),
        })
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, app_id: &str, key: &str) -> Result<Option<Value>, CacheError> {
        let mut entries = self.lock()?;
        let map_key = (app_id.to_string(), key.to_string());
        match entries.get(&map_key) {
            Some(entry) if entry.is_live(Instant::now()) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(&map_key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn set(
        &self,
        app_id: &str,
        key: &str,
        value: Value,
        expiry: Expiry,
        category: &str,
    ) -> Result<(), CacheError> {
        let expires_at = match expiry {
            Expiry::Never => None,
            Expiry::After(ttl) => Some(Instant::now() + ttl),
        };
        self.lock()?.insert(
            (app_id.to_string(), key.to_string()),
            MemoryEntry {
                value,
                category: category.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    fn evict(&self, app_id: &str, key: &str) -> Result<(), CacheError> {
        self.lock()?.remove(&(app_id.to_string(), key.to_string()));
        Ok(())
    }

    fn evict_category(&self, app_id: &str, category: &str) -> Result<usize, CacheError> {
        let mut entries = self.lock()?;
        let before = entries.len();
        entries.retain(|(app, _), entry| !(app == app_id && entry.category == category));
        Ok(before - entries.len())
    }
}
