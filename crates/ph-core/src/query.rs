use crate::cache::{
    ALL_SKILLETS_KEY, COLLECTION_SUMMARY_KEY, CacheStore, Expiry, SKILLETS_CATEGORY,
};
use crate::error::{CacheError, PanhandlerError, SkilletError};
use crate::skillets::SkilletIndex;
use crate::store::Store;
use crate::types::{CollectionSummary, SkilletMetadata};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Name of the synthetic summary entry covering every non-app skillet.
pub const ALL_SKILLETS_COLLECTION: &str = "All Skillets";

/// Read side over the skillet index. Full listings go through the cache;
/// everything else is derived from a full listing.
pub struct SkilletQuery<'a, S: Store, C: CacheStore> {
    store: &'a S,
    cache: &'a C,
    app_id: &'a str,
    summary_expiry: Expiry,
}

impl<'a, S: Store, C: CacheStore> SkilletQuery<'a, S, C> {
    pub fn new(store: &'a S, cache: &'a C, app_id: &'a str, summary_expiry: Expiry) -> Self {
        Self {
            store,
            cache,
            app_id,
            summary_expiry,
        }
    }

    /// Every indexed skillet, ordered by name. A cached listing is returned
    /// as-is unless `refresh` is set.
    pub fn load_all(&self, refresh: bool) -> Result<Vec<SkilletMetadata>, PanhandlerError> {
        if !refresh {
            if let Some(cached) = self.cached::<Vec<SkilletMetadata>>(ALL_SKILLETS_KEY)? {
                return Ok(cached);
            }
        }
        self.update_cache()
    }

    /// Rebuilds the full listing from the index and stores it with no
    /// expiry. Records that no longer decode are skipped with a warning.
    pub fn update_cache(&self) -> Result<Vec<SkilletMetadata>, PanhandlerError> {
        let records = self.store.skillets().list_all()?;
        let mut skillets = Vec::with_capacity(records.len());
        for record in records {
            match record.metadata() {
                Ok(metadata) => skillets.push(metadata),
                Err(err) => tracing::warn!(skillet = %record.name, error = %err, "skipping unreadable skillet record"),
            }
        }
        skillets.sort_by(|a, b| a.name.cmp(&b.name));
        self.store_cached(ALL_SKILLETS_KEY, &skillets, Expiry::Never)?;
        Ok(skillets)
    }

    /// Drops every derived skillet entry and rebuilds the full listing.
    pub fn invalidate(&self) -> Result<Vec<SkilletMetadata>, PanhandlerError> {
        let evicted = self.cache.evict_category(self.app_id, SKILLETS_CATEGORY)?;
        tracing::debug!(evicted, "evicted skillet cache entries");
        self.update_cache()
    }

    pub fn load_by_name(&self, name: &str) -> Result<SkilletMetadata, PanhandlerError> {
        let record = self
            .store
            .skillets()
            .get_by_name(name)?
            .ok_or_else(|| SkilletError::NotFound {
                name: name.to_string(),
            })?;
        match record.metadata() {
            Ok(metadata) => Ok(metadata),
            Err(err) => {
                tracing::warn!(skillet = %name, error = %err, "stored skillet is unreadable");
                Err(SkilletError::NotFound {
                    name: name.to_string(),
                }
                .into())
            }
        }
    }

    pub fn load_by_label(
        &self,
        label: &str,
        value: &str,
    ) -> Result<Vec<SkilletMetadata>, PanhandlerError> {
        Ok(self
            .load_all(false)?
            .into_iter()
            .filter(|skillet| skillet.labels.contains(label, value))
            .collect())
    }

    /// Distinct values of `label` across all skillets, in the order they are
    /// first seen walking the listing by skillet name.
    pub fn load_label_values(&self, label: &str) -> Result<Vec<String>, PanhandlerError> {
        let mut seen = HashSet::new();
        let mut values = Vec::new();
        for skillet in self.load_all(false)? {
            for value in skillet.labels.values(label) {
                if seen.insert(value.clone()) {
                    values.push(value.clone());
                }
            }
        }
        Ok(values)
    }

    /// Collections named by `collection` labels with skillet counts and the
    /// other collections their skillets also belong to. App skillets are not
    /// counted. The first entry is always the synthetic "All Skillets".
    pub fn collection_summary(&self) -> Result<Vec<CollectionSummary>, PanhandlerError> {
        if let Some(cached) = self.cached::<Vec<CollectionSummary>>(COLLECTION_SUMMARY_KEY)? {
            return Ok(cached);
        }

        let skillets = self.load_all(false)?;
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut related: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut total = 0;
        for skillet in skillets.iter().filter(|skillet| !skillet.is_app()) {
            total += 1;
            let collections = skillet.collections();
            for collection in collections {
                *counts.entry(collection.clone()).or_default() += 1;
                let others = related.entry(collection.clone()).or_default();
                others.extend(
                    collections
                        .iter()
                        .filter(|other| *other != collection)
                        .cloned(),
                );
            }
        }

        let mut summary = vec![CollectionSummary {
            name: ALL_SKILLETS_COLLECTION.to_string(),
            count: total,
            related: Vec::new(),
        }];
        summary.extend(counts.into_iter().map(|(name, count)| CollectionSummary {
            related: related
                .remove(&name)
                .map(|set| set.into_iter().collect())
                .unwrap_or_default(),
            name,
            count,
        }));

        self.store_cached(COLLECTION_SUMMARY_KEY, &summary, self.summary_expiry)?;
        Ok(summary)
    }

    /// Skillets in a label-derived collection, ordered by their `order` label
    /// and then by name. "All Skillets" yields every non-app skillet.
    pub fn load_collection(&self, name: &str) -> Result<Vec<SkilletMetadata>, PanhandlerError> {
        let all = self.load_all(false)?;
        let mut members: Vec<SkilletMetadata> = if name == ALL_SKILLETS_COLLECTION {
            all.into_iter().filter(|skillet| !skillet.is_app()).collect()
        } else {
            all.into_iter()
                .filter(|skillet| skillet.collections().iter().any(|c| c == name))
                .collect()
        };
        members.sort_by(|a, b| {
            let a_order = a.order().unwrap_or(i64::MAX);
            let b_order = b.order().unwrap_or(i64::MAX);
            a_order.cmp(&b_order).then_with(|| a.name.cmp(&b.name))
        });
        Ok(members)
    }

    fn cached<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        let Some(value) = self.cache.get(self.app_id, key)? else {
            return Ok(None);
        };
        match serde_json::from_value(value) {
            Ok(decoded) => Ok(Some(decoded)),
            Err(err) => {
                tracing::warn!(key, error = %err, "discarding undecodable cache entry");
                self.cache.evict(self.app_id, key)?;
                Ok(None)
            }
        }
    }

    fn store_cached<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        expiry: Expiry,
    ) -> Result<(), CacheError> {
        let value = serde_json::to_value(value).map_err(|err| CacheError::Encode {
            message: err.to_string(),
        })?;
        self.cache
            .set(self.app_id, key, value, expiry, SKILLETS_CATEGORY)
    }
}
