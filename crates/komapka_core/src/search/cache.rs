//! Time-bounded cache of search results.
//!
//! # Responsibility
//! - Memoize results per normalized query, bounds and filter selection.
//! - Expire entries lazily on read.
//!
//! # Invariants
//! - A hit is returned only while younger than the TTL.
//! - Failed computations are never stored.
//! - The entry lock is never held across an await point.

use crate::model::geo::Bounds;
use crate::search::filter::SearchOptions;
use crate::search::normalize::normalize;
use crate::search::result::SearchResult;
use log::debug;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

struct CacheEntry {
    stored_at: Instant,
    result: SearchResult,
}

/// Keyed result cache with a fixed TTL and no size bound.
pub struct ResultCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Builds `q:<query>|b:<bbox|none>|f:<filters|none>`.
    ///
    /// `bounds_only` is not part of the key; it is applied to the cached full
    /// result by the caller.
    pub fn cache_key(query: &str, options: &SearchOptions) -> String {
        format!(
            "q:{}|b:{}|f:{}",
            normalize(query.trim()),
            options
                .bounds
                .as_ref()
                .map(Bounds::bbox_string)
                .unwrap_or_else(|| "none".to_string()),
            options
                .filters
                .cache_fragment()
                .unwrap_or_else(|| "none".to_string())
        )
    }

    /// Returns a fresh entry, dropping it when expired.
    pub fn get(&self, key: &str) -> Option<SearchResult> {
        let mut entries = self.entries.lock();
        let fresh = entries
            .get(key)
            .map(|entry| entry.stored_at.elapsed() < self.ttl)?;
        if fresh {
            entries.get(key).map(|entry| entry.result.clone())
        } else {
            entries.remove(key);
            debug!("event=cache_expired module=cache status=ok");
            None
        }
    }

    /// Stores `result` stamped with the current instant. Error results are
    /// ignored.
    pub fn insert(&self, key: String, result: &SearchResult) {
        if result.is_error() {
            return;
        }
        self.entries.lock().insert(
            key,
            CacheEntry {
                stored_at: Instant::now(),
                result: result.clone(),
            },
        );
    }

    /// Returns the cached result for `query`/`options` or runs `compute`.
    ///
    /// Concurrent misses for the same key may compute twice; the last write
    /// wins.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        query: &str,
        options: &SearchOptions,
        compute: F,
    ) -> Result<SearchResult, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<SearchResult, E>>,
    {
        let key = Self::cache_key(query, options);
        if let Some(hit) = self.get(&key) {
            debug!("event=cache_hit module=cache status=ok entries={}", self.len());
            return Ok(hit);
        }

        let result = compute().await?;
        self.insert(key, &result);
        debug!("event=cache_miss module=cache status=stored entries={}", self.len());
        Ok(result)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::ResultCache;
    use crate::model::entity::Entity;
    use crate::model::geo::Bounds;
    use crate::search::filter::{FilterSet, SearchOptions};
    use crate::search::result::SearchResult;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn sample() -> SearchResult {
        let mut result = SearchResult::default();
        result.activities.push(Arc::new(Entity::with_id("a", "Koncert")));
        result
    }

    #[test]
    fn key_normalizes_query_and_marks_missing_parts() {
        let key = ResultCache::cache_key(" Kavárna ", &SearchOptions::default());
        assert_eq!(key, "q:kavarna|b:none|f:none");

        let options = SearchOptions::within(Bounds::new(50.0, 14.0, 51.0, 15.0)).with_filters(
            FilterSet {
                categories: vec!["sport".to_string()],
                ..FilterSet::default()
            },
        );
        assert_eq!(
            ResultCache::cache_key("", &options),
            r#"q:|b:14.000000,50.000000,15.000000,51.000000|f:{"categories":["sport"]}"#
        );
    }

    #[test]
    fn bounds_only_does_not_change_the_key() {
        let mut options = SearchOptions::within(Bounds::new(50.0, 14.0, 51.0, 15.0));
        let full = ResultCache::cache_key("x", &options);
        options.bounds_only = true;
        assert_eq!(ResultCache::cache_key("x", &options), full);
    }

    #[tokio::test(start_paused = true)]
    async fn hit_within_ttl_and_recompute_after_expiry() {
        let cache = ResultCache::new(Duration::from_secs(300));
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let compute = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Infallible>(sample())
        };

        let first = cache
            .get_or_compute("koncert", &SearchOptions::default(), compute)
            .await
            .expect("compute is infallible");
        tokio::time::advance(Duration::from_secs(299)).await;
        let second = cache
            .get_or_compute("koncert", &SearchOptions::default(), compute)
            .await
            .expect("compute is infallible");
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        cache
            .get_or_compute("koncert", &SearchOptions::default(), compute)
            .await
            .expect("compute is infallible");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let cache = ResultCache::default();
        let failed = cache
            .get_or_compute("x", &SearchOptions::default(), || async { Err::<SearchResult, _>("boom") })
            .await;
        assert_eq!(failed, Err("boom"));

        let degraded = cache
            .get_or_compute("y", &SearchOptions::default(), || async {
                Ok::<_, Infallible>(SearchResult::failed("bad filter"))
            })
            .await
            .expect("compute is infallible");
        assert!(degraded.is_error());
        assert!(cache.is_empty());
    }

    #[test]
    fn cached_copy_shares_entities_without_exposing_the_entry() {
        let cache = ResultCache::default();
        let result = sample();
        cache.insert("k".to_string(), &result);

        let mut copy = cache.get("k").expect("entry should be fresh");
        copy.activities.clear();
        let again = cache.get("k").expect("entry should be fresh");
        assert_eq!(again.activities.len(), 1);
        assert!(Arc::ptr_eq(&again.activities[0], &result.activities[0]));

        cache.clear();
        assert!(cache.get("k").is_none());
    }
}
