//! Search use-case service.
//!
//! # Responsibility
//! - Own the lazily loaded dataset, the result cache and the geocoder.
//! - Expose search, suggestion and enumeration APIs to the session and CLI.
//!
//! # Invariants
//! - Every query awaits dataset initialization first.
//! - Filter errors are returned inside `SearchResult::error` and never cached.
//! - Cached results ignore `bounds_only`; narrowing happens after the lookup.

use crate::config::EngineConfig;
use crate::dataset::{DatasetSource, DatasetStore, InitializationError, LazyDatasetStore};
use crate::model::entity::FacetField;
use crate::model::geo::{Bounds, Coordinates};
use crate::search::cache::{ResultCache, DEFAULT_TTL};
use crate::search::filter::{filter, partition_by_bounds, FilterSet, SearchOptions};
use crate::search::geocode::{GeocodedArea, Geocoder, StaticGeocoder};
use crate::search::result::SearchResult;
use crate::search::suggest::{suggest, Suggestion, SuggestionLimits};
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

/// Service facade over dataset, filter engine and cache.
pub struct SearchService {
    source: Arc<dyn DatasetSource>,
    store: LazyDatasetStore,
    cache: ResultCache,
    geocoder: Arc<dyn Geocoder>,
    limits: SuggestionLimits,
}

impl SearchService {
    /// Service with the default TTL, geocoder and suggestion limits.
    pub fn new(source: Arc<dyn DatasetSource>) -> Self {
        Self {
            source,
            store: LazyDatasetStore::new(),
            cache: ResultCache::new(DEFAULT_TTL),
            geocoder: Arc::new(StaticGeocoder::default()),
            limits: SuggestionLimits::default(),
        }
    }

    /// Service wired from `config`, reading files from its data roots.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(Arc::new(config.dataset_source()))
            .with_cache_ttl(config.cache_ttl())
            .with_suggestion_limits(config.suggestion_limits())
    }

    pub fn with_geocoder(mut self, geocoder: Arc<dyn Geocoder>) -> Self {
        self.geocoder = geocoder;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache = ResultCache::new(ttl);
        self
    }

    pub fn with_suggestion_limits(mut self, limits: SuggestionLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Loads the datasets once; concurrent callers share the same load.
    ///
    /// # Errors
    /// - Returns `InitializationError` to every caller of a failed load. A
    ///   later call retries.
    pub async fn initialize(&self) -> Result<Arc<DatasetStore>, InitializationError> {
        if let Some(store) = self.store.get() {
            return Ok(store);
        }
        let store = self.store.get_or_load(Arc::clone(&self.source)).await?;
        info!(
            "event=service_initialize module=service status=ok entities={}",
            store.len()
        );
        Ok(store)
    }

    pub fn is_initialized(&self) -> bool {
        self.store.is_ready()
    }

    /// Runs a search, served from the cache when possible.
    ///
    /// # Errors
    /// - Returns `InitializationError` when the datasets cannot be loaded.
    ///   Filter errors come back as `Ok` with `SearchResult::error` set.
    pub async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<SearchResult, InitializationError> {
        let datasets = self.initialize().await?;
        let cached_options = SearchOptions {
            bounds_only: false,
            ..options.clone()
        };

        let outcome = self
            .cache
            .get_or_compute(query, &cached_options, || {
                std::future::ready(filter(&datasets, query, &cached_options))
            })
            .await;

        let result = match outcome {
            Ok(result) => result,
            Err(err) => {
                warn!("event=search module=service status=error error={}", err);
                return Ok(SearchResult::failed(err.to_string()));
            }
        };

        Ok(match (options.bounds_only, options.bounds) {
            (true, Some(bounds)) => partition_by_bounds(result, &bounds, true),
            _ => result,
        })
    }

    /// Autocomplete suggestions for `query`.
    pub async fn suggestions(&self, query: &str) -> Result<Vec<Suggestion>, InitializationError> {
        let datasets = self.initialize().await?;
        Ok(suggest(&datasets, query, self.limits))
    }

    /// Resolves `query` to a named area.
    pub async fn geocode_location(&self, query: &str) -> Option<GeocodedArea> {
        self.geocoder.geocode(query).await
    }

    /// Searches the square of `radius_km` around a point, returning only the
    /// contained entities.
    pub async fn search_by_location(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
        filters: FilterSet,
    ) -> Result<SearchResult, InitializationError> {
        let bounds = Bounds::around(Coordinates::new(latitude, longitude), radius_km);
        let options = SearchOptions {
            bounds: Some(bounds),
            filters,
            bounds_only: true,
        };
        self.search("", &options).await
    }

    pub async fn unique_categories(&self) -> Result<Vec<String>, InitializationError> {
        Ok(self.initialize().await?.unique_categories())
    }

    /// Distinct values of `field` across activities.
    pub async fn unique_filter_values(
        &self,
        field: FacetField,
    ) -> Result<Vec<String>, InitializationError> {
        Ok(self.initialize().await?.unique_facet_values(field))
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }
}
