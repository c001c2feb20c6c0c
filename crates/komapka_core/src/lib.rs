//! Core engine of the Komapka map viewer.
//! Searching, filtering and marker management over static point-of-interest
//! datasets; UI surfaces plug in through traits.

pub mod config;
pub mod dataset;
pub mod geolocation;
pub mod logging;
pub mod map;
pub mod model;
pub mod providers;
pub mod search;
pub mod service;
pub mod viewport;

pub use config::{ConfigError, EngineConfig};
pub use dataset::{
    DataLoadError, DatasetFiles, DatasetSource, DatasetStore, FileDatasetSource,
    InitializationError, LazyDatasetStore,
};
pub use geolocation::{FixedGeolocator, GeolocationError, Geolocator};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use map::{InMemoryMapLayer, MapLayer, MarkerKey, MarkerReconciler, MarkerState};
pub use model::entity::{Entity, EntityKind, FacetField};
pub use model::geo::{Bounds, Coordinates};
pub use providers::{
    ActivityProvider, GoOutProvider, KudyZNudyProvider, ProviderError, ProviderRegistry,
    ProviderRegistryError,
};
pub use search::filter::{filter, Environment, FilterSet, PriceRange, SearchError, SearchOptions};
pub use search::geocode::{GeocodedArea, Geocoder, StaticGeocoder};
pub use search::result::{KindCounts, SearchResult};
pub use search::suggest::{Suggestion, SuggestionLimits};
pub use service::map_session::{MapSession, MapView, ResultPanel, SelectCallback, SessionError};
pub use service::search_service::SearchService;
pub use viewport::{ViewportDecision, ViewportState};
