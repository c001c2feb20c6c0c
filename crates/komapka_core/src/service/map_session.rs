//! Interactive map session.
//!
//! # Responsibility
//! - Hold the active query, filters, viewport bookkeeping, last result and
//!   marker layer of one map view.
//! - Turn user and map events into searches, marker reconciliation and
//!   panel output.
//!
//! # Invariants
//! - The state lock is never held across an await.
//! - A result is applied only if no newer request started while it ran.
//! - While a single-item detail is open, viewport changes are ignored.
//! - During a category search the panel lists activities only; markers still
//!   cover every kind.

use crate::config::EngineConfig;
use crate::dataset::InitializationError;
use crate::geolocation::{GeolocationError, Geolocator};
use crate::map::{MapLayer, MarkerKey, MarkerReconciler, MarkerStyle};
use crate::model::entity::{Entity, EntityKind};
use crate::model::geo::{Bounds, Coordinates};
use crate::search::filter::{FilterSet, SearchOptions};
use crate::search::result::SearchResult;
use crate::service::search_service::SearchService;
use crate::viewport::{compute_buffer_bounds, Debouncer, ViewportDecision, ViewportState};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Weak};

/// Panel title used when no text query is active.
pub const NEARBY_TITLE: &str = "Tipy v okolí:";

/// Click callback handed to the panel with every render.
pub type SelectCallback = Arc<dyn Fn(EntityKind, Arc<Entity>) + Send + Sync>;

/// Result list shown next to the map.
pub trait ResultPanel: Send + Sync {
    fn render(&self, title: &str, result: &SearchResult, on_select: SelectCallback);
    fn set_loading(&self, loading: bool);
    fn show_message(&self, message: &str);
    fn show_detail(&self, kind: EntityKind, entity: &Arc<Entity>);
}

/// Session-level failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    Initialization(InitializationError),
    Geolocation(GeolocationError),
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialization(err) => write!(f, "{err}"),
            Self::Geolocation(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Initialization(err) => Some(err),
            Self::Geolocation(err) => Some(err),
        }
    }
}

impl From<InitializationError> for SessionError {
    fn from(value: InitializationError) -> Self {
        Self::Initialization(value)
    }
}

impl From<GeolocationError> for SessionError {
    fn from(value: GeolocationError) -> Self {
        Self::Geolocation(value)
    }
}

/// Visible map area and zoom level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapView {
    pub bounds: Bounds,
    pub zoom: f64,
}

impl MapView {
    pub fn new(bounds: Bounds, zoom: f64) -> Self {
        Self { bounds, zoom }
    }
}

/// Area a search result is applied to.
#[derive(Debug, Clone, Copy)]
struct Placement {
    current: Bounds,
    buffer: Bounds,
    zoom: f64,
}

struct SessionState<L> {
    query: String,
    filters: FilterSet,
    view: MapView,
    viewport: ViewportState,
    last_result: Option<SearchResult>,
    reconciler: MarkerReconciler,
    layer: L,
    detail_open: bool,
    category_search: bool,
}

/// Controller of one map view.
pub struct MapSession<L: MapLayer + 'static> {
    this: Weak<Self>,
    service: Arc<SearchService>,
    panel: Arc<dyn ResultPanel>,
    config: EngineConfig,
    debouncer: Debouncer,
    state: Mutex<SessionState<L>>,
}

impl<L: MapLayer + 'static> MapSession<L> {
    pub fn new(
        service: Arc<SearchService>,
        panel: Arc<dyn ResultPanel>,
        layer: L,
        view: MapView,
        config: EngineConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            service,
            panel,
            config,
            debouncer: Debouncer::new(),
            state: Mutex::new(SessionState {
                query: String::new(),
                filters: FilterSet::default(),
                view,
                viewport: ViewportState::default(),
                last_result: None,
                reconciler: MarkerReconciler::new(MarkerStyle::default()),
                layer,
                detail_open: false,
                category_search: false,
            }),
        })
    }

    pub fn query(&self) -> String {
        self.state.lock().query.clone()
    }

    pub fn filters(&self) -> FilterSet {
        self.state.lock().filters.clone()
    }

    pub fn view(&self) -> MapView {
        self.state.lock().view
    }

    pub fn viewport(&self) -> ViewportState {
        self.state.lock().viewport.clone()
    }

    pub fn last_result(&self) -> Option<SearchResult> {
        self.state.lock().last_result.clone()
    }

    pub fn selected(&self) -> Option<MarkerKey> {
        self.state.lock().reconciler.selected().cloned()
    }

    pub fn marker_count(&self) -> usize {
        self.state.lock().reconciler.len()
    }

    pub fn is_detail_open(&self) -> bool {
        self.state.lock().detail_open
    }

    pub fn is_category_search(&self) -> bool {
        self.state.lock().category_search
    }

    /// Runs `f` against the marker layer.
    pub fn with_layer<R>(&self, f: impl FnOnce(&L) -> R) -> R {
        f(&self.state.lock().layer)
    }

    /// First search over the current view.
    pub async fn load_initial(&self) -> Result<SearchResult, SessionError> {
        let generation = self.debouncer.cancel();
        let (query, filters, view) = {
            let mut state = self.state.lock();
            state.category_search = false;
            (state.query.clone(), state.filters.clone(), state.view)
        };
        let placement = self.placement_for(view);
        self.search_and_present(generation, &query, filters, placement, false)
            .await
    }

    /// Text search. A recognized place name moves the map to that area and
    /// lists everything inside it.
    pub async fn submit_query(&self, text: &str) -> Result<SearchResult, SessionError> {
        let generation = self.debouncer.cancel();
        let text = text.trim().to_string();

        if text.chars().count() > 2 {
            if let Some(area) = self.service.geocode_location(&text).await {
                info!(
                    "event=session_geocode module=session status=ok area={}",
                    area.name
                );
                let (filters, zoom) = {
                    let mut state = self.state.lock();
                    state.query.clear();
                    state.detail_open = false;
                    state.category_search = false;
                    state.layer.fit_bounds(&area.bounds);
                    state.view = MapView::new(area.bounds, state.view.zoom);
                    (state.filters.clone(), state.view.zoom)
                };
                let placement = Placement {
                    current: area.bounds,
                    buffer: area.bounds.pad(self.config.geocode_buffer_pad),
                    zoom,
                };
                return self
                    .present_search(generation, &text, "", filters, placement, false)
                    .await;
            }
        }

        let (filters, view) = {
            let mut state = self.state.lock();
            state.query = text.clone();
            state.detail_open = false;
            state.category_search = false;
            (state.filters.clone(), state.view)
        };
        let placement = self.placement_for(view);
        self.search_and_present(generation, &text, filters, placement, false)
            .await
    }

    /// Replaces the active filters and searches again.
    pub async fn set_filters(&self, filters: FilterSet) -> Result<SearchResult, SessionError> {
        let generation = self.debouncer.cancel();
        let (query, view) = {
            let mut state = self.state.lock();
            state.filters = filters.clone();
            state.detail_open = false;
            state.category_search = false;
            (state.query.clone(), state.view)
        };
        let placement = self.placement_for(view);
        self.search_and_present(generation, &query, filters, placement, false)
            .await
    }

    /// Quick category search: drops the detailed filters, searches for the
    /// category name without geocoding and lists activities only. A blank
    /// category clears everything.
    pub async fn search_category(&self, category: &str) -> Result<SearchResult, SessionError> {
        let category = category.trim().to_string();
        if category.is_empty() {
            return self.clear_all().await;
        }

        let generation = self.debouncer.cancel();
        let view = {
            let mut state = self.state.lock();
            state.query = category.clone();
            state.filters = FilterSet::default();
            state.detail_open = false;
            state.category_search = true;
            state.view
        };
        info!(
            "event=session_category module=session status=ok category={}",
            category
        );
        let placement = self.placement_for(view);
        self.search_and_present(generation, &category, FilterSet::default(), placement, true)
            .await
    }

    /// Drops query, filters and selection, then lists everything in view.
    pub async fn clear_all(&self) -> Result<SearchResult, SessionError> {
        let generation = self.debouncer.cancel();
        let view = {
            let mut state = self.state.lock();
            state.query.clear();
            state.filters = FilterSet::default();
            state.detail_open = false;
            state.category_search = false;
            let SessionState {
                reconciler, layer, ..
            } = &mut *state;
            reconciler.clear_selection(layer);
            state.view
        };
        let placement = self.placement_for(view);
        self.search_and_present(generation, "", FilterSet::default(), placement, false)
            .await
    }

    /// Handles a finished pan or zoom of the map.
    pub fn on_viewport_changed(&self, bounds: Bounds, zoom: f64) -> ViewportDecision {
        let had_pending = self.debouncer.pending() > 0;
        let generation = self.debouncer.cancel();

        let decision = {
            let mut state = self.state.lock();
            state.view = MapView::new(bounds, zoom);
            if state.detail_open {
                debug!("event=viewport_change module=session status=skipped reason=detail_open");
                ViewportDecision::Skip
            } else {
                let decision = state.viewport.evaluate(
                    &bounds,
                    zoom,
                    state.last_result.is_some(),
                    self.config.drift_tolerance_percent,
                );
                if decision == ViewportDecision::Reuse {
                    let SessionState {
                        viewport,
                        last_result,
                        reconciler,
                        layer,
                        ..
                    } = &mut *state;
                    if let Some(result) = last_result.as_ref() {
                        let buffer = compute_buffer_bounds(&bounds, zoom);
                        reconciler.reconcile(layer, result, &bounds, &buffer);
                        viewport.note_reused(bounds, buffer);
                    }
                }
                decision
            }
        };

        match decision {
            ViewportDecision::Requery => self.schedule_requery(generation, MapView::new(bounds, zoom)),
            _ if had_pending => self.panel.set_loading(false),
            _ => {}
        }
        decision
    }

    /// Highlights the marker for `key`.
    pub fn select(&self, key: &MarkerKey) -> bool {
        let mut state = self.state.lock();
        let SessionState {
            reconciler, layer, ..
        } = &mut *state;
        reconciler.select(layer, key)
    }

    /// Shows one entity: places its marker if missing, highlights it, flies
    /// to it and opens the detail panel.
    pub fn show_item(&self, kind: EntityKind, entity: Arc<Entity>) {
        self.debouncer.cancel();
        {
            let mut state = self.state.lock();
            let SessionState {
                reconciler, layer, ..
            } = &mut *state;
            reconciler.clear_selection(layer);
            if let Some(key) = reconciler.ensure_marker(layer, kind, &entity) {
                reconciler.select(layer, &key);
            }
            if let Some(point) = entity.coordinates {
                layer.fly_to(point, self.config.selected_item_zoom);
            }
            state.detail_open = true;
        }
        self.panel.set_loading(false);
        self.panel.show_detail(kind, &entity);
    }

    /// Closes the single-item detail, re-enabling viewport updates.
    pub fn close_detail(&self) {
        self.state.lock().detail_open = false;
    }

    /// Searches around the device position.
    pub async fn search_near(
        &self,
        geolocator: &dyn Geolocator,
        radius_km: f64,
    ) -> Result<SearchResult, SessionError> {
        let generation = self.debouncer.cancel();
        let position = match geolocator.current_position().await {
            Ok(position) => position,
            Err(err) => {
                warn!("event=session_geolocate module=session status=error error={}", err);
                self.panel.show_message(err.user_message());
                return Err(err.into());
            }
        };

        let radius_km = if radius_km > 0.0 {
            radius_km.min(self.config.max_radius_km)
        } else {
            self.config.default_radius_km
        };
        let search_radius = radius_km * self.config.geolocation_buffer_multiplier;
        let (filters, zoom) = {
            let mut state = self.state.lock();
            state.query.clear();
            state.detail_open = false;
            state.category_search = false;
            (state.filters.clone(), state.view.zoom)
        };
        let placement = Placement {
            current: Bounds::around(position, radius_km),
            buffer: Bounds::around(position, search_radius),
            zoom,
        };
        let label = nearby_label(position);

        let outcome = self
            .service
            .search_by_location(position.latitude, position.longitude, search_radius, filters)
            .await;
        let result = self.present(generation, &label, outcome, placement, false)?;

        let single = {
            let mut items = result.iter();
            match (items.next(), items.next()) {
                (Some((kind, entity)), None) => Some((kind, Arc::clone(entity))),
                _ => None,
            }
        };
        if let Some((kind, entity)) = single {
            self.show_item(kind, entity);
        }
        Ok(result)
    }

    fn snapshot(&self) -> (String, FilterSet, bool) {
        let state = self.state.lock();
        (
            state.query.clone(),
            state.filters.clone(),
            state.category_search,
        )
    }

    fn placement_for(&self, view: MapView) -> Placement {
        Placement {
            current: view.bounds,
            buffer: compute_buffer_bounds(&view.bounds, view.zoom),
            zoom: view.zoom,
        }
    }

    async fn search_and_present(
        &self,
        generation: u64,
        query: &str,
        filters: FilterSet,
        placement: Placement,
        activities_only: bool,
    ) -> Result<SearchResult, SessionError> {
        self.present_search(generation, query, query, filters, placement, activities_only)
            .await
    }

    async fn present_search(
        &self,
        generation: u64,
        label: &str,
        query: &str,
        filters: FilterSet,
        placement: Placement,
        activities_only: bool,
    ) -> Result<SearchResult, SessionError> {
        let options = SearchOptions {
            bounds: Some(placement.buffer),
            filters,
            bounds_only: false,
        };
        let outcome = self.service.search(query, &options).await;
        self.present(generation, label, outcome, placement, activities_only)
    }

    /// Applies a search outcome to markers, viewport bookkeeping and panel.
    fn present(
        &self,
        generation: u64,
        label: &str,
        outcome: Result<SearchResult, InitializationError>,
        placement: Placement,
        activities_only: bool,
    ) -> Result<SearchResult, SessionError> {
        let title = results_title(label);
        let result = match outcome {
            Ok(result) => result,
            Err(err) => {
                warn!("event=session_search module=session status=error error={}", err);
                self.panel.set_loading(false);
                self.panel.render(
                    &title,
                    &SearchResult::failed(format!("Chyba: {err}")),
                    self.select_callback(),
                );
                return Err(err.into());
            }
        };

        if !self.debouncer.is_current(generation) {
            debug!(
                "event=session_search module=session status=stale generation={}",
                generation
            );
            return Ok(result);
        }

        {
            let mut state = self.state.lock();
            let SessionState {
                viewport,
                last_result,
                reconciler,
                layer,
                ..
            } = &mut *state;
            reconciler.reconcile(layer, &result, &placement.current, &placement.buffer);
            viewport.record(placement.current, placement.zoom, placement.buffer);
            *last_result = Some(result.clone());
        }

        info!(
            "event=session_search module=session status=ok results={} error={}",
            result.len(),
            result.is_error()
        );
        self.panel.set_loading(false);
        let listed = activities_only.then(|| result.activities_only());
        self.panel
            .render(&title, listed.as_ref().unwrap_or(&result), self.select_callback());
        Ok(result)
    }

    fn schedule_requery(&self, generation: u64, view: MapView) {
        let panel = Arc::clone(&self.panel);
        self.debouncer.schedule(
            generation,
            self.config.loading_indicator_delay(),
            move || async move { panel.set_loading(true) },
        );

        let session = self.this.clone();
        self.debouncer
            .schedule(generation, self.config.debounce(), move || async move {
                let Some(session) = session.upgrade() else {
                    return;
                };
                let (query, filters, activities_only) = session.snapshot();
                let placement = session.placement_for(view);
                if let Err(err) = session
                    .search_and_present(generation, &query, filters, placement, activities_only)
                    .await
                {
                    warn!("event=viewport_requery module=session status=error error={}", err);
                }
            });
    }

    fn select_callback(&self) -> SelectCallback {
        let session = self.this.clone();
        Arc::new(move |kind, entity| {
            if let Some(session) = session.upgrade() {
                session.show_item(kind, entity);
            }
        })
    }
}

/// Panel title for a query label.
pub fn results_title(label: &str) -> String {
    let label = label.trim();
    if label.is_empty() {
        NEARBY_TITLE.to_string()
    } else {
        format!("Výsledky pro: \"{label}\"")
    }
}

fn nearby_label(position: Coordinates) -> String {
    format!(
        "Okolí pozice [{:.3}, {:.3}]",
        position.latitude, position.longitude
    )
}

#[cfg(test)]
mod tests {
    use super::{results_title, MapSession, MapView, ResultPanel, SelectCallback, NEARBY_TITLE};
    use crate::config::EngineConfig;
    use crate::dataset::{DataLoadError, DatasetSource};
    use crate::map::InMemoryMapLayer;
    use crate::model::entity::{Entity, EntityKind};
    use crate::model::geo::Bounds;
    use crate::search::result::SearchResult;
    use crate::service::search_service::SearchService;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct OnePlace;

    #[async_trait]
    impl DatasetSource for OnePlace {
        async fn fetch(&self, kind: EntityKind) -> Result<Vec<Entity>, DataLoadError> {
            Ok(match kind {
                EntityKind::Place => vec![Entity::new("Kavárna").at(50.08, 14.43)],
                _ => Vec::new(),
            })
        }
    }

    #[derive(Default)]
    struct Titles(Mutex<Vec<String>>);

    impl ResultPanel for Titles {
        fn render(&self, title: &str, _result: &SearchResult, _on_select: SelectCallback) {
            self.0.lock().push(title.to_string());
        }
        fn set_loading(&self, _loading: bool) {}
        fn show_message(&self, _message: &str) {}
        fn show_detail(&self, _kind: EntityKind, _entity: &Arc<Entity>) {}
    }

    #[test]
    fn titles_follow_query_label() {
        assert_eq!(results_title("  "), NEARBY_TITLE);
        assert_eq!(results_title("kavárna"), "Výsledky pro: \"kavárna\"");
    }

    #[tokio::test]
    async fn initial_load_places_markers_and_renders() {
        let panel = Arc::new(Titles::default());
        let session = MapSession::new(
            Arc::new(SearchService::new(Arc::new(OnePlace))),
            panel.clone(),
            InMemoryMapLayer::new(),
            MapView::new(Bounds::new(50.0, 14.3, 50.2, 14.6), 13.0),
            EngineConfig::default(),
        );

        let result = session.load_initial().await.expect("initial load should succeed");
        assert_eq!(result.len(), 1);
        assert_eq!(session.marker_count(), 1);
        assert_eq!(session.with_layer(|layer| layer.len()), 1);
        assert!(session.viewport().last_buffer.is_some());
        assert_eq!(panel.0.lock().as_slice(), [NEARBY_TITLE.to_string()]);
    }
}
