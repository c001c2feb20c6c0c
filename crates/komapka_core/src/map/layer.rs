//! Marker layer seam.
//!
//! # Responsibility
//! - Abstract the tile-rendering map widget behind [`MapLayer`].
//! - Provide [`InMemoryMapLayer`] for headless use and tests.

use crate::map::{MarkerAppearance, MarkerKey};
use crate::model::entity::Entity;
use crate::model::geo::{Bounds, Coordinates};
use log::debug;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

/// Opaque handle of a marker added to a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MarkerHandle(Uuid);

impl MarkerHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for MarkerHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for MarkerHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything a layer needs to draw one marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerSpec {
    pub key: MarkerKey,
    pub position: Coordinates,
    pub appearance: MarkerAppearance,
    pub popup: String,
    pub entity: Arc<Entity>,
}

/// Operations the core performs on the map widget.
pub trait MapLayer: Send {
    fn add_marker(&mut self, spec: &MarkerSpec) -> MarkerHandle;
    fn remove_marker(&mut self, handle: MarkerHandle);
    /// Restyles an existing marker; unknown handles are ignored.
    fn set_appearance(&mut self, handle: MarkerHandle, appearance: &MarkerAppearance);
    fn fit_bounds(&mut self, bounds: &Bounds);
    fn fly_to(&mut self, center: Coordinates, zoom: f64);
    fn clear(&mut self);
}

/// Last camera movement requested from a layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraMove {
    Fit(Bounds),
    FlyTo { center: Coordinates, zoom: f64 },
}

/// Layer that keeps markers in a map.
#[derive(Debug, Default)]
pub struct InMemoryMapLayer {
    markers: HashMap<MarkerHandle, MarkerSpec>,
    camera: Option<CameraMove>,
    added: usize,
    removed: usize,
}

impl InMemoryMapLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn get(&self, handle: MarkerHandle) -> Option<&MarkerSpec> {
        self.markers.get(&handle)
    }

    /// Finds the marker drawn for `key`.
    pub fn find(&self, key: &MarkerKey) -> Option<&MarkerSpec> {
        self.markers.values().find(|spec| &spec.key == key)
    }

    pub fn markers(&self) -> impl Iterator<Item = &MarkerSpec> {
        self.markers.values()
    }

    pub fn camera(&self) -> Option<CameraMove> {
        self.camera
    }

    /// Total markers added and removed since creation.
    pub fn churn(&self) -> (usize, usize) {
        (self.added, self.removed)
    }
}

impl MapLayer for InMemoryMapLayer {
    fn add_marker(&mut self, spec: &MarkerSpec) -> MarkerHandle {
        let handle = MarkerHandle::new();
        self.markers.insert(handle, spec.clone());
        self.added += 1;
        handle
    }

    fn remove_marker(&mut self, handle: MarkerHandle) {
        if self.markers.remove(&handle).is_some() {
            self.removed += 1;
        }
    }

    fn set_appearance(&mut self, handle: MarkerHandle, appearance: &MarkerAppearance) {
        if let Some(spec) = self.markers.get_mut(&handle) {
            spec.appearance = appearance.clone();
        }
    }

    fn fit_bounds(&mut self, bounds: &Bounds) {
        debug!("event=layer_fit_bounds module=map status=ok bounds={}", bounds);
        self.camera = Some(CameraMove::Fit(*bounds));
    }

    fn fly_to(&mut self, center: Coordinates, zoom: f64) {
        self.camera = Some(CameraMove::FlyTo { center, zoom });
    }

    fn clear(&mut self) {
        self.removed += self.markers.len();
        self.markers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::{CameraMove, InMemoryMapLayer, MapLayer, MarkerSpec};
    use crate::map::{MarkerKey, MarkerState, MarkerStyle};
    use crate::model::entity::{Entity, EntityKind};
    use crate::model::geo::Coordinates;
    use std::sync::Arc;

    fn spec(id: &str) -> MarkerSpec {
        let entity = Arc::new(Entity::with_id(id, "x").at(50.0, 14.0));
        MarkerSpec {
            key: MarkerKey::new(EntityKind::Place, id),
            position: Coordinates::new(50.0, 14.0),
            appearance: MarkerStyle::default().appearance(EntityKind::Place, MarkerState::Full, false),
            popup: "x".to_string(),
            entity,
        }
    }

    #[test]
    fn handles_are_unique_and_removal_is_counted_once() {
        let mut layer = InMemoryMapLayer::new();
        let first = layer.add_marker(&spec("1"));
        let second = layer.add_marker(&spec("2"));
        assert_ne!(first, second);

        layer.remove_marker(first);
        layer.remove_marker(first);
        assert_eq!(layer.len(), 1);
        assert_eq!(layer.churn(), (2, 1));
        assert!(layer.find(&MarkerKey::new(EntityKind::Place, "2")).is_some());
    }

    #[test]
    fn records_last_camera_move() {
        let mut layer = InMemoryMapLayer::new();
        layer.fly_to(Coordinates::new(50.0, 14.0), 16.0);
        assert!(matches!(layer.camera(), Some(CameraMove::FlyTo { zoom, .. }) if zoom == 16.0));
    }
}
