//! Marker model for the map widget.
//!
//! # Responsibility
//! - Identify markers across result sets and classify them against the
//!   visible and buffer bounds.
//! - Describe marker appearance independently of any rendering toolkit.
//!
//! # Invariants
//! - A marker key is stable for an entity across searches.
//! - An entity outside the buffer has no marker state.

pub mod layer;
pub mod reconcile;

use crate::model::entity::{Entity, EntityKind};
use crate::model::geo::{Bounds, Coordinates};
use serde::Serialize;
use std::fmt::{Display, Formatter};

pub use layer::{InMemoryMapLayer, MapLayer, MarkerHandle, MarkerSpec};
pub use reconcile::{plan, MarkerReconciler, ReconcileAction, ReconcilePlan, ReconcileReport};

/// Identity of one marker: entity kind plus entity id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MarkerKey {
    pub kind: EntityKind,
    pub id: String,
}

impl MarkerKey {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// Uses the entity id, or name + latitude + longitude when the id is
    /// missing.
    pub fn for_entity(kind: EntityKind, entity: &Entity) -> Self {
        let id = match (&entity.id, entity.coordinates) {
            (Some(id), _) => id.clone(),
            (None, Some(point)) => format!("{}{}{}", entity.name, point.latitude, point.longitude),
            (None, None) => entity.name.clone(),
        };
        Self::new(kind, id)
    }
}

impl Display for MarkerKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.kind.as_str(), self.id)
    }
}

/// Rendering mode of a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MarkerState {
    /// Interactive icon inside the visible bounds.
    Full,
    /// Small circle in the buffer zone.
    Placeholder,
}

/// Full inside `current`, placeholder inside `buffer`, otherwise nothing.
pub fn classify(point: Coordinates, current: &Bounds, buffer: &Bounds) -> Option<MarkerState> {
    if current.contains(point) {
        Some(MarkerState::Full)
    } else if buffer.contains(point) {
        Some(MarkerState::Placeholder)
    } else {
        None
    }
}

/// Visual parameters of markers.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerStyle {
    pub default_opacity: f32,
    pub highlighted_opacity: f32,
    pub default_z_index: i32,
    pub highlighted_z_index: i32,
    pub placeholder_radius: f32,
    pub placeholder_opacity: f32,
    pub placeholder_fill_opacity: f32,
    pub placeholder_z_index: i32,
    pub placeholder_note: &'static str,
}

impl Default for MarkerStyle {
    fn default() -> Self {
        Self {
            default_opacity: 0.8,
            highlighted_opacity: 1.0,
            default_z_index: 500,
            highlighted_z_index: 1000,
            placeholder_radius: 3.0,
            placeholder_opacity: 0.7,
            placeholder_fill_opacity: 0.5,
            placeholder_z_index: -1000,
            placeholder_note: "Mimo aktuální výřez mapy",
        }
    }
}

/// Resolved look of one marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerAppearance {
    pub state: MarkerState,
    pub highlighted: bool,
    /// Circle radius for placeholders; icons have none.
    pub radius: Option<f32>,
    pub color: Option<&'static str>,
    pub opacity: f32,
    pub fill_opacity: Option<f32>,
    pub z_index: i32,
    pub note: Option<&'static str>,
}

impl MarkerStyle {
    pub fn placeholder_color(kind: EntityKind) -> &'static str {
        match kind {
            EntityKind::Activity => "#aaaaaa",
            EntityKind::Place => "#888888",
            EntityKind::Community => "#666666",
        }
    }

    pub fn appearance(&self, kind: EntityKind, state: MarkerState, highlighted: bool) -> MarkerAppearance {
        match state {
            MarkerState::Full => MarkerAppearance {
                state,
                highlighted,
                radius: None,
                color: None,
                opacity: if highlighted {
                    self.highlighted_opacity
                } else {
                    self.default_opacity
                },
                fill_opacity: None,
                z_index: if highlighted {
                    self.highlighted_z_index
                } else {
                    self.default_z_index
                },
                note: None,
            },
            MarkerState::Placeholder => MarkerAppearance {
                state,
                highlighted,
                radius: Some(self.placeholder_radius),
                color: Some(Self::placeholder_color(kind)),
                opacity: if highlighted {
                    self.highlighted_opacity
                } else {
                    self.placeholder_opacity
                },
                fill_opacity: Some(self.placeholder_fill_opacity),
                z_index: if highlighted {
                    self.highlighted_z_index
                } else {
                    self.placeholder_z_index
                },
                note: Some(self.placeholder_note),
            },
        }
    }
}

/// Popup text: name and address with Czech fallbacks.
pub fn popup_text(entity: &Entity) -> String {
    let name = if entity.name.trim().is_empty() {
        "Neznámý název"
    } else {
        entity.name.as_str()
    };
    let address = entity.address.as_deref().unwrap_or("Adresa neuvedena");
    format!("{name}\n{address}")
}
