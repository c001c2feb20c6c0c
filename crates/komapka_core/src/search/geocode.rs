//! Place-name to bounding-box resolution.
//!
//! # Invariants
//! - Matching is substring-based on normalized text; the first table entry
//!   wins.

use crate::model::geo::{Bounds, Coordinates};
use crate::search::normalize::normalize;
use async_trait::async_trait;
use serde::Serialize;

/// Named area returned by a geocoder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeocodedArea {
    pub name: String,
    pub bounds: Bounds,
}

/// Resolves free text to an area.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, query: &str) -> Option<GeocodedArea>;
}

/// Fixed lookup table of known areas.
#[derive(Debug, Clone)]
pub struct StaticGeocoder {
    areas: Vec<(String, GeocodedArea)>,
}

impl Default for StaticGeocoder {
    fn default() -> Self {
        Self::new(vec![
            GeocodedArea {
                name: "Praha".to_string(),
                bounds: Bounds::from_corners(
                    Coordinates::new(49.9417, 14.2244),
                    Coordinates::new(50.1772, 14.7068),
                ),
            },
            GeocodedArea {
                name: "Brno".to_string(),
                bounds: Bounds::from_corners(
                    Coordinates::new(49.1127, 16.4400),
                    Coordinates::new(49.2800, 16.7550),
                ),
            },
        ])
    }
}

impl StaticGeocoder {
    pub fn new(areas: Vec<GeocodedArea>) -> Self {
        Self {
            areas: areas
                .into_iter()
                .map(|area| (normalize(&area.name), area))
                .collect(),
        }
    }

    /// Synchronous lookup used by the async trait impl.
    pub fn lookup(&self, query: &str) -> Option<&GeocodedArea> {
        let needle = normalize(query.trim());
        if needle.is_empty() {
            return None;
        }
        self.areas
            .iter()
            .find(|(key, _)| needle.contains(key.as_str()))
            .map(|(_, area)| area)
    }
}

#[async_trait]
impl Geocoder for StaticGeocoder {
    async fn geocode(&self, query: &str) -> Option<GeocodedArea> {
        self.lookup(query).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::{Geocoder, StaticGeocoder};

    #[tokio::test]
    async fn resolves_known_cities_inside_longer_text() {
        let geocoder = StaticGeocoder::default();
        let area = geocoder
            .geocode("koncerty Praha 7")
            .await
            .expect("praha should resolve");
        assert_eq!(area.name, "Praha");
        assert_eq!(area.bounds.south, 49.9417);
        assert_eq!(area.bounds.east, 14.7068);

        assert_eq!(
            geocoder.geocode("BRNO").await.map(|area| area.name),
            Some("Brno".to_string())
        );
    }

    #[tokio::test]
    async fn unknown_or_empty_text_yields_none() {
        let geocoder = StaticGeocoder::default();
        assert!(geocoder.geocode("Ostrava").await.is_none());
        assert!(geocoder.geocode("").await.is_none());
    }
}
