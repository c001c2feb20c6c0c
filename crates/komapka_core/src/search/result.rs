//! Search result envelope handed to the marker reconciler and the panel.
//!
//! # Invariants
//! - `map_bounds` and `total` are either both present (bounds supplied) or
//!   both absent.
//! - `map_bounds.total <= total.total`.
//! - Entities are shared, never copied field-by-field.

use crate::model::entity::{Entity, EntityKind};
use serde::Serialize;
use std::sync::Arc;

/// Per-kind counts plus their sum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindCounts {
    pub activities: usize,
    pub places: usize,
    pub communities: usize,
    pub total: usize,
}

impl KindCounts {
    pub fn new(activities: usize, places: usize, communities: usize) -> Self {
        Self {
            activities,
            places,
            communities,
            total: activities + places + communities,
        }
    }
}

/// Output of one search.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub activities: Vec<Arc<Entity>>,
    pub places: Vec<Arc<Entity>>,
    pub communities: Vec<Arc<Entity>>,
    /// Counts restricted to the supplied bounds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_bounds: Option<KindCounts>,
    /// Counts of every match regardless of bounds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<KindCounts>,
    /// Canonical bbox string of the bounds used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<String>,
    /// Set when the search failed; lists are empty in that case.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchResult {
    /// Degraded result carrying only an error message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Entities of one kind.
    pub fn items(&self, kind: EntityKind) -> &[Arc<Entity>] {
        match kind {
            EntityKind::Activity => &self.activities,
            EntityKind::Place => &self.places,
            EntityKind::Community => &self.communities,
        }
    }

    pub(crate) fn items_mut(&mut self, kind: EntityKind) -> &mut Vec<Arc<Entity>> {
        match kind {
            EntityKind::Activity => &mut self.activities,
            EntityKind::Place => &mut self.places,
            EntityKind::Community => &mut self.communities,
        }
    }

    /// Iterates `(kind, entity)` pairs in activity, place, community order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityKind, &Arc<Entity>)> + '_ {
        EntityKind::ALL
            .into_iter()
            .flat_map(move |kind| self.items(kind).iter().map(move |entity| (kind, entity)))
    }

    /// Number of entities across the three lists.
    pub fn len(&self) -> usize {
        self.activities.len() + self.places.len() + self.communities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy listing only the activities; counts and bounds are kept.
    pub fn activities_only(&self) -> Self {
        Self {
            places: Vec::new(),
            communities: Vec::new(),
            ..self.clone()
        }
    }

    /// Counts of the entity lists as they stand.
    pub fn list_counts(&self) -> KindCounts {
        KindCounts::new(
            self.activities.len(),
            self.places.len(),
            self.communities.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{KindCounts, SearchResult};
    use crate::model::entity::{Entity, EntityKind};
    use std::sync::Arc;

    #[test]
    fn counts_sum_per_kind() {
        let counts = KindCounts::new(1, 2, 3);
        assert_eq!(counts.total, 6);
    }

    #[test]
    fn iter_walks_kinds_in_order() {
        let mut result = SearchResult::default();
        result.communities.push(Arc::new(Entity::new("c")));
        result.activities.push(Arc::new(Entity::new("a")));

        let kinds = result.iter().map(|(kind, _)| kind).collect::<Vec<_>>();
        assert_eq!(kinds, vec![EntityKind::Activity, EntityKind::Community]);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn activities_only_drops_other_lists_but_keeps_counts() {
        let mut result = SearchResult::default();
        result.activities.push(Arc::new(Entity::new("a")));
        result.places.push(Arc::new(Entity::new("p")));
        result.total = Some(KindCounts::new(1, 1, 0));

        let narrowed = result.activities_only();
        assert_eq!(narrowed.len(), 1);
        assert!(narrowed.places.is_empty());
        assert_eq!(narrowed.total, result.total);
    }

    #[test]
    fn serializes_counts_with_camel_case_keys() {
        let mut result = SearchResult::default();
        result.map_bounds = Some(KindCounts::new(0, 0, 0));
        result.total = Some(KindCounts::new(1, 0, 0));

        let json = serde_json::to_value(&result).expect("result should serialize");
        assert_eq!(json["mapBounds"]["total"], 0);
        assert_eq!(json["total"]["activities"], 1);
        assert!(json.get("error").is_none());
    }
}
