//! Incremental marker reconciliation.
//!
//! # Responsibility
//! - Diff a new result set against the markers currently on the layer.
//! - Touch only markers whose classification changed.
//! - Track the single highlighted marker.
//!
//! # Invariants
//! - Per marker: absent -> full | placeholder, full <-> placeholder,
//!   full | placeholder -> absent. No other transition exists.
//! - Reconciling the same input twice yields only `Keep` the second time.
//! - At most one marker is highlighted; removing it clears the selection.

use crate::map::layer::{MapLayer, MarkerHandle, MarkerSpec};
use crate::map::{classify, popup_text, MarkerKey, MarkerState, MarkerStyle};
use crate::model::entity::{Entity, EntityKind};
use crate::model::geo::Bounds;
use crate::search::result::SearchResult;
use log::{debug, info};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// One step of a reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileAction {
    Create {
        key: MarkerKey,
        state: MarkerState,
        entity: Arc<Entity>,
    },
    /// Remove and recreate with a new state.
    Replace {
        key: MarkerKey,
        from: MarkerState,
        to: MarkerState,
        entity: Arc<Entity>,
    },
    Keep {
        key: MarkerKey,
    },
    Remove {
        key: MarkerKey,
    },
}

/// Ordered list of actions computed by [`plan`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilePlan {
    pub actions: Vec<ReconcileAction>,
}

impl ReconcilePlan {
    pub fn report(&self) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        for action in &self.actions {
            match action {
                ReconcileAction::Create { .. } => report.created += 1,
                ReconcileAction::Replace {
                    to: MarkerState::Full,
                    ..
                } => report.upgraded += 1,
                ReconcileAction::Replace { .. } => report.downgraded += 1,
                ReconcileAction::Keep { .. } => report.unchanged += 1,
                ReconcileAction::Remove { .. } => report.removed += 1,
            }
        }
        report
    }
}

/// Counts of applied actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created: usize,
    /// Placeholder to full.
    pub upgraded: usize,
    /// Full to placeholder.
    pub downgraded: usize,
    pub removed: usize,
    pub unchanged: usize,
}

impl ReconcileReport {
    /// Whether the layer was modified.
    pub fn changed(&self) -> bool {
        self.created + self.upgraded + self.downgraded + self.removed > 0
    }
}

/// Pure diff of `result` against the marker `index`.
///
/// Entities without coordinates or outside `buffer` get no marker. Removals
/// are listed last, in key order.
pub fn plan(
    result: &SearchResult,
    current: &Bounds,
    buffer: &Bounds,
    index: &HashMap<MarkerKey, MarkerState>,
) -> ReconcilePlan {
    let mut actions = Vec::new();
    let mut qualifying = BTreeSet::new();

    for (kind, entity) in result.iter() {
        let Some(point) = entity.coordinates else {
            continue;
        };
        let Some(state) = classify(point, current, buffer) else {
            continue;
        };
        let key = MarkerKey::for_entity(kind, entity);
        if !qualifying.insert(key.clone()) {
            continue;
        }

        let action = match index.get(&key) {
            None => ReconcileAction::Create {
                key,
                state,
                entity: Arc::clone(entity),
            },
            Some(existing) if *existing == state => ReconcileAction::Keep { key },
            Some(existing) => ReconcileAction::Replace {
                key,
                from: *existing,
                to: state,
                entity: Arc::clone(entity),
            },
        };
        actions.push(action);
    }

    let mut stale = index
        .keys()
        .filter(|key| !qualifying.contains(*key))
        .cloned()
        .collect::<Vec<_>>();
    stale.sort();
    actions.extend(stale.into_iter().map(|key| ReconcileAction::Remove { key }));

    ReconcilePlan { actions }
}

#[derive(Debug, Clone)]
struct PlacedMarker {
    handle: MarkerHandle,
    state: MarkerState,
    kind: EntityKind,
}

/// Owns the bookkeeping of markers placed on a [`MapLayer`].
#[derive(Debug, Default)]
pub struct MarkerReconciler {
    style: MarkerStyle,
    markers: HashMap<MarkerKey, PlacedMarker>,
    selected: Option<MarkerKey>,
}

impl MarkerReconciler {
    pub fn new(style: MarkerStyle) -> Self {
        Self {
            style,
            markers: HashMap::new(),
            selected: None,
        }
    }

    pub fn style(&self) -> &MarkerStyle {
        &self.style
    }

    /// Current state of every tracked marker.
    pub fn index(&self) -> HashMap<MarkerKey, MarkerState> {
        self.markers
            .iter()
            .map(|(key, placed)| (key.clone(), placed.state))
            .collect()
    }

    pub fn state_of(&self, key: &MarkerKey) -> Option<MarkerState> {
        self.markers.get(key).map(|placed| placed.state)
    }

    pub fn handle_of(&self, key: &MarkerKey) -> Option<MarkerHandle> {
        self.markers.get(key).map(|placed| placed.handle)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn selected(&self) -> Option<&MarkerKey> {
        self.selected.as_ref()
    }

    /// Brings the layer in line with `result` for the given view.
    pub fn reconcile(
        &mut self,
        layer: &mut dyn MapLayer,
        result: &SearchResult,
        current: &Bounds,
        buffer: &Bounds,
    ) -> ReconcileReport {
        let plan = plan(result, current, buffer, &self.index());
        for action in &plan.actions {
            match action {
                ReconcileAction::Create { key, state, entity } => {
                    self.place(layer, key.clone(), *state, entity);
                }
                ReconcileAction::Replace { key, to, entity, .. } => {
                    if let Some(previous) = self.markers.remove(key) {
                        layer.remove_marker(previous.handle);
                    }
                    self.place(layer, key.clone(), *to, entity);
                }
                ReconcileAction::Keep { .. } => {}
                ReconcileAction::Remove { key } => {
                    if let Some(previous) = self.markers.remove(key) {
                        layer.remove_marker(previous.handle);
                    }
                    if self.selected.as_ref() == Some(key) {
                        self.selected = None;
                    }
                }
            }
        }

        let report = plan.report();
        info!(
            "event=markers_reconcile module=map status=ok created={} upgraded={} downgraded={} removed={} unchanged={}",
            report.created, report.upgraded, report.downgraded, report.removed, report.unchanged
        );
        report
    }

    /// Highlights `key`, restoring the previously selected marker.
    ///
    /// Returns `false` when no marker exists for `key`.
    pub fn select(&mut self, layer: &mut dyn MapLayer, key: &MarkerKey) -> bool {
        if !self.markers.contains_key(key) {
            return false;
        }
        self.clear_selection(layer);
        self.selected = Some(key.clone());
        self.restyle(layer, key);
        debug!("event=marker_select module=map status=ok key={}", key);
        true
    }

    /// Un-highlights the selected marker, if any.
    pub fn clear_selection(&mut self, layer: &mut dyn MapLayer) {
        if let Some(previous) = self.selected.take() {
            self.restyle(layer, &previous);
        }
    }

    /// Places a full marker for `entity` unless one is already tracked.
    ///
    /// Returns `None` for entities without coordinates.
    pub fn ensure_marker(
        &mut self,
        layer: &mut dyn MapLayer,
        kind: EntityKind,
        entity: &Arc<Entity>,
    ) -> Option<MarkerKey> {
        entity.coordinates?;
        let key = MarkerKey::for_entity(kind, entity);
        if !self.markers.contains_key(&key) {
            self.place(layer, key.clone(), MarkerState::Full, entity);
        }
        Some(key)
    }

    /// Removes every marker and the selection.
    pub fn clear(&mut self, layer: &mut dyn MapLayer) {
        for placed in self.markers.values() {
            layer.remove_marker(placed.handle);
        }
        self.markers.clear();
        self.selected = None;
    }

    fn place(&mut self, layer: &mut dyn MapLayer, key: MarkerKey, state: MarkerState, entity: &Arc<Entity>) {
        let Some(position) = entity.coordinates else {
            return;
        };
        let highlighted = self.selected.as_ref() == Some(&key);
        let spec = MarkerSpec {
            key: key.clone(),
            position,
            appearance: self.style.appearance(key.kind, state, highlighted),
            popup: popup_text(entity),
            entity: Arc::clone(entity),
        };
        let handle = layer.add_marker(&spec);
        self.markers.insert(
            key.clone(),
            PlacedMarker {
                handle,
                state,
                kind: key.kind,
            },
        );
    }

    fn restyle(&self, layer: &mut dyn MapLayer, key: &MarkerKey) {
        if let Some(placed) = self.markers.get(key) {
            let highlighted = self.selected.as_ref() == Some(key);
            let appearance = self.style.appearance(placed.kind, placed.state, highlighted);
            layer.set_appearance(placed.handle, &appearance);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{plan, MarkerReconciler, ReconcileAction};
    use crate::map::layer::InMemoryMapLayer;
    use crate::map::{MarkerKey, MarkerState, MarkerStyle};
    use crate::model::entity::{Entity, EntityKind};
    use crate::model::geo::Bounds;
    use crate::search::result::SearchResult;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn view() -> (Bounds, Bounds) {
        let current = Bounds::new(50.0, 14.0, 50.1, 14.2);
        (current, current.pad(0.5))
    }

    fn result(entities: Vec<Entity>) -> SearchResult {
        let mut result = SearchResult::default();
        result.activities = entities.into_iter().map(Arc::new).collect();
        result
    }

    #[test]
    fn plan_creates_by_classification_and_skips_far_entities() {
        let (current, buffer) = view();
        let result = result(vec![
            Entity::with_id("in", "in").at(50.05, 14.1),
            Entity::with_id("edge", "edge").at(50.12, 14.1),
            Entity::with_id("far", "far").at(52.0, 14.1),
            Entity::with_id("nowhere", "nowhere"),
        ]);

        let plan = plan(&result, &current, &buffer, &HashMap::new());
        let report = plan.report();
        assert_eq!(report.created, 2);
        assert!(matches!(
            &plan.actions[1],
            ReconcileAction::Create { state: MarkerState::Placeholder, .. }
        ));
    }

    #[test]
    fn plan_removes_markers_no_longer_qualifying() {
        let (current, buffer) = view();
        let mut index = HashMap::new();
        index.insert(MarkerKey::new(EntityKind::Place, "gone"), MarkerState::Full);

        let plan = plan(&SearchResult::default(), &current, &buffer, &index);
        assert_eq!(
            plan.actions,
            vec![ReconcileAction::Remove {
                key: MarkerKey::new(EntityKind::Place, "gone")
            }]
        );
    }

    #[test]
    fn second_identical_reconcile_is_all_unchanged() {
        let (current, buffer) = view();
        let result = result(vec![
            Entity::with_id("a", "a").at(50.05, 14.1),
            Entity::with_id("b", "b").at(50.12, 14.1),
        ]);
        let mut layer = InMemoryMapLayer::new();
        let mut reconciler = MarkerReconciler::default();

        let first = reconciler.reconcile(&mut layer, &result, &current, &buffer);
        assert_eq!(first.created, 2);
        let second = reconciler.reconcile(&mut layer, &result, &current, &buffer);
        assert_eq!(second.unchanged, 2);
        assert!(!second.changed());
        assert_eq!(layer.churn(), (2, 0));
    }

    #[test]
    fn pan_upgrades_and_downgrades_only_changed_markers() {
        let (current, buffer) = view();
        let result = result(vec![
            Entity::with_id("stay", "stay").at(50.05, 14.19),
            Entity::with_id("leave", "leave").at(50.05, 14.01),
            Entity::with_id("arrive", "arrive").at(50.05, 14.25),
        ]);
        let mut layer = InMemoryMapLayer::new();
        let mut reconciler = MarkerReconciler::default();
        reconciler.reconcile(&mut layer, &result, &current, &buffer);

        let panned = Bounds::new(50.0, 14.05, 50.1, 14.25);
        let report = reconciler.reconcile(&mut layer, &result, &panned, &panned.pad(0.5));
        assert_eq!(report.upgraded, 1);
        assert_eq!(report.downgraded, 1);
        assert_eq!(report.unchanged, 1);
        assert_eq!(
            reconciler.state_of(&MarkerKey::new(EntityKind::Activity, "arrive")),
            Some(MarkerState::Full)
        );
    }

    #[test]
    fn highlight_survives_recreation_and_clears_on_removal() {
        let (current, buffer) = view();
        let entity = Entity::with_id("a", "a").at(50.05, 14.1);
        let mut layer = InMemoryMapLayer::new();
        let mut reconciler = MarkerReconciler::new(MarkerStyle::default());
        reconciler.reconcile(&mut layer, &result(vec![entity.clone()]), &current, &buffer);

        let key = MarkerKey::new(EntityKind::Activity, "a");
        assert!(reconciler.select(&mut layer, &key));
        let spec = layer.find(&key).expect("marker should exist");
        assert!(spec.appearance.highlighted);

        let shifted = Bounds::new(50.06, 14.0, 50.16, 14.2);
        reconciler.reconcile(&mut layer, &result(vec![entity]), &shifted, &shifted.pad(0.5));
        let recreated = layer.find(&key).expect("marker should be recreated");
        assert_eq!(recreated.appearance.state, MarkerState::Placeholder);
        assert!(recreated.appearance.highlighted);

        reconciler.reconcile(&mut layer, &SearchResult::default(), &current, &buffer);
        assert!(reconciler.selected().is_none());
        assert!(layer.is_empty());
    }

    #[test]
    fn selecting_another_marker_unhighlights_the_first() {
        let (current, buffer) = view();
        let mut layer = InMemoryMapLayer::new();
        let mut reconciler = MarkerReconciler::default();
        reconciler.reconcile(
            &mut layer,
            &result(vec![
                Entity::with_id("a", "a").at(50.05, 14.1),
                Entity::with_id("b", "b").at(50.06, 14.1),
            ]),
            &current,
            &buffer,
        );

        let a = MarkerKey::new(EntityKind::Activity, "a");
        let b = MarkerKey::new(EntityKind::Activity, "b");
        reconciler.select(&mut layer, &a);
        reconciler.select(&mut layer, &b);

        let highlighted = layer.markers().filter(|spec| spec.appearance.highlighted).count();
        assert_eq!(highlighted, 1);
        assert_eq!(reconciler.selected(), Some(&b));
        assert!(!reconciler.select(&mut layer, &MarkerKey::new(EntityKind::Place, "missing")));
    }
}
