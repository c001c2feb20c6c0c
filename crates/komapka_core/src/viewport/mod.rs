//! Viewport change detection.
//!
//! # Responsibility
//! - Decide whether a pan/zoom needs a new search, can reuse the last result
//!   set, or can be ignored.
//! - Derive the buffer zone that is prefetched around the visible area.
//!
//! # Invariants
//! - A zoom change always requeries.
//! - Drift at or below the tolerance on both axes never requeries.
//! - Reuse is only offered at the zoom of the last completed search.

pub mod debounce;

use crate::model::geo::Bounds;
use log::debug;

pub use debounce::Debouncer;

/// Center drift tolerance, in percent of the previous span.
pub const DEFAULT_DRIFT_TOLERANCE_PERCENT: f64 = 10.0;

/// Pad ratio applied around the viewport at `zoom`.
///
/// Closer zoom levels get a thinner buffer.
pub fn buffer_factor(zoom: f64) -> f64 {
    if zoom > 14.0 {
        0.3
    } else if zoom > 10.0 {
        0.5
    } else {
        0.7
    }
}

/// Visible bounds grown by [`buffer_factor`].
pub fn compute_buffer_bounds(bounds: &Bounds, zoom: f64) -> Bounds {
    bounds.pad(buffer_factor(zoom))
}

/// Whether the center moved more than `tolerance_percent` of the previous
/// height or width.
pub fn drift_exceeds(previous: &Bounds, current: &Bounds, tolerance_percent: f64) -> bool {
    let old_center = previous.center();
    let new_center = current.center();
    let lat_threshold = previous.height() * (tolerance_percent / 100.0);
    let lng_threshold = previous.width() * (tolerance_percent / 100.0);
    let lat_diff = (old_center.latitude - new_center.latitude).abs();
    let lng_diff = (old_center.longitude - new_center.longitude).abs();
    lat_diff > lat_threshold || lng_diff > lng_threshold
}

/// Outcome of a viewport change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportDecision {
    /// Run a new (debounced) search.
    Requery,
    /// Keep the last results but reconcile markers against the new view.
    Reuse,
    /// Nothing to do.
    Skip,
}

/// Classifies a viewport change against the last completed search.
pub fn evaluate(
    prev_bounds: Option<&Bounds>,
    prev_zoom: Option<f64>,
    current_bounds: &Bounds,
    current_zoom: f64,
    prev_buffer: Option<&Bounds>,
    tolerance_percent: f64,
) -> ViewportDecision {
    let Some(prev_bounds) = prev_bounds else {
        return ViewportDecision::Requery;
    };
    if prev_zoom != Some(current_zoom) {
        return ViewportDecision::Requery;
    }
    if !drift_exceeds(prev_bounds, current_bounds, tolerance_percent) {
        return ViewportDecision::Skip;
    }
    if prev_buffer.is_some_and(|buffer| buffer.contains_bounds(current_bounds)) {
        return ViewportDecision::Reuse;
    }
    ViewportDecision::Requery
}

/// `true` when [`evaluate`] asks for a new search at the default tolerance.
pub fn should_requery(
    prev_bounds: Option<&Bounds>,
    prev_zoom: Option<f64>,
    current_bounds: &Bounds,
    current_zoom: f64,
    prev_buffer: Option<&Bounds>,
) -> bool {
    evaluate(
        prev_bounds,
        prev_zoom,
        current_bounds,
        current_zoom,
        prev_buffer,
        DEFAULT_DRIFT_TOLERANCE_PERCENT,
    ) == ViewportDecision::Requery
}

/// Bookkeeping of the last completed search's viewport.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewportState {
    pub last_bounds: Option<Bounds>,
    pub last_zoom: Option<f64>,
    pub last_buffer: Option<Bounds>,
}

impl ViewportState {
    /// Records the viewport a search just completed for.
    pub fn record(&mut self, bounds: Bounds, zoom: f64, buffer: Bounds) {
        self.last_bounds = Some(bounds);
        self.last_zoom = Some(zoom);
        self.last_buffer = Some(buffer);
    }

    /// Moves the reference bounds and buffer after a reuse; zoom stays.
    pub fn note_reused(&mut self, bounds: Bounds, buffer: Bounds) {
        self.last_bounds = Some(bounds);
        self.last_buffer = Some(buffer);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Without prior results every change requeries.
    pub fn evaluate(
        &self,
        current_bounds: &Bounds,
        current_zoom: f64,
        has_results: bool,
        tolerance_percent: f64,
    ) -> ViewportDecision {
        let decision = if has_results {
            evaluate(
                self.last_bounds.as_ref(),
                self.last_zoom,
                current_bounds,
                current_zoom,
                self.last_buffer.as_ref(),
                tolerance_percent,
            )
        } else {
            ViewportDecision::Requery
        };
        debug!(
            "event=viewport_evaluate module=viewport status=ok decision={:?} zoom={}",
            decision, current_zoom
        );
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::{
        buffer_factor, compute_buffer_bounds, evaluate, should_requery, ViewportDecision,
        ViewportState, DEFAULT_DRIFT_TOLERANCE_PERCENT,
    };
    use crate::model::geo::Bounds;

    fn view() -> Bounds {
        Bounds::new(50.0, 14.0, 50.1, 14.2)
    }

    fn shifted(bounds: &Bounds, lat: f64, lng: f64) -> Bounds {
        Bounds::new(
            bounds.south + lat,
            bounds.west + lng,
            bounds.north + lat,
            bounds.east + lng,
        )
    }

    #[test]
    fn buffer_factor_steps_with_zoom() {
        assert_eq!(buffer_factor(16.0), 0.3);
        assert_eq!(buffer_factor(14.0), 0.5);
        assert_eq!(buffer_factor(11.0), 0.5);
        assert_eq!(buffer_factor(10.0), 0.7);
        let buffer = compute_buffer_bounds(&view(), 12.0);
        assert!(buffer.contains_bounds(&view()));
    }

    #[test]
    fn first_view_and_zoom_change_requery() {
        assert!(should_requery(None, None, &view(), 12.0, None));
        let buffer = compute_buffer_bounds(&view(), 12.0);
        assert!(should_requery(Some(&view()), Some(12.0), &view(), 13.0, Some(&buffer)));
    }

    #[test]
    fn small_pan_is_skipped() {
        let previous = view();
        let current = shifted(&previous, 0.005, 0.01);
        assert_eq!(
            evaluate(
                Some(&previous),
                Some(12.0),
                &current,
                12.0,
                None,
                DEFAULT_DRIFT_TOLERANCE_PERCENT
            ),
            ViewportDecision::Skip
        );
    }

    #[test]
    fn larger_pan_inside_buffer_reuses_and_outside_requeries() {
        let previous = view();
        let buffer = compute_buffer_bounds(&previous, 12.0);

        let inside = shifted(&previous, 0.03, 0.0);
        assert_eq!(
            evaluate(Some(&previous), Some(12.0), &inside, 12.0, Some(&buffer), 10.0),
            ViewportDecision::Reuse
        );

        let outside = shifted(&previous, 0.2, 0.0);
        assert_eq!(
            evaluate(Some(&previous), Some(12.0), &outside, 12.0, Some(&buffer), 10.0),
            ViewportDecision::Requery
        );
    }

    #[test]
    fn state_requeries_without_results_and_tracks_reuse() {
        let mut state = ViewportState::default();
        let buffer = compute_buffer_bounds(&view(), 12.0);
        state.record(view(), 12.0, buffer);

        assert_eq!(state.evaluate(&view(), 12.0, false, 10.0), ViewportDecision::Requery);
        assert_eq!(state.evaluate(&view(), 12.0, true, 10.0), ViewportDecision::Skip);

        let moved = shifted(&view(), 0.03, 0.0);
        let moved_buffer = compute_buffer_bounds(&moved, 12.0);
        state.note_reused(moved, moved_buffer);
        assert_eq!(state.last_bounds, Some(moved));
        assert_eq!(state.last_buffer, Some(moved_buffer));
        assert_eq!(state.last_zoom, Some(12.0));

        state.reset();
        assert_eq!(state.last_zoom, None);
    }
}
