//! Keeps the map viewport in step with the coordinate state.
//!
//! The synchronizer never looks the map up on its own; callers hand it the
//! viewport to drive through [`ViewportController`] on every update.

use serde::Serialize;
use tracing::debug;

use crate::coordinate::{CoordinateUpdate, LatLng, UpdateOrigin};

/// Explicit handle on a map viewport.
pub trait ViewportController {
    fn zoom(&self) -> u8;
    fn set_view(&mut self, center: LatLng, zoom: u8, animate: bool);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The user clicked the point; it is already in view.
    MapClick,
    /// Text changed but the parsed pair did not.
    Unchanged,
    /// Nothing drawable to recenter on.
    InvalidPosition,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum SyncDecision {
    Recenter { center: LatLng },
    Skip { reason: SkipReason },
}

impl SyncDecision {
    pub fn recentered(&self) -> bool {
        matches!(self, SyncDecision::Recenter { .. })
    }
}

#[derive(Clone, Debug)]
pub struct ViewSynchronizer {
    /// Last numeric pair observed, valid or not.
    key: LatLng,
    animate: bool,
}

impl ViewSynchronizer {
    pub fn new(initial: LatLng) -> Self {
        Self {
            key: initial,
            animate: true,
        }
    }

    /// Jump instead of animating; used by headless callers.
    pub fn without_animation(mut self) -> Self {
        self.animate = false;
        self
    }

    /// Decide what `update` means for the viewport without touching it.
    pub fn decide(&self, update: &CoordinateUpdate) -> SyncDecision {
        let current = update.current;
        match update.origin {
            UpdateOrigin::MapClick => SyncDecision::Skip {
                reason: SkipReason::MapClick,
            },
            _ if !current.is_valid() => SyncDecision::Skip {
                reason: SkipReason::InvalidPosition,
            },
            // Every accepted lookup is a fresh request to look at that spot.
            UpdateOrigin::GeocodeResult => SyncDecision::Recenter { center: current },
            UpdateOrigin::ManualEdit if self.key.same_key(&current) => SyncDecision::Skip {
                reason: SkipReason::Unchanged,
            },
            UpdateOrigin::ManualEdit => SyncDecision::Recenter { center: current },
        }
    }

    /// Record `update` and recenter `view` when the origin calls for it.
    pub fn observe<C>(&mut self, update: &CoordinateUpdate, view: &mut C) -> SyncDecision
    where
        C: ViewportController + ?Sized,
    {
        let decision = self.decide(update);
        self.key = update.current;
        if let SyncDecision::Recenter { center } = decision {
            let zoom = view.zoom();
            view.set_view(center, zoom, self.animate);
            metrics::counter!("snapfix_recenters_total", "origin" => update.origin.label())
                .increment(1);
            debug!(
                origin = update.origin.label(),
                lat = center.lat,
                lng = center.lng,
                zoom,
                "recentering map"
            );
        }
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingView {
        zoom: u8,
        calls: Vec<(LatLng, u8, bool)>,
    }

    impl ViewportController for RecordingView {
        fn zoom(&self) -> u8 {
            self.zoom
        }

        fn set_view(&mut self, center: LatLng, zoom: u8, animate: bool) {
            self.calls.push((center, zoom, animate));
        }
    }

    fn update(origin: UpdateOrigin, previous: (f64, f64), current: (f64, f64)) -> CoordinateUpdate {
        CoordinateUpdate {
            origin,
            previous: LatLng::new(previous.0, previous.1),
            current: LatLng::new(current.0, current.1),
        }
    }

    #[test]
    fn click_never_recenters() {
        let mut sync = ViewSynchronizer::new(LatLng::new(1.0, 1.0));
        let mut view = RecordingView::default();
        let decision = sync.observe(&update(UpdateOrigin::MapClick, (1.0, 1.0), (2.0, 2.0)), &mut view);
        assert_eq!(decision, SyncDecision::Skip { reason: SkipReason::MapClick });
        assert!(view.calls.is_empty());
    }

    #[test]
    fn manual_edit_recenters_at_current_zoom() {
        let mut sync = ViewSynchronizer::new(LatLng::new(1.0, 1.0));
        let mut view = RecordingView {
            zoom: 16,
            ..Default::default()
        };
        let decision = sync.observe(&update(UpdateOrigin::ManualEdit, (1.0, 1.0), (1.5, 1.0)), &mut view);
        assert!(decision.recentered());
        assert_eq!(view.calls, vec![(LatLng::new(1.5, 1.0), 16, true)]);
    }

    #[test]
    fn cosmetic_edit_does_not_recenter() {
        let mut sync = ViewSynchronizer::new(LatLng::new(1.0, 1.0));
        let mut view = RecordingView::default();
        let decision = sync.observe(&update(UpdateOrigin::ManualEdit, (1.0, 1.0), (1.0, 1.0)), &mut view);
        assert_eq!(decision, SyncDecision::Skip { reason: SkipReason::Unchanged });
        assert!(view.calls.is_empty());
    }

    #[test]
    fn key_follows_clicks() {
        let mut sync = ViewSynchronizer::new(LatLng::new(1.0, 1.0));
        let mut view = RecordingView::default();
        sync.observe(&update(UpdateOrigin::MapClick, (1.0, 1.0), (3.0, 4.0)), &mut view);
        // Typing the clicked value again is not a change.
        let decision = sync.observe(&update(UpdateOrigin::ManualEdit, (3.0, 4.0), (3.0, 4.0)), &mut view);
        assert!(!decision.recentered());
        assert!(view.calls.is_empty());
    }

    #[test]
    fn invalid_position_is_skipped() {
        let mut sync = ViewSynchronizer::new(LatLng::new(1.0, 1.0));
        let mut view = RecordingView::default();
        let decision = sync.observe(
            &update(UpdateOrigin::ManualEdit, (1.0, 1.0), (f64::NAN, 1.0)),
            &mut view,
        );
        assert_eq!(decision, SyncDecision::Skip { reason: SkipReason::InvalidPosition });
        // Restoring the old value is a change relative to the NaN key.
        let decision = sync.observe(&update(UpdateOrigin::ManualEdit, (f64::NAN, 1.0), (1.0, 1.0)), &mut view);
        assert!(decision.recentered());
    }

    #[test]
    fn geocode_results_always_recenter() {
        let mut sync = ViewSynchronizer::new(LatLng::new(1.0, 1.0)).without_animation();
        let mut view = RecordingView::default();
        for _ in 0..2 {
            let decision = sync.observe(&update(UpdateOrigin::GeocodeResult, (2.0, 2.0), (2.0, 2.0)), &mut view);
            assert!(decision.recentered());
        }
        assert_eq!(view.calls.len(), 2);
        assert!(view.calls.iter().all(|(_, _, animate)| !animate));
    }
}
