//! One open report form: coordinate state, map and synchronizer wired
//! together, plus the postal-code field and the pending notice.
//!
//! Geocoding is split in two so callers can drop any lock while the request
//! is in flight: run [`Resolver::resolve`](crate::geocode::Resolver::resolve)
//! and hand its result to [`LocationForm::apply_resolution`]. Overlapping
//! lookups apply in the order they finish, so the last response to arrive
//! wins.

use chrono::Utc;
use serde::Serialize;
use tracing::debug;

use crate::config::LocationConfig;
use crate::coordinate::{
    CoordinateSnapshot, CoordinateState, LatLng, UpdateOrigin, format_click_component,
};
use crate::geocode::{GeocodeError, Resolution};
use crate::map::{MapFrame, MapSurface, ViewPhase};
use crate::report::{IssueCategory, ReportDraft, SubmitError};
use crate::sync::{SyncDecision, ViewSynchronizer};

pub const NOT_FOUND_MESSAGE: &str = "No location found";
pub const LOOKUP_FAILED_MESSAGE: &str = "Could not look up that postal code. Please try again.";

/// Blocking message the user has to dismiss.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    NotFound { message: String },
    LookupFailed { message: String },
}

impl Notice {
    fn not_found() -> Self {
        Notice::NotFound {
            message: NOT_FOUND_MESSAGE.into(),
        }
    }

    fn lookup_failed() -> Self {
        Notice::LookupFailed {
            message: LOOKUP_FAILED_MESSAGE.into(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Notice::NotFound { message } | Notice::LookupFailed { message } => message,
        }
    }
}

/// Serializable view of a form for clients.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FormSnapshot {
    pub revision: u64,
    pub coordinates: CoordinateSnapshot,
    pub postal_code: String,
    pub notice: Option<Notice>,
    pub map: MapFrame,
}

#[derive(Clone, Debug)]
pub struct LocationForm {
    coordinates: CoordinateState,
    map: MapSurface,
    sync: ViewSynchronizer,
    postal_code: String,
    notice: Option<Notice>,
    revision: u64,
}

impl LocationForm {
    pub fn new(config: &LocationConfig) -> Self {
        let coordinates = CoordinateState::new(config.default_position);
        let sync = ViewSynchronizer::new(coordinates.numeric());
        Self {
            coordinates,
            map: MapSurface::new(config),
            sync,
            postal_code: String::new(),
            notice: None,
            revision: 0,
        }
    }

    pub fn coordinates(&self) -> &CoordinateState {
        &self.coordinates
    }

    pub fn map(&self) -> &MapSurface {
        &self.map
    }

    pub fn postal_code(&self) -> &str {
        &self.postal_code
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    /// Bumped on every change a client could observe.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn edit_latitude(&mut self, text: &str) -> SyncDecision {
        self.edit_coordinates(Some(text), None)
    }

    pub fn edit_longitude(&mut self, text: &str) -> SyncDecision {
        self.edit_coordinates(None, Some(text))
    }

    /// Typed input into either text field.
    pub fn edit_coordinates(&mut self, lat: Option<&str>, lng: Option<&str>) -> SyncDecision {
        self.write(UpdateOrigin::ManualEdit, lat, lng)
    }

    pub fn edit_postal_code(&mut self, text: &str) {
        self.postal_code = text.to_string();
        self.touch();
    }

    /// Click at container pixel `(x, y)`. Returns the position written, or
    /// `None` when the click fell outside the map.
    pub fn click_map(&mut self, x: f64, y: f64) -> Option<LatLng> {
        let point = self.map.click(x, y)?;
        let lat = format_click_component(point.lat);
        let lng = format_click_component(point.lng);
        self.write(UpdateOrigin::MapClick, Some(&lat), Some(&lng));
        metrics::counter!("snapfix_map_clicks_total").increment(1);
        Some(point)
    }

    pub fn pan(&mut self, center: LatLng) {
        self.map.pan(center);
        self.touch();
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.map.pan_by(dx, dy);
        self.touch();
    }

    pub fn zoom_to(&mut self, zoom: u8) {
        self.map.zoom_to(zoom);
        self.touch();
    }

    pub fn resize_map(&mut self, width: u32, height: u32) {
        self.map.resize(width, height);
        self.touch();
    }

    pub fn finish_animation(&mut self) {
        if let ViewPhase::Recentering { .. } = self.map.phase() {
            self.map.finish_animation();
            self.touch();
        }
    }

    /// Fold a finished lookup into the form.
    ///
    /// A match overwrites both text fields in one update and recenters the
    /// map. Misses and failures leave the coordinates alone and raise a
    /// notice, which is returned.
    pub fn apply_resolution(
        &mut self,
        result: Result<Resolution, GeocodeError>,
    ) -> Option<&Notice> {
        match result {
            Ok(Resolution::Skipped) => None,
            Ok(Resolution::Found(point)) => {
                debug!(
                    lat = %point.lat_text,
                    lng = %point.lng_text,
                    place = point.display_name.as_deref().unwrap_or("-"),
                    "applying geocode result"
                );
                self.write(
                    UpdateOrigin::GeocodeResult,
                    Some(&point.lat_text),
                    Some(&point.lng_text),
                );
                None
            }
            Ok(Resolution::NotFound) => self.raise(Notice::not_found()),
            // The resolver already logged the failure with its postal code.
            Err(_) => self.raise(Notice::lookup_failed()),
        }
    }

    /// Dismiss the pending notice, returning it.
    pub fn acknowledge_notice(&mut self) -> Option<Notice> {
        let notice = self.notice.take();
        if notice.is_some() {
            self.touch();
        }
        notice
    }

    pub fn render(&self) -> MapFrame {
        self.map.render(self.coordinates.position())
    }

    pub fn snapshot(&self) -> FormSnapshot {
        FormSnapshot {
            revision: self.revision,
            coordinates: self.coordinates.get(),
            postal_code: self.postal_code.clone(),
            notice: self.notice.clone(),
            map: self.render(),
        }
    }

    /// Build the report from the current coordinate state.
    pub fn submit(
        &self,
        title: &str,
        category: &str,
        image_name: Option<&str>,
    ) -> Result<ReportDraft, SubmitError> {
        let category: IssueCategory = category.parse()?;
        let position = self
            .coordinates
            .position()
            .ok_or_else(|| SubmitError::InvalidPosition {
                lat_text: self.coordinates.lat_text().to_string(),
                lng_text: self.coordinates.lng_text().to_string(),
            })?;
        Ok(ReportDraft {
            title: title.trim().to_string(),
            category,
            image_name: image_name
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
            latitude: position.lat,
            longitude: position.lng,
            submitted_at: Utc::now(),
        })
    }

    fn write(&mut self, origin: UpdateOrigin, lat: Option<&str>, lng: Option<&str>) -> SyncDecision {
        let update = self.coordinates.update(origin, lat, lng);
        let decision = self.sync.observe(&update, &mut self.map);
        self.touch();
        decision
    }

    fn raise(&mut self, notice: Notice) -> Option<&Notice> {
        self.notice = Some(notice);
        self.touch();
        self.notice.as_ref()
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}
