//! Canonical coordinate state shared by the text inputs and the map.
//!
//! The editable text is the source of truth; numeric values are re-derived
//! from it on every write so the form can sit in a half-typed state (`"-"`,
//! `""`) without raising errors. Consumers ask for [`CoordinateState::position`]
//! and skip rendering when it is `None`.

use serde::{Deserialize, Serialize};

/// Decimal places kept when a map click is written back into the text fields.
pub const CLICK_PRECISION: usize = 6;

/// Geographic position in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Both components finite and inside the WGS84 ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Round both components to `places` decimals.
    pub fn rounded(&self, places: usize) -> Self {
        let scale = 10f64.powi(places as i32);
        Self {
            lat: (self.lat * scale).round() / scale,
            lng: (self.lng * scale).round() / scale,
        }
    }

    /// Key equality used for change detection: NaN matches NaN.
    pub(crate) fn same_key(&self, other: &LatLng) -> bool {
        fn eq(a: f64, b: f64) -> bool {
            (a.is_nan() && b.is_nan()) || a == b
        }
        eq(self.lat, other.lat) && eq(self.lng, other.lng)
    }
}

/// Where a coordinate write came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateOrigin {
    ManualEdit,
    GeocodeResult,
    MapClick,
}

impl UpdateOrigin {
    pub fn label(self) -> &'static str {
        match self {
            UpdateOrigin::ManualEdit => "manual_edit",
            UpdateOrigin::GeocodeResult => "geocode_result",
            UpdateOrigin::MapClick => "map_click",
        }
    }
}

/// A committed write, handed to observers such as the view synchronizer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoordinateUpdate {
    pub origin: UpdateOrigin,
    pub previous: LatLng,
    pub current: LatLng,
}

impl CoordinateUpdate {
    pub fn numeric_changed(&self) -> bool {
        !self.previous.same_key(&self.current)
    }
}

/// Text and numeric view of the state at one instant.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CoordinateSnapshot {
    pub lat_text: String,
    pub lng_text: String,
    pub lat: f64,
    pub lng: f64,
}

#[derive(Clone, Debug)]
pub struct CoordinateState {
    lat_text: String,
    lng_text: String,
    numeric: LatLng,
}

impl CoordinateState {
    /// Start from a fixed position, formatted the way a user would type it.
    pub fn new(initial: LatLng) -> Self {
        Self::from_text(&initial.lat.to_string(), &initial.lng.to_string())
    }

    pub fn from_text(lat_text: &str, lng_text: &str) -> Self {
        let mut state = Self {
            lat_text: lat_text.to_string(),
            lng_text: lng_text.to_string(),
            numeric: LatLng::new(f64::NAN, f64::NAN),
        };
        state.reparse();
        state
    }

    pub fn get(&self) -> CoordinateSnapshot {
        CoordinateSnapshot {
            lat_text: self.lat_text.clone(),
            lng_text: self.lng_text.clone(),
            lat: self.numeric.lat,
            lng: self.numeric.lng,
        }
    }

    /// Replace whichever fields are given and re-derive both numeric values.
    pub fn set(&mut self, lat_text: Option<&str>, lng_text: Option<&str>) {
        if let Some(text) = lat_text {
            self.lat_text = text.to_string();
        }
        if let Some(text) = lng_text {
            self.lng_text = text.to_string();
        }
        self.reparse();
    }

    /// Apply a write and describe it for observers.
    pub fn update(
        &mut self,
        origin: UpdateOrigin,
        lat_text: Option<&str>,
        lng_text: Option<&str>,
    ) -> CoordinateUpdate {
        let previous = self.numeric;
        self.set(lat_text, lng_text);
        CoordinateUpdate {
            origin,
            previous,
            current: self.numeric,
        }
    }

    /// Raw parsed pair, possibly NaN.
    pub fn numeric(&self) -> LatLng {
        self.numeric
    }

    /// The pair when it can be drawn on a map.
    pub fn position(&self) -> Option<LatLng> {
        self.numeric.is_valid().then_some(self.numeric)
    }

    pub fn lat_text(&self) -> &str {
        &self.lat_text
    }

    pub fn lng_text(&self) -> &str {
        &self.lng_text
    }

    fn reparse(&mut self) {
        self.numeric = LatLng::new(
            parse_coordinate_text(&self.lat_text),
            parse_coordinate_text(&self.lng_text),
        );
    }
}

/// Parse one text field. Anything that is not a finite decimal becomes NaN.
pub fn parse_coordinate_text(text: &str) -> f64 {
    match text.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => f64::NAN,
    }
}

/// Text written into the fields after a map click.
pub fn format_click_component(value: f64) -> String {
    format!("{:.*}", CLICK_PRECISION, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_parses_both_fields() {
        let mut state = CoordinateState::new(LatLng::new(28.6139, 77.2090));
        for (lat, lng) in [("12.5", "-45.25"), ("0", "0"), ("-89.999", "179.5"), (" 3.75 ", "+8")] {
            state.set(Some(lat), Some(lng));
            let snapshot = state.get();
            assert_eq!(snapshot.lat, lat.trim().parse::<f64>().unwrap());
            assert_eq!(snapshot.lng, lng.trim().parse::<f64>().unwrap());
            assert_eq!(snapshot.lat_text, lat);
            assert_eq!(snapshot.lng_text, lng);
        }
    }

    #[test]
    fn setting_one_field_keeps_the_other() {
        let mut state = CoordinateState::from_text("10", "20");
        state.set(None, Some("30"));
        let snapshot = state.get();
        assert_eq!(snapshot.lat, 10.0);
        assert_eq!(snapshot.lng, 30.0);
        assert_eq!(snapshot.lat_text, "10");
    }

    #[test]
    fn malformed_text_becomes_nan_without_error() {
        let mut state = CoordinateState::from_text("10", "20");
        for bad in ["", "-", "abc", "1.2.3", "NaN", "inf"] {
            state.set(Some(bad), None);
            assert!(state.get().lat.is_nan(), "{bad:?} should not parse");
            assert_eq!(state.get().lng, 20.0);
            assert!(state.position().is_none());
        }
    }

    #[test]
    fn out_of_range_values_have_no_position() {
        let state = CoordinateState::from_text("91", "20");
        assert_eq!(state.numeric().lat, 91.0);
        assert!(state.position().is_none());
        let state = CoordinateState::from_text("45", "-180.5");
        assert!(state.position().is_none());
    }

    #[test]
    fn update_reports_previous_and_current() {
        let mut state = CoordinateState::from_text("1", "2");
        let update = state.update(UpdateOrigin::ManualEdit, Some("1.0"), None);
        assert!(!update.numeric_changed());
        let update = state.update(UpdateOrigin::ManualEdit, Some("1.5"), None);
        assert!(update.numeric_changed());
        assert_eq!(update.previous, LatLng::new(1.0, 2.0));
        assert_eq!(update.current, LatLng::new(1.5, 2.0));
    }

    #[test]
    fn nan_keys_compare_equal() {
        let a = LatLng::new(f64::NAN, 5.0);
        let b = LatLng::new(f64::NAN, 5.0);
        assert!(a.same_key(&b));
        assert!(!a.same_key(&LatLng::new(1.0, 5.0)));
    }

    #[test]
    fn click_components_format_to_six_places() {
        assert_eq!(format_click_component(12.3456781), "12.345678");
        assert_eq!(format_click_component(98.7654319), "98.765432");
        assert_eq!(format_click_component(-0.5), "-0.500000");
    }
}
