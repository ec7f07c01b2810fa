//! Location resolution for the SnapFix issue report form.
//!
//! Three inputs can move the report's coordinate: typing into the latitude
//! and longitude fields, looking up a postal code, and clicking the map. This
//! crate reconciles them into one [`CoordinateState`] and keeps a map
//! viewport in step with it:
//! - `coordinate`: text/numeric coordinate pair and update origins.
//! - `geocode`: postal-code resolver and the Nominatim backend.
//! - `map`: viewport projection, tiles, marker and click handling.
//! - `sync`: recenters the viewport on non-click changes.
//! - `session`: a whole form, as hosted by the server.
//! - `report`: the draft handed to the submission collaborator.

pub mod config;
pub mod coordinate;
pub mod geocode;
pub mod map;
pub mod report;
pub mod session;
pub mod sync;

pub use config::{ConfigError, LocationConfig, TileSource};
pub use coordinate::{CoordinateSnapshot, CoordinateState, CoordinateUpdate, LatLng, UpdateOrigin};
pub use geocode::{
    GeocodeCandidate, GeocodeError, GeocodeProvider, GeocodeQuery, GeocodedPoint,
    NominatimClient, Resolution, Resolver,
};
pub use map::{MapFrame, MapSurface, TileRef, ViewPhase, Viewport};
pub use report::{IssueCategory, LogSink, ReportDraft, ReportSink, SubmitError};
pub use session::{FormSnapshot, LocationForm, Notice};
pub use sync::{SkipReason, SyncDecision, ViewSynchronizer, ViewportController};
