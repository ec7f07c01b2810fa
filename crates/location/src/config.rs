//! Map and geocoder settings. Values can be overridden through environment
//! variables and, in the binary, through command-line flags.

use thiserror::Error;

use crate::coordinate::LatLng;

/// Highest zoom level the default tile provider serves.
pub const MAX_ZOOM: u8 = 19;

/// Largest map container side, in pixels.
pub const MAX_MAP_SIDE: u32 = 4096;

pub const DEFAULT_TILE_URL: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";
pub const DEFAULT_ATTRIBUTION: &str = "\u{a9} OpenStreetMap contributors";
pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org/search";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("default coordinate ({lat}, {lng}) is outside the valid range")]
    InvalidDefault { lat: f64, lng: f64 },
    #[error("zoom {0} exceeds the maximum of {max}", max = MAX_ZOOM)]
    Zoom(u8),
    #[error("map size must be between 1 and {max} pixels per side, got {0}x{1}", max = MAX_MAP_SIDE)]
    MapSize(u32, u32),
    #[error("tile template {0:?} is missing one of {{z}}, {{x}}, {{y}}")]
    TileTemplate(String),
}

/// Raster tile endpoint and the credit line its terms require.
#[derive(Clone, Debug, PartialEq)]
pub struct TileSource {
    pub url_template: String,
    pub attribution: String,
    pub subdomains: Vec<String>,
}

impl Default for TileSource {
    fn default() -> Self {
        Self {
            url_template: DEFAULT_TILE_URL.into(),
            attribution: DEFAULT_ATTRIBUTION.into(),
            subdomains: vec!["a".into(), "b".into(), "c".into()],
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LocationConfig {
    /// Position shown when a report form opens.
    pub default_position: LatLng,
    pub zoom: u8,
    /// Map container size in pixels.
    pub map_size: (u32, u32),
    pub tiles: TileSource,
    pub geocoder_url: String,
    /// Appended to every postal-code query.
    pub country: String,
    pub user_agent: String,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            default_position: LatLng::new(28.6139, 77.2090),
            zoom: 13,
            map_size: (800, 600),
            tiles: TileSource::default(),
            geocoder_url: DEFAULT_GEOCODER_URL.into(),
            country: "India".into(),
            user_agent: concat!("snapfix/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

impl LocationConfig {
    /// Defaults overlaid with any `SNAPFIX_*` environment variables that parse.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(lat) = env_parse("SNAPFIX_DEFAULT_LAT") {
            config.default_position.lat = lat;
        }
        if let Some(lng) = env_parse("SNAPFIX_DEFAULT_LNG") {
            config.default_position.lng = lng;
        }
        if let Some(zoom) = env_parse("SNAPFIX_ZOOM") {
            config.zoom = zoom;
        }
        if let Ok(url) = std::env::var("SNAPFIX_TILE_URL") {
            config.tiles.url_template = url;
        }
        if let Ok(attribution) = std::env::var("SNAPFIX_TILE_ATTRIBUTION") {
            config.tiles.attribution = attribution;
        }
        if let Ok(url) = std::env::var("SNAPFIX_GEOCODER_URL") {
            config.geocoder_url = url;
        }
        if let Ok(country) = std::env::var("SNAPFIX_COUNTRY") {
            config.country = country;
        }
        if let Ok(agent) = std::env::var("SNAPFIX_USER_AGENT") {
            config.user_agent = agent;
        }
        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.default_position.is_valid() {
            return Err(ConfigError::InvalidDefault {
                lat: self.default_position.lat,
                lng: self.default_position.lng,
            });
        }
        if self.zoom > MAX_ZOOM {
            return Err(ConfigError::Zoom(self.zoom));
        }
        let (width, height) = self.map_size;
        if !(1..=MAX_MAP_SIDE).contains(&width) || !(1..=MAX_MAP_SIDE).contains(&height) {
            return Err(ConfigError::MapSize(self.map_size.0, self.map_size.1));
        }
        let template = &self.tiles.url_template;
        if !["{z}", "{x}", "{y}"].iter().all(|key| template.contains(key)) {
            return Err(ConfigError::TileTemplate(template.clone()));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
