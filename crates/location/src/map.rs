//! Map interaction surface: viewport projection, tile coverage, marker
//! placement and click-to-set input.
//!
//! Positions are projected with spherical Web Mercator on 256-pixel tiles,
//! the same slippy-map maths tile servers use for their `{z}/{x}/{y}` scheme.

use std::collections::HashMap;
use std::f64::consts::PI;

use serde::Serialize;

use crate::config::{LocationConfig, MAX_MAP_SIDE, MAX_ZOOM, TileSource};
use crate::coordinate::{CLICK_PRECISION, LatLng};
use crate::sync::ViewportController;

pub const TILE_SIZE: f64 = 256.0;
/// Latitude limit of the square Web Mercator world.
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

/// Visible map window.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Viewport {
    pub center: LatLng,
    pub zoom: u8,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(center: LatLng, zoom: u8, (width, height): (u32, u32)) -> Self {
        Self {
            center,
            zoom: zoom.min(MAX_ZOOM),
            width,
            height,
        }
    }

    fn world_size(&self) -> f64 {
        TILE_SIZE * f64::from(1_u32 << self.zoom)
    }

    /// Absolute pixel position of `point` in the world map at this zoom.
    pub fn project(&self, point: LatLng) -> (f64, f64) {
        let size = self.world_size();
        let lat = point.lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
        let x = (point.lng + 180.0) / 360.0 * size;
        let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * size;
        (x, y)
    }

    pub fn unproject(&self, (x, y): (f64, f64)) -> LatLng {
        let size = self.world_size();
        let lng = x / size * 360.0 - 180.0;
        let lat = (PI * (1.0 - 2.0 * y / size)).sinh().atan().to_degrees();
        LatLng::new(lat, lng)
    }

    /// World pixel of the container's top-left corner.
    fn origin(&self) -> (f64, f64) {
        let (cx, cy) = self.project(self.center);
        (
            cx - f64::from(self.width) / 2.0,
            cy - f64::from(self.height) / 2.0,
        )
    }

    /// Geographic position under a container pixel.
    pub fn container_point_to_latlng(&self, x: f64, y: f64) -> LatLng {
        let (ox, oy) = self.origin();
        self.unproject((ox + x, oy + y))
    }

    pub fn latlng_to_container_point(&self, point: LatLng) -> (f64, f64) {
        let (ox, oy) = self.origin();
        let (px, py) = self.project(point);
        (px - ox, py - oy)
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        (0.0..=f64::from(self.width)).contains(&x) && (0.0..=f64::from(self.height)).contains(&y)
    }
}

/// Phase of the viewport relative to the coordinate state.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ViewPhase {
    /// Viewport centred on the coordinate state.
    Idle,
    /// The user has panned or zoomed away.
    Diverged,
    /// Animating back to `target`.
    Recentering { target: LatLng },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TileRef {
    pub z: u8,
    pub x: i64,
    pub y: i64,
    pub url: String,
    /// Container pixel of the tile's top-left corner.
    pub offset: (f64, f64),
}

/// Everything needed to draw the map once.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MapFrame {
    pub viewport: Viewport,
    pub view: ViewPhase,
    pub marker: Option<LatLng>,
    /// Container pixel of the marker.
    pub marker_point: Option<(f64, f64)>,
    pub tiles: Vec<TileRef>,
    pub attribution: String,
}

#[derive(Clone, Debug)]
pub struct MapSurface {
    viewport: Viewport,
    phase: ViewPhase,
    tiles: TileSource,
    recenters: u64,
}

impl MapSurface {
    pub fn new(config: &LocationConfig) -> Self {
        Self {
            viewport: Viewport::new(config.default_position, config.zoom, config.map_size),
            phase: ViewPhase::Idle,
            tiles: config.tiles.clone(),
            recenters: 0,
        }
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn phase(&self) -> ViewPhase {
        self.phase
    }

    /// Number of times the view entered `Recentering`.
    pub fn recenter_count(&self) -> u64 {
        self.recenters
    }

    /// Convert a click inside the container into a rounded position.
    ///
    /// Returns `None` for clicks outside the container or above and below the
    /// Mercator world. The viewport is left alone: the clicked point is
    /// already in view.
    pub fn click(&self, x: f64, y: f64) -> Option<LatLng> {
        if !self.viewport.contains_point(x, y) {
            return None;
        }
        let point = self
            .viewport
            .container_point_to_latlng(x, y)
            .rounded(CLICK_PRECISION);
        (point.is_valid() && point.lat.abs() <= MAX_MERCATOR_LAT).then_some(point)
    }

    /// User drag. Invalid centres are ignored.
    pub fn pan(&mut self, center: LatLng) {
        if !center.is_valid() {
            return;
        }
        self.viewport.center = center;
        self.phase = ViewPhase::Diverged;
    }

    /// User drag by a pixel offset; content moves with the pointer.
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        let center = self.viewport.container_point_to_latlng(
            f64::from(self.viewport.width) / 2.0 - dx,
            f64::from(self.viewport.height) / 2.0 - dy,
        );
        self.pan(LatLng::new(center.lat, wrap_longitude(center.lng)));
    }

    /// User zoom gesture.
    pub fn zoom_to(&mut self, zoom: u8) {
        self.viewport.zoom = zoom.min(MAX_ZOOM);
        self.phase = ViewPhase::Diverged;
    }

    /// Container resize. Zero sizes are ignored; each side is capped at
    /// [`MAX_MAP_SIDE`] so one frame never needs more than a few hundred tiles.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.viewport.width = width.min(MAX_MAP_SIDE);
            self.viewport.height = height.min(MAX_MAP_SIDE);
        }
    }

    /// Animation reached its target.
    pub fn finish_animation(&mut self) {
        if let ViewPhase::Recentering { .. } = self.phase {
            self.phase = ViewPhase::Idle;
        }
    }

    /// Draw the current viewport with a marker at `marker` if it is valid.
    pub fn render(&self, marker: Option<LatLng>) -> MapFrame {
        let marker = marker.filter(LatLng::is_valid);
        MapFrame {
            viewport: self.viewport,
            view: self.phase,
            marker,
            marker_point: marker.map(|point| self.viewport.latlng_to_container_point(point)),
            tiles: self.visible_tiles(),
            attribution: self.tiles.attribution.clone(),
        }
    }

    /// Tiles overlapping the container, left to right, top to bottom.
    pub fn visible_tiles(&self) -> Vec<TileRef> {
        let zoom = self.viewport.zoom;
        let n = 1_i64 << zoom;
        let (ox, oy) = self.viewport.origin();
        let first_x = (ox / TILE_SIZE).floor() as i64;
        let last_x = ((ox + f64::from(self.viewport.width)) / TILE_SIZE).ceil() as i64 - 1;
        let first_y = ((oy / TILE_SIZE).floor() as i64).max(0);
        let last_y = (((oy + f64::from(self.viewport.height)) / TILE_SIZE).ceil() as i64 - 1).min(n - 1);

        let mut tiles = Vec::new();
        for y in first_y..=last_y {
            for x in first_x..=last_x {
                let wrapped = ((x % n) + n) % n;
                tiles.push(TileRef {
                    z: zoom,
                    x: wrapped,
                    y,
                    url: self.tile_url(zoom, wrapped, y),
                    offset: (x as f64 * TILE_SIZE - ox, y as f64 * TILE_SIZE - oy),
                });
            }
        }
        tiles
    }

    fn tile_url(&self, zoom: u8, x: i64, y: i64) -> String {
        build_tile_url(&self.tiles, zoom, x, y)
    }
}

impl ViewportController for MapSurface {
    fn zoom(&self) -> u8 {
        self.viewport.zoom
    }

    fn set_view(&mut self, center: LatLng, zoom: u8, animate: bool) {
        self.viewport.center = center;
        self.viewport.zoom = zoom.min(MAX_ZOOM);
        self.recenters += 1;
        self.phase = if animate {
            ViewPhase::Recentering { target: center }
        } else {
            ViewPhase::Idle
        };
    }
}

fn wrap_longitude(lng: f64) -> f64 {
    (lng + 180.0).rem_euclid(360.0) - 180.0
}

/// Interpolate a `{s}/{z}/{x}/{y}` template for one tile.
pub fn build_tile_url(source: &TileSource, zoom: u8, x: i64, y: i64) -> String {
    let mut values: HashMap<&str, String> = HashMap::new();
    values.insert("z", zoom.to_string());
    values.insert("x", x.to_string());
    values.insert("y", y.to_string());
    values.insert("r", String::new());
    if source.url_template.contains("{s}") && !source.subdomains.is_empty() {
        let index = (x + y).unsigned_abs() as usize % source.subdomains.len();
        values.insert("s", source.subdomains[index].clone());
    }

    let mut url = source.url_template.clone();
    for (key, value) in &values {
        url = url.replace(&format!("{{{key}}}"), value);
    }
    url
}
