use serde::{Deserialize, Serialize};

use crate::core::bounds::Bounds;
use crate::core::constants::MAX_ZOOM_LEVEL;
use crate::core::geo::{self, Coordinate, Tile, TilePoint};
use crate::tiles::source::ServerInfo;

/// The visible map region as handed over by the presentation layer:
/// center, zoom and canvas dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// The center of the map view in geographical coordinates
    pub center: Coordinate,
    /// The current zoom level
    pub zoom: u8,
    /// Canvas width in pixels
    pub width: f64,
    /// Canvas height in pixels
    pub height: f64,
}

impl Viewport {
    /// Creates a new viewport
    pub fn new(center: Coordinate, zoom: u8, width: f64, height: f64) -> Self {
        Self {
            center,
            zoom,
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    /// Returns a copy whose zoom is clamped to the server's zoom range
    pub fn clamped(&self, server: &ServerInfo) -> Self {
        Self {
            zoom: server.clamp_zoom(self.zoom),
            ..*self
        }
    }

    /// Sets the center of the viewport
    pub fn set_center(&mut self, center: Coordinate) {
        self.center = center;
    }

    /// Sets the zoom level, clamping to the server's range
    pub fn set_zoom(&mut self, zoom: u8, server: &ServerInfo) {
        self.zoom = server.clamp_zoom(zoom);
    }

    /// Sets the canvas size
    pub fn set_size(&mut self, width: f64, height: f64) {
        self.width = width.max(0.0);
        self.height = height.max(0.0);
    }

    /// Pans the view by a pixel offset on the canvas
    pub fn pan_by(&mut self, dx: f64, dy: f64, server: &ServerInfo) {
        let transform = self.transform(server);
        self.center = transform.to_coordinate(self.width / 2.0 + dx, self.height / 2.0 + dy);
    }

    /// Builds the pixel transform for this viewport against a tile server
    pub fn transform(&self, server: &ServerInfo) -> ViewTransform {
        let zoom = server.clamp_zoom(self.zoom);
        let tile_width = server.tile_width as f64;
        let tile_height = server.tile_height as f64;
        let center = geo::project(self.center, zoom);

        ViewTransform {
            zoom,
            tile_width,
            tile_height,
            origin_x: center.x - self.width / 2.0 / tile_width,
            origin_y: center.y - self.height / 2.0 / tile_height,
            width: self.width,
            height: self.height,
        }
    }

    /// Geographic bounding box of the canvas
    pub fn bounds(&self, server: &ServerInfo) -> Bounds {
        self.transform(server).bounds()
    }

    /// Tiles covering the canvas plus `buffer` rings around it, nearest to
    /// the center first. Only tiles inside the `[0, 2^zoom)` grid are listed.
    pub fn visible_tiles(&self, server: &ServerInfo, buffer: u32) -> Vec<Tile> {
        self.transform(server).visible_tiles(buffer)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(Coordinate::default(), 2, 800.0, 600.0)
    }
}

/// Maps between tile space and canvas pixels for one viewport snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    pub zoom: u8,
    pub tile_width: f64,
    pub tile_height: f64,
    /// Tile-space position of the canvas top-left corner
    pub origin_x: f64,
    pub origin_y: f64,
    pub width: f64,
    pub height: f64,
}

impl ViewTransform {
    /// Canvas pixel position of a geographic coordinate
    pub fn to_canvas(&self, coordinate: &Coordinate) -> (f64, f64) {
        self.point_to_canvas(&geo::project(*coordinate, self.zoom))
    }

    pub fn point_to_canvas(&self, point: &TilePoint) -> (f64, f64) {
        (
            (point.x - self.origin_x) * self.tile_width,
            (point.y - self.origin_y) * self.tile_height,
        )
    }

    /// Geographic coordinate under a canvas pixel
    pub fn to_coordinate(&self, x: f64, y: f64) -> Coordinate {
        geo::unproject(TilePoint::new(
            self.origin_x + x / self.tile_width,
            self.origin_y + y / self.tile_height,
            self.zoom,
        ))
    }

    /// Canvas position of a tile's top-left corner
    pub fn tile_position(&self, tile: &Tile) -> (f64, f64) {
        self.point_to_canvas(&tile.origin())
    }

    pub fn bounds(&self) -> Bounds {
        let north_west = self.to_coordinate(0.0, 0.0);
        let south_east = self.to_coordinate(self.width, self.height);
        Bounds::from_coords(north_west.lon, south_east.lat, south_east.lon, north_west.lat)
    }

    pub fn visible_tiles(&self, buffer: u32) -> Vec<Tile> {
        let buffer = buffer as i64;
        let grid = 1_i64 << self.zoom.min(MAX_ZOOM_LEVEL);

        let min_x = (self.origin_x.floor() as i64 - buffer).max(0);
        let min_y = (self.origin_y.floor() as i64 - buffer).max(0);
        let max_x = ((self.origin_x + self.width / self.tile_width).floor() as i64 + buffer)
            .min(grid - 1);
        let max_y = ((self.origin_y + self.height / self.tile_height).floor() as i64 + buffer)
            .min(grid - 1);

        let mut tiles = Vec::new();
        for x in min_x..=max_x {
            for y in min_y..=max_y {
                tiles.push(Tile::new(x as i32, y as i32, self.zoom));
            }
        }

        // Like Leaflet: load from the center outwards
        let center_x = self.origin_x + self.width / self.tile_width / 2.0;
        let center_y = self.origin_y + self.height / self.tile_height / 2.0;
        let distance = |tile: &Tile| {
            let dx = tile.x as f64 + 0.5 - center_x;
            let dy = tile.y as f64 + 0.5 - center_y;
            dx * dx + dy * dy
        };
        tiles.sort_by(|a, b| distance(a).total_cmp(&distance(b)));
        tiles
    }
}
