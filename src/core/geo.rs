use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::core::constants::MAX_LATITUDE;

/// A geographical coordinate (WGS84 degrees).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
}

impl Coordinate {
    /// Creates a new coordinate from longitude and latitude
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Validates that the coordinates are within valid ranges
    pub fn is_valid(&self) -> bool {
        self.lat >= -90.0 && self.lat <= 90.0 && self.lon >= -180.0 && self.lon <= 180.0
    }

    /// Clamps latitude to the Web Mercator square limit
    pub fn clamp_lat(lat: f64) -> f64 {
        lat.clamp(-MAX_LATITUDE, MAX_LATITUDE)
    }

    /// Projects this coordinate into continuous tile space at `zoom`.
    pub fn project(&self, zoom: u8) -> TilePoint {
        project(*self, zoom)
    }
}

impl Default for Coordinate {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Continuous position in tile units at a given zoom level.
///
/// One unit is one tile; the integral part addresses a [`Tile`], the
/// fractional part is the position inside it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TilePoint {
    pub x: f64,
    pub y: f64,
    pub zoom: u8,
}

impl TilePoint {
    pub fn new(x: f64, y: f64, zoom: u8) -> Self {
        Self { x, y, zoom }
    }

    /// The discrete tile containing this point
    pub fn tile(&self) -> Tile {
        Tile::from_point(self)
    }

    /// Inverse projection back to geographic coordinates
    pub fn unproject(&self) -> Coordinate {
        unproject(*self)
    }
}

/// Number of tiles per axis at `zoom`.
#[inline]
pub fn world_size(zoom: u8) -> f64 {
    2_f64.powi(zoom as i32)
}

/// Web Mercator forward projection into tile space.
///
/// Latitude is clamped to ±[`MAX_LATITUDE`] first so the transform stays
/// finite at the poles. Longitude is not wrapped.
pub fn project(coordinate: Coordinate, zoom: u8) -> TilePoint {
    let n = world_size(zoom);
    let lat_rad = Coordinate::clamp_lat(coordinate.lat).to_radians();

    let mercator_y = (lat_rad.tan() + 1.0 / lat_rad.cos()).ln();
    let x = (coordinate.lon + 180.0) / 360.0;
    let y = (1.0 - mercator_y / PI) / 2.0;

    TilePoint::new(x * n, y * n, zoom)
}

/// Web Mercator inverse projection from tile space.
pub fn unproject(point: TilePoint) -> Coordinate {
    let n = world_size(point.zoom);
    let lon = point.x / n * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * point.y / n)).sinh().atan().to_degrees();
    Coordinate::new(lon, lat)
}

/// A discrete raster tile in the slippy map tile system.
///
/// Indices are signed and unchecked: a coordinate west of the antimeridian
/// floors to a negative column and is requested as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tile {
    pub x: i32,
    pub y: i32,
    pub zoom: u8,
}

impl Tile {
    pub fn new(x: i32, y: i32, zoom: u8) -> Self {
        Self { x, y, zoom }
    }

    /// Floors a continuous tile point to the tile that contains it
    pub fn from_point(point: &TilePoint) -> Self {
        Self::new(point.x.floor() as i32, point.y.floor() as i32, point.zoom)
    }

    /// Creates the tile containing `coordinate` at `zoom`
    pub fn from_coordinate(coordinate: &Coordinate, zoom: u8) -> Self {
        Self::from_point(&project(*coordinate, zoom))
    }

    /// North-west corner of the tile in tile space
    pub fn origin(&self) -> TilePoint {
        TilePoint::new(self.x as f64, self.y as f64, self.zoom)
    }

    /// Gets the parent tile at a lower zoom level
    pub fn parent(&self) -> Option<Tile> {
        if self.zoom == 0 {
            None
        } else {
            Some(Tile::new(
                self.x.div_euclid(2),
                self.y.div_euclid(2),
                self.zoom - 1,
            ))
        }
    }

    /// Checks if the tile lies inside the `[0, 2^zoom)` grid
    pub fn is_in_range(&self) -> bool {
        let max = 1_i64 << self.zoom.min(62);
        (0..max).contains(&(self.x as i64)) && (0..max).contains(&(self.y as i64))
    }
}

impl std::fmt::Display for Tile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paris_at_zoom_5() {
        let paris = Coordinate::new(2.3522, 48.8566);
        let point = project(paris, 5);

        assert!((point.x - 16.209).abs() < 0.01, "x = {}", point.x);
        assert!(point.y > 11.0 && point.y < 12.0, "y = {}", point.y);
        assert_eq!(point.tile(), Tile::new(16, 11, 5));

        let back = point.unproject();
        assert!((back.lon - paris.lon).abs() < 1e-6);
        assert!((back.lat - paris.lat).abs() < 1e-6);
    }

    #[test]
    fn test_round_trip_all_zooms() {
        let samples = [
            Coordinate::new(-179.9, -84.9),
            Coordinate::new(-74.006, 40.7128),
            Coordinate::new(0.0, 0.0),
            Coordinate::new(139.6503, 35.6762),
            Coordinate::new(179.9, 84.9),
        ];

        for zoom in 0..=19u8 {
            for c in samples {
                let back = unproject(project(c, zoom));
                assert!((back.lon - c.lon).abs() < 1e-9, "lon at z{zoom}: {back:?}");
                assert!((back.lat - c.lat).abs() < 1e-9, "lat at z{zoom}: {back:?}");
            }
        }
    }

    #[test]
    fn test_tile_flooring() {
        let cases = [(0.0, 0.0), (3.999, 7.2), (16.21, 11.01), (-0.5, 2.5)];
        for (x, y) in cases {
            let tile = Tile::from_point(&TilePoint::new(x, y, 6));
            assert_eq!(tile, Tile::new(x.floor() as i32, y.floor() as i32, 6));
        }
    }

    #[test]
    fn test_poles_are_clamped() {
        let north = project(Coordinate::new(0.0, 90.0), 3);
        let south = project(Coordinate::new(0.0, -90.0), 3);

        assert!(north.y.is_finite() && south.y.is_finite());
        assert!(north.y.abs() < 1e-6);
        assert!((south.y - 8.0).abs() < 1e-6);
    }

    #[test]
    fn test_tile_parent_and_range() {
        let tile = Tile::new(16, 11, 5);
        assert_eq!(tile.parent(), Some(Tile::new(8, 5, 4)));
        assert!(tile.is_in_range());
        assert!(!Tile::new(-1, 0, 2).is_in_range());
        assert!(!Tile::new(0, 4, 2).is_in_range());
        assert_eq!(Tile::new(0, 0, 0).parent(), None);
        assert_eq!(tile.to_string(), "5/16/11");
    }
}
