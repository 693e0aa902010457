use crate::core::geo::Coordinate;
use rstar::AABB;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding rectangle in geographic degrees.
///
/// `min` is the south-west corner, `max` the north-east corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Coordinate,
    pub max: Coordinate,
}

impl Bounds {
    /// Creates new bounds from two corners
    pub fn new(min: Coordinate, max: Coordinate) -> Self {
        Self { min, max }
    }

    /// Creates bounds from individual coordinates
    pub fn from_coords(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self::new(
            Coordinate::new(min_lon, min_lat),
            Coordinate::new(max_lon, max_lat),
        )
    }

    /// Degenerate bounds around a single coordinate
    pub fn from_point(point: Coordinate) -> Self {
        Self::new(point, point)
    }

    /// Smallest bounds containing every coordinate, `None` for an empty input
    pub fn from_coordinates<'a>(points: impl IntoIterator<Item = &'a Coordinate>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        let mut bounds = Self::from_point(first);
        for point in iter {
            bounds.extend(point);
        }
        Some(bounds)
    }

    pub fn width(&self) -> f64 {
        self.max.lon - self.min.lon
    }

    pub fn height(&self) -> f64 {
        self.max.lat - self.min.lat
    }

    /// Gets the center point of the bounds
    pub fn center(&self) -> Coordinate {
        Coordinate::new(
            (self.min.lon + self.max.lon) / 2.0,
            (self.min.lat + self.max.lat) / 2.0,
        )
    }

    /// Checks if the bounds contain a point (edges inclusive)
    pub fn contains(&self, point: &Coordinate) -> bool {
        point.lon >= self.min.lon
            && point.lon <= self.max.lon
            && point.lat >= self.min.lat
            && point.lat <= self.max.lat
    }

    /// Checks if the bounds intersect with another bounds (touching counts)
    pub fn intersects(&self, other: &Bounds) -> bool {
        !(other.max.lon < self.min.lon
            || other.min.lon > self.max.lon
            || other.max.lat < self.min.lat
            || other.min.lat > self.max.lat)
    }

    /// Extends the bounds to include a point
    pub fn extend(&mut self, point: &Coordinate) {
        self.min.lon = self.min.lon.min(point.lon);
        self.min.lat = self.min.lat.min(point.lat);
        self.max.lon = self.max.lon.max(point.lon);
        self.max.lat = self.max.lat.max(point.lat);
    }

    /// Extends the bounds to include another bounds
    pub fn extend_bounds(&mut self, other: &Bounds) {
        self.extend(&other.min);
        self.extend(&other.max);
    }

    /// Checks if the bounds are valid (min <= max)
    pub fn is_valid(&self) -> bool {
        self.min.lon <= self.max.lon && self.min.lat <= self.max.lat
    }

    /// The rectangle as an rstar envelope (`[lon, lat]` corners)
    pub fn envelope(&self) -> AABB<[f64; 2]> {
        AABB::from_corners(
            [self.min.lon, self.min.lat],
            [self.max.lon, self.max.lat],
        )
    }

    pub fn from_envelope(envelope: &AABB<[f64; 2]>) -> Self {
        let lower = envelope.lower();
        let upper = envelope.upper();
        Self::from_coords(lower[0], lower[1], upper[0], upper[1])
    }
}
