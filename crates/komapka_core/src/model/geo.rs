//! Geographic primitives shared by filtering, viewport tracking and markers.
//!
//! # Responsibility
//! - Represent points and axis-aligned bounding rectangles.
//! - Mirror the map widget's containment and padding rules.
//!
//! # Invariants
//! - `Bounds` is normalized: `south <= north` and `west <= east`.
//! - Containment is inclusive on every edge.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Mean earth radius used for radius-to-degree conversion.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Decimal places used by [`Bounds::bbox_string`].
pub const BBOX_PRECISION: usize = 6;

/// WGS84 point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Axis-aligned geographic rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    /// Builds bounds from two opposite corners in any order.
    pub fn from_corners(a: Coordinates, b: Coordinates) -> Self {
        Self {
            south: a.latitude.min(b.latitude),
            west: a.longitude.min(b.longitude),
            north: a.latitude.max(b.latitude),
            east: a.longitude.max(b.longitude),
        }
    }

    /// Builds bounds from explicit edges, normalizing swapped values.
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self::from_corners(
            Coordinates::new(south, west),
            Coordinates::new(north, east),
        )
    }

    /// Square approximation of a circle of `radius_km` around `center`.
    pub fn around(center: Coordinates, radius_km: f64) -> Self {
        let lat_diff = (radius_km / EARTH_RADIUS_KM).to_degrees();
        let lng_diff = (radius_km / (EARTH_RADIUS_KM * center.latitude.to_radians().cos()))
            .to_degrees()
            .abs();
        Self::new(
            center.latitude - lat_diff,
            center.longitude - lng_diff,
            center.latitude + lat_diff,
            center.longitude + lng_diff,
        )
    }

    pub fn contains(&self, point: Coordinates) -> bool {
        point.latitude >= self.south
            && point.latitude <= self.north
            && point.longitude >= self.west
            && point.longitude <= self.east
    }

    /// Returns whether `other` lies entirely inside `self`.
    pub fn contains_bounds(&self, other: &Bounds) -> bool {
        other.south >= self.south
            && other.north <= self.north
            && other.west >= self.west
            && other.east <= self.east
    }

    pub fn center(&self) -> Coordinates {
        Coordinates::new(
            (self.south + self.north) / 2.0,
            (self.west + self.east) / 2.0,
        )
    }

    /// Latitude span in degrees.
    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    /// Longitude span in degrees.
    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    /// Grows every side by `ratio` of the corresponding span.
    ///
    /// `pad(0.5)` therefore doubles both spans.
    pub fn pad(&self, ratio: f64) -> Self {
        let height_buffer = self.height().abs() * ratio;
        let width_buffer = self.width().abs() * ratio;
        Self {
            south: self.south - height_buffer,
            west: self.west - width_buffer,
            north: self.north + height_buffer,
            east: self.east + width_buffer,
        }
    }

    /// Canonical `west,south,east,north` string with fixed precision.
    pub fn bbox_string(&self) -> String {
        format!(
            "{:.p$},{:.p$},{:.p$},{:.p$}",
            self.west,
            self.south,
            self.east,
            self.north,
            p = BBOX_PRECISION
        )
    }

    /// Parses the `west,south,east,north` form produced by [`Self::bbox_string`].
    pub fn parse_bbox(value: &str) -> Option<Self> {
        let parts = value
            .split(',')
            .map(|part| part.trim().parse::<f64>().ok())
            .collect::<Option<Vec<_>>>()?;
        match parts.as_slice() {
            [west, south, east, north] => Some(Self::new(*south, *west, *north, *east)),
            _ => None,
        }
    }
}

impl Display for Bounds {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.bbox_string())
    }
}
