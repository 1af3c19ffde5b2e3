//! Axis-aligned latitude/longitude boxes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::location::{distance_haversine, Location, Point};

/// An axis-aligned box described by its southwest and northeast corners.
///
/// Invariant: `sw.lat <= ne.lat` and `sw.lon <= ne.lon`; boxes never cross
/// the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub sw: Location,
    pub ne: Location,
}

impl Bounds {
    pub fn new(sw: Location, ne: Location) -> Self {
        Self { sw, ne }
    }

    pub fn from_corners(sw_lat: f64, sw_lon: f64, ne_lat: f64, ne_lon: f64) -> Self {
        Self {
            sw: Location::new(sw_lat, sw_lon),
            ne: Location::new(ne_lat, ne_lon),
        }
    }

    /// Northwest corner.
    pub fn nw(&self) -> Point {
        Point::new(self.ne.lat, self.sw.lon)
    }

    /// Southeast corner.
    pub fn se(&self) -> Point {
        Point::new(self.sw.lat, self.ne.lon)
    }

    /// Longitudinal extent in degrees.
    pub fn width(&self) -> f64 {
        self.ne.lon - self.sw.lon
    }

    /// Latitudinal extent in degrees.
    pub fn height(&self) -> f64 {
        self.ne.lat - self.sw.lat
    }

    pub fn contains_point(&self, p: &Point) -> bool {
        p.lat >= self.sw.lat && p.lat <= self.ne.lat && p.lon >= self.sw.lon && p.lon <= self.ne.lon
    }

    pub fn contains_bounds(&self, other: &Bounds) -> bool {
        self.contains_point(&other.sw.point()) && self.contains_point(&other.ne.point())
    }

    pub fn intersects(&self, other: &Bounds) -> bool {
        self.sw.lon <= other.ne.lon
            && self.ne.lon >= other.sw.lon
            && self.sw.lat <= other.ne.lat
            && self.ne.lat >= other.sw.lat
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.sw.lat + self.ne.lat) / 2.0,
            (self.sw.lon + self.ne.lon) / 2.0,
        )
    }

    pub fn west_midpoint(&self) -> Point {
        Point::new((self.sw.lat + self.ne.lat) / 2.0, self.sw.lon)
    }

    pub fn east_midpoint(&self) -> Point {
        Point::new((self.sw.lat + self.ne.lat) / 2.0, self.ne.lon)
    }

    pub fn north_midpoint(&self) -> Point {
        Point::new(self.ne.lat, (self.sw.lon + self.ne.lon) / 2.0)
    }

    pub fn south_midpoint(&self) -> Point {
        Point::new(self.sw.lat, (self.sw.lon + self.ne.lon) / 2.0)
    }

    /// Corners in clockwise order starting at the northwest.
    pub fn corners(&self) -> [Point; 4] {
        [self.nw(), self.ne.point(), self.se(), self.sw.point()]
    }

    /// Sides in clockwise order starting with the north side.
    pub fn sides(&self) -> [(Point, Point); 4] {
        let [nw, ne, se, sw] = self.corners();
        [(nw, ne), (ne, se), (se, sw), (sw, nw)]
    }

    /// Great-circle distance in meters from a point to the nearest spot on
    /// the box side running from `a` to `b` (sides are axis-aligned, so the
    /// nearest spot is found by clamping).
    pub(crate) fn side_distance(p: &Point, a: Point, b: Point) -> f64 {
        let lat = p.lat.clamp(a.lat.min(b.lat), a.lat.max(b.lat));
        let lon = p.lon.clamp(a.lon.min(b.lon), a.lon.max(b.lon));
        distance_haversine(p.lat, p.lon, lat, lon)
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.sw.lat, self.sw.lon, self.ne.lat, self.ne.lon
        )
    }
}
