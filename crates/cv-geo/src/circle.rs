//! Circular geofence shapes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::bounds::Bounds;
use crate::location::{distance_haversine, Location, Point};

/// A circle on the sphere: center plus radius in meters.
///
/// A negative radius is a valid value meaning "contains nothing".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub center: Location,
    pub radius: f64,
}

impl Circle {
    pub fn new(center: Location, radius: f64) -> Self {
        Self { center, radius }
    }

    pub fn from_coords(lat: f64, lon: f64, radius: f64) -> Self {
        Self {
            center: Location::new(lat, lon),
            radius,
        }
    }

    pub fn contains_point(&self, p: &Point) -> bool {
        self.radius >= 0.0
            && distance_haversine(self.center.lat, self.center.lon, p.lat, p.lon) <= self.radius
    }

    /// True when the other circle fits entirely inside this one.
    pub fn contains_circle(&self, other: &Circle) -> bool {
        distance_haversine(self.center.lat, self.center.lon, other.center.lat, other.center.lon)
            + other.radius
            <= self.radius
    }

    /// True when this circle could overlap the box: the center lies inside,
    /// or some side passes within the radius.
    pub fn touches(&self, b: &Bounds) -> bool {
        if self.radius < 0.0 {
            return false;
        }
        let c = self.center.point();
        if b.contains_point(&c) {
            return true;
        }
        b.sides()
            .iter()
            .any(|&(s1, s2)| Bounds::side_distance(&c, s1, s2) <= self.radius)
    }
}

impl fmt::Display for Circle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.center.lat, self.center.lon, self.radius)
    }
}
