//! The subset of a Basic Safety Message the filters read.

use std::fmt;

use cv_geo::Point;

/// Id a message carries before its `coreData.id` has been seen.
pub const UNASSIGNED_ID: &str = "UNASSIGNED";

/// The filterable core of a BSM: identifier, position, and speed.
///
/// One instance is reused across messages; [`Bsm::reset`] returns it to the
/// sentinel state (`UNASSIGNED`, 90.0, 180.0, -1.0) at each message boundary
/// instead of reallocating.
#[derive(Debug, Clone, PartialEq)]
pub struct Bsm {
    id: String,
    pub lat: f64,
    pub lon: f64,
    velocity: f64,
}

impl Bsm {
    pub fn new() -> Self {
        Self {
            id: UNASSIGNED_ID.to_string(),
            lat: 90.0,
            lon: 180.0,
            velocity: -1.0,
        }
    }

    pub fn reset(&mut self) {
        self.id.clear();
        self.id.push_str(UNASSIGNED_ID);
        self.lat = 90.0;
        self.lon = 180.0;
        self.velocity = -1.0;
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: &str) {
        self.id.clear();
        self.id.push_str(id);
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    pub fn set_velocity(&mut self, velocity: f64) {
        self.velocity = velocity;
    }

    pub fn set_latitude(&mut self, lat: f64) {
        self.lat = lat;
    }

    pub fn set_longitude(&mut self, lon: f64) {
        self.lon = lon;
    }

    pub fn position(&self) -> Point {
        Point::new(self.lat, self.lon)
    }
}

impl Default for Bsm {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Bsm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.id, self.lat, self.lon, self.velocity)
    }
}
