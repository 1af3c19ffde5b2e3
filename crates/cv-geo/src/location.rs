//! Points, locations, and great-circle math.
//!
//! All angular arguments are decimal degrees and all distances are meters.
//! Bearings are measured clockwise from true north and normalized into
//! [0, 360).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Earth radius in meters (WGS-84 semi-major axis).
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Convert decimal degrees to radians.
pub fn to_radians(degrees: f64) -> f64 {
    degrees * std::f64::consts::PI / 180.0
}

/// Convert radians to decimal degrees.
pub fn to_degrees(radians: f64) -> f64 {
    radians * 180.0 / std::f64::consts::PI
}

/// Normalize a longitude into (-180, 180].
pub fn normalize_lon(lon: f64) -> f64 {
    let wrapped = (lon % 360.0 + 540.0) % 360.0 - 180.0;
    if wrapped == -180.0 {
        180.0
    } else {
        wrapped
    }
}

/// Equirectangular planar distance in meters.
///
/// Cheap approximation that treats the two latitudes as parallel lines;
/// accurate to well under a meter at road-network scales.
pub fn distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = to_radians(lat1);
    let phi2 = to_radians(lat2);
    let x = (to_radians(lon2) - to_radians(lon1)) * ((phi1 + phi2) / 2.0).cos();
    let y = phi2 - phi1;
    EARTH_RADIUS_M * (x * x + y * y).sqrt()
}

/// Haversine great-circle distance in meters.
pub fn distance_haversine(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = to_radians(lat1);
    let phi2 = to_radians(lat2);
    let dphi = to_radians(lat2 - lat1);
    let dlambda = to_radians(lon2 - lon1);

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// Initial great-circle bearing from the first position to the second,
/// in degrees [0, 360).
pub fn bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = to_radians(lat1);
    let phi2 = to_radians(lat2);
    let dlambda = to_radians(lon2 - lon1);

    let y = dlambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * dlambda.cos();
    let theta = to_degrees(y.atan2(x));
    (theta % 360.0 + 360.0) % 360.0
}

/// Great-circle midpoint of the two positions.
pub fn midpoint(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> Point {
    let phi1 = to_radians(lat1);
    let phi2 = to_radians(lat2);
    let dlambda = to_radians(lon2 - lon1);

    let bx = phi2.cos() * dlambda.cos();
    let by = phi2.cos() * dlambda.sin();
    let lat = (phi1.sin() + phi2.sin())
        .atan2(((phi1.cos() + bx).powi(2) + by * by).sqrt());
    let lon = to_radians(lon1) + by.atan2(phi1.cos() + bx);

    Point::new(to_degrees(lat), normalize_lon(to_degrees(lon)))
}

/// Project a position forward along `bearing_deg` by `distance_m` meters.
///
/// The spherical formula keeps latitudes in range across the poles; the
/// resulting longitude is normalized into (-180, 180].
pub fn project_position(lat: f64, lon: f64, bearing_deg: f64, distance_m: f64) -> Point {
    let phi1 = to_radians(lat);
    let lambda1 = to_radians(lon);
    let theta = to_radians(bearing_deg);
    let delta = distance_m / EARTH_RADIUS_M;

    let phi2 = (phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos()).asin();
    let lambda2 = lambda1
        + (theta.sin() * delta.sin() * phi1.cos()).atan2(delta.cos() - phi1.sin() * phi2.sin());

    Point::new(to_degrees(phi2), normalize_lon(to_degrees(lambda2)))
}

/// A bare latitude/longitude pair in decimal degrees.
///
/// Equality is exact f64 equality; geometric comparisons go through the
/// distance functions instead.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lon: f64,
}

impl Point {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lon)
    }
}

impl From<Location> for Point {
    fn from(loc: Location) -> Self {
        Point::new(loc.lat, loc.lon)
    }
}

/// A [`Point`] with a stable 64-bit identifier.
///
/// Two locations are equal only when coordinates and uid all match.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
    pub uid: u64,
}

impl Location {
    /// An anonymous location (uid 0).
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon, uid: 0 }
    }

    pub fn with_uid(lat: f64, lon: f64, uid: u64) -> Self {
        Self { lat, lon, uid }
    }

    pub fn point(&self) -> Point {
        Point::new(self.lat, self.lon)
    }

    /// Equirectangular distance to another location, meters.
    pub fn distance_to(&self, other: &Location) -> f64 {
        distance(self.lat, self.lon, other.lat, other.lon)
    }

    /// Haversine distance to another location, meters.
    pub fn distance_to_haversine(&self, other: &Location) -> f64 {
        distance_haversine(self.lat, self.lon, other.lat, other.lon)
    }

    /// Initial bearing toward another location, degrees [0, 360).
    pub fn bearing_to(&self, other: &Location) -> f64 {
        bearing(self.lat, self.lon, other.lat, other.lon)
    }

    /// Great-circle midpoint between this and another location.
    pub fn midpoint(&self, other: &Location) -> Point {
        midpoint(self.lat, self.lon, other.lat, other.lon)
    }

    /// Project this location along a bearing by a distance in meters.
    pub fn project_position(&self, bearing_deg: f64, distance_m: f64) -> Point {
        project_position(self.lat, self.lon, bearing_deg, distance_m)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.uid, self.lat, self.lon)
    }
}

/// True when the two planar segments (a1, a2) and (b1, b2) intersect.
///
/// Segments are treated in the (lon, lat) plane, which is adequate for the
/// sub-kilometer shapes the geofence works with.
pub(crate) fn segments_intersect(a1: Point, a2: Point, b1: Point, b2: Point) -> bool {
    fn orient(p: Point, q: Point, r: Point) -> f64 {
        (q.lon - p.lon) * (r.lat - p.lat) - (q.lat - p.lat) * (r.lon - p.lon)
    }
    fn on_segment(p: Point, q: Point, r: Point) -> bool {
        r.lon >= p.lon.min(q.lon)
            && r.lon <= p.lon.max(q.lon)
            && r.lat >= p.lat.min(q.lat)
            && r.lat <= p.lat.max(q.lat)
    }

    let d1 = orient(a1, a2, b1);
    let d2 = orient(a1, a2, b2);
    let d3 = orient(b1, b2, a1);
    let d4 = orient(b1, b2, a2);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    (d1 == 0.0 && on_segment(a1, a2, b1))
        || (d2 == 0.0 && on_segment(a1, a2, b2))
        || (d3 == 0.0 && on_segment(b1, b2, a1))
        || (d4 == 0.0 && on_segment(b1, b2, a2))
}
