//! Road network vertices, edges, and the areas derived from them.
//!
//! Vertices are shared between edges, so they live in a single owning arena
//! ([`RoadNetwork`]) keyed by uid; an edge stores the stable [`VertexId`]
//! of each endpoint rather than the vertex itself. Moving a vertex through
//! [`RoadNetwork::update_location`] is therefore observed by every edge that
//! references it.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::bounds::Bounds;
use crate::location::{
    bearing, distance_haversine, project_position, segments_intersect, Location, Point,
};
use crate::GeoError;

/// OSM-style road classification; determines the width used when an edge is
/// materialized into an [`Area`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoadClass {
    Motorway,
    Trunk,
    Primary,
    Secondary,
    Tertiary,
    Unclassified,
    Residential,
    Service,
    Other,
}

impl RoadClass {
    /// Curb-to-curb width in meters for this class of way.
    pub fn width_m(self) -> f64 {
        match self {
            RoadClass::Motorway => 22.5,
            RoadClass::Trunk => 18.0,
            RoadClass::Primary => 18.0,
            RoadClass::Secondary => 17.0,
            RoadClass::Tertiary => 17.0,
            RoadClass::Unclassified => 15.0,
            RoadClass::Residential => 15.0,
            RoadClass::Service => 12.0,
            RoadClass::Other => 10.0,
        }
    }

    /// Stable index used in log and error messages.
    pub fn index(self) -> u8 {
        match self {
            RoadClass::Motorway => 0,
            RoadClass::Trunk => 1,
            RoadClass::Primary => 2,
            RoadClass::Secondary => 3,
            RoadClass::Tertiary => 4,
            RoadClass::Unclassified => 5,
            RoadClass::Residential => 6,
            RoadClass::Service => 7,
            RoadClass::Other => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RoadClass::Motorway => "motorway",
            RoadClass::Trunk => "trunk",
            RoadClass::Primary => "primary",
            RoadClass::Secondary => "secondary",
            RoadClass::Tertiary => "tertiary",
            RoadClass::Unclassified => "unclassified",
            RoadClass::Residential => "residential",
            RoadClass::Service => "service",
            RoadClass::Other => "other",
        }
    }

    /// Case-insensitive lookup by OSM way-type name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "motorway" => Some(RoadClass::Motorway),
            "trunk" => Some(RoadClass::Trunk),
            "primary" => Some(RoadClass::Primary),
            "secondary" => Some(RoadClass::Secondary),
            "tertiary" => Some(RoadClass::Tertiary),
            "unclassified" => Some(RoadClass::Unclassified),
            "residential" => Some(RoadClass::Residential),
            "service" => Some(RoadClass::Service),
            "other" => Some(RoadClass::Other),
            _ => None,
        }
    }
}

impl fmt::Display for RoadClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stable index of a vertex inside a [`RoadNetwork`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VertexId(usize);

/// Owning arena for the vertices of a shape set.
///
/// Vertices are [`Location`]s interned by uid: the first position given for a
/// uid wins, and later references share the stored vertex.
#[derive(Debug, Clone, Default)]
pub struct RoadNetwork {
    vertices: Vec<Location>,
    by_uid: HashMap<u64, VertexId>,
}

impl RoadNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a vertex, returning its id and whether it was newly created.
    ///
    /// A repeated uid keeps the position already stored.
    pub fn intern(&mut self, uid: u64, lat: f64, lon: f64) -> (VertexId, bool) {
        if let Some(&id) = self.by_uid.get(&uid) {
            return (id, false);
        }
        let id = VertexId(self.vertices.len());
        self.vertices.push(Location::with_uid(lat, lon, uid));
        self.by_uid.insert(uid, id);
        (id, true)
    }

    pub fn find(&self, uid: u64) -> Option<VertexId> {
        self.by_uid.get(&uid).copied()
    }

    pub fn vertex(&self, id: VertexId) -> &Location {
        &self.vertices[id.0]
    }

    /// Move a vertex. Every edge holding this id observes the new position.
    pub fn update_location(&mut self, id: VertexId, lat: f64, lon: f64) {
        let uid = self.vertices[id.0].uid;
        self.vertices[id.0] = Location::with_uid(lat, lon, uid);
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn vertices(&self) -> &[Location] {
        &self.vertices
    }
}

/// A directed road segment between two arena vertices.
///
/// Edges are compared by uid alone.
#[derive(Debug, Clone)]
pub struct Edge {
    uid: u64,
    v1: VertexId,
    v2: VertexId,
    road_class: RoadClass,
    way_id: Option<u64>,
    explicit: bool,
}

impl Edge {
    /// Build an edge; the endpoints must be distinct vertices.
    pub fn new(
        uid: u64,
        v1: VertexId,
        v2: VertexId,
        road_class: RoadClass,
    ) -> Result<Self, GeoError> {
        if v1 == v2 {
            return Err(GeoError::DegenerateEdge(uid));
        }
        Ok(Self {
            uid,
            v1,
            v2,
            road_class,
            way_id: None,
            explicit: true,
        })
    }

    pub fn with_way_id(mut self, way_id: u64) -> Self {
        self.way_id = Some(way_id);
        self
    }

    pub fn implicit(mut self) -> Self {
        self.explicit = false;
        self
    }

    pub fn uid(&self) -> u64 {
        self.uid
    }

    pub fn v1(&self) -> VertexId {
        self.v1
    }

    pub fn v2(&self) -> VertexId {
        self.v2
    }

    pub fn road_class(&self) -> RoadClass {
        self.road_class
    }

    pub fn way_id(&self) -> Option<u64> {
        self.way_id
    }

    pub fn is_explicit(&self) -> bool {
        self.explicit
    }

    /// Width in meters implied by the road class.
    pub fn way_width(&self) -> f64 {
        self.road_class.width_m()
    }

    pub fn endpoints<'a>(&self, net: &'a RoadNetwork) -> (&'a Location, &'a Location) {
        (net.vertex(self.v1), net.vertex(self.v2))
    }

    /// Latitude delta from v1 to v2, degrees.
    pub fn dlatitude(&self, net: &RoadNetwork) -> f64 {
        let (a, b) = self.endpoints(net);
        b.lat - a.lat
    }

    /// Longitude delta from v1 to v2, degrees.
    pub fn dlongitude(&self, net: &RoadNetwork) -> f64 {
        let (a, b) = self.endpoints(net);
        b.lon - a.lon
    }

    /// Equirectangular length, meters.
    pub fn length(&self, net: &RoadNetwork) -> f64 {
        let (a, b) = self.endpoints(net);
        a.distance_to(b)
    }

    /// Haversine length, meters.
    pub fn length_haversine(&self, net: &RoadNetwork) -> f64 {
        let (a, b) = self.endpoints(net);
        a.distance_to_haversine(b)
    }

    /// Initial bearing from v1 to v2, degrees [0, 360).
    pub fn bearing(&self, net: &RoadNetwork) -> f64 {
        let (a, b) = self.endpoints(net);
        a.bearing_to(b)
    }

    /// Great-circle distance in meters from a point to the segment,
    /// clamped to the nearer endpoint when the projection falls outside.
    pub fn distance_from_point(&self, net: &RoadNetwork, p: &Point) -> f64 {
        let (a, b) = self.endpoints(net);
        let length = a.distance_to_haversine(b);
        let d_ap = distance_haversine(a.lat, a.lon, p.lat, p.lon);
        if length == 0.0 || d_ap == 0.0 {
            return d_ap;
        }
        let d_bp = distance_haversine(b.lat, b.lon, p.lat, p.lon);
        if d_bp == 0.0 {
            return 0.0;
        }

        let theta_ab = bearing(a.lat, a.lon, b.lat, b.lon);
        let theta_ap = bearing(a.lat, a.lon, p.lat, p.lon);
        let delta = crate::location::to_radians(theta_ap - theta_ab);

        // Along-track position of the projection; off either end the nearest
        // endpoint wins.
        let along = d_ap * delta.cos();
        if along <= 0.0 {
            return d_ap;
        }
        if along >= length {
            return d_bp;
        }
        (d_ap * delta.sin()).abs()
    }

    /// True when the two segments cross or share a point.
    pub fn intersects(&self, net: &RoadNetwork, other: &Edge) -> bool {
        let (a1, a2) = self.endpoints(net);
        let (b1, b2) = other.endpoints(net);
        segments_intersect(a1.point(), a2.point(), b1.point(), b2.point())
    }

    /// True when the segment touches the box: an endpoint inside, or a
    /// crossing of any side.
    pub fn touches(&self, net: &RoadNetwork, b: &Bounds) -> bool {
        let (p1, p2) = self.endpoints(net);
        if b.contains_point(&p1.point()) || b.contains_point(&p2.point()) {
            return true;
        }
        b.sides()
            .iter()
            .any(|&(s1, s2)| segments_intersect(p1.point(), p2.point(), s1, s2))
    }

    /// Materialize the oriented rectangle covering this edge at the width
    /// given by its road class, extending both ends by `extension` meters.
    pub fn to_area(&self, net: &RoadNetwork, extension: f64) -> Result<Area, GeoError> {
        self.to_area_with_width(net, self.way_width(), extension)
    }

    /// Materialize an area with an explicit width in meters.
    pub fn to_area_with_width(
        &self,
        net: &RoadNetwork,
        width: f64,
        extension: f64,
    ) -> Result<Area, GeoError> {
        if width <= 0.0 {
            return Err(GeoError::InvalidAreaWidth(width));
        }
        let (a, b) = self.endpoints(net);
        let brg = a.bearing_to(b);

        let (mut start, mut end) = (a.point(), b.point());
        if extension > 0.0 {
            start = project_position(start.lat, start.lon, brg + 180.0, extension);
            end = project_position(end.lat, end.lon, brg, extension);
        }

        let half = width / 2.0;
        Ok(Area::new(
            project_position(start.lat, start.lon, brg - 90.0, half),
            project_position(end.lat, end.lon, brg - 90.0, half),
            project_position(end.lat, end.lon, brg + 90.0, half),
            project_position(start.lat, start.lon, brg + 90.0, half),
        ))
    }
}

impl PartialEq for Edge {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
    }
}

impl Eq for Edge {}

/// A convex oriented rectangle produced from an [`Edge`].
///
/// Corners run clockwise: left side of v1, left side of v2, right side of
/// v2, right side of v1 ("left" is 90 degrees counterclockwise off the edge
/// bearing).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Area {
    corners: [Point; 4],
}

impl Area {
    pub fn new(c0: Point, c1: Point, c2: Point, c3: Point) -> Self {
        Self {
            corners: [c0, c1, c2, c3],
        }
    }

    pub fn corners(&self) -> &[Point; 4] {
        &self.corners
    }

    fn side(&self, i: usize) -> (Point, Point) {
        (self.corners[i], self.corners[(i + 1) % 4])
    }

    /// Cross product of side `i` against the point; the clockwise corner
    /// order makes interior points come out non-positive on every side.
    fn cross(&self, i: usize, p: &Point) -> f64 {
        let (a, b) = self.side(i);
        (b.lon - a.lon) * (p.lat - a.lat) - (b.lat - a.lat) * (p.lon - a.lon)
    }

    /// True when the point lies on the interior side of all four edges.
    pub fn contains(&self, p: &Point) -> bool {
        (0..4).all(|i| self.cross(i, p) <= 0.0)
    }

    /// True only for the single side index the point is outside of;
    /// out-of-range indexes report false.
    pub fn outside_edge(&self, i: usize, p: &Point) -> bool {
        i < 4 && self.cross(i, p) > 0.0
    }

    /// True when the rectangle and the box overlap.
    pub fn touches(&self, b: &Bounds) -> bool {
        if self.corners.iter().any(|c| b.contains_point(c)) {
            return true;
        }
        if b.corners().iter().any(|c| self.contains(c)) {
            return true;
        }
        b.sides().iter().any(|&(s1, s2)| {
            (0..4).any(|i| {
                let (a1, a2) = self.side(i);
                segments_intersect(a1, a2, s1, s2)
            })
        })
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for c in &self.corners {
            write!(f, "{},{} ", c.lat, c.lon)?;
        }
        write!(f, "]")
    }
}
