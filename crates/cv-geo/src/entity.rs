//! The sum type over every geofence shape.

use crate::bounds::Bounds;
use crate::circle::Circle;
use crate::edge::{Area, Edge, RoadNetwork};
use crate::grid::Grid;
use crate::location::{Location, Point};

/// Any shape the spatial index can hold.
///
/// `touches` is the optimistic test used for insertion and redistribution
/// (may the shape overlap this box?); `contains` is the definitive test the
/// geofence query runs on retrieved candidates. Edge geometry lives in the
/// [`RoadNetwork`] arena, so both take the network; the other variants
/// ignore it.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Location(Location),
    Edge(Edge),
    Area(Area),
    Circle(Circle),
    Grid(Grid),
}

impl Shape {
    pub fn type_tag(&self) -> &'static str {
        match self {
            Shape::Location(_) => "location",
            Shape::Edge(_) => "edge",
            Shape::Area(_) => "area",
            Shape::Circle(_) => "circle",
            Shape::Grid(_) => "grid",
        }
    }

    /// May this shape overlap the box?
    pub fn touches(&self, net: &RoadNetwork, b: &Bounds) -> bool {
        match self {
            Shape::Location(loc) => b.contains_point(&loc.point()),
            Shape::Edge(e) => e.touches(net, b),
            Shape::Area(a) => a.touches(b),
            Shape::Circle(c) => c.touches(b),
            Shape::Grid(g) => g.touches(b),
        }
    }

    /// Does this shape definitely contain the point?
    ///
    /// Edges are materialized at their road-class width with no end
    /// extension; callers wanting an extension materialize the area
    /// themselves.
    pub fn contains(&self, net: &RoadNetwork, p: &Point) -> bool {
        match self {
            Shape::Location(loc) => loc.lat == p.lat && loc.lon == p.lon,
            Shape::Edge(e) => e
                .to_area(net, 0.0)
                .map(|a| a.contains(p))
                .unwrap_or(false),
            Shape::Area(a) => a.contains(p),
            Shape::Circle(c) => c.contains_point(p),
            Shape::Grid(g) => g.contains_point(p),
        }
    }
}
