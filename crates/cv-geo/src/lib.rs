//! Geographic primitives and the geofence spatial index.
//!
//! This crate holds the value types and spatial machinery behind the
//! connected-vehicle geofence:
//!
//! - [`location`]: points, locations, and great-circle math (distances,
//!   bearings, midpoints, forward projection).
//! - [`bounds`]: axis-aligned latitude/longitude boxes.
//! - [`edge`]: the road network arena (shared vertices), directed edges with
//!   OSM-style road classes, and the oriented rectangles ([`edge::Area`])
//!   derived from them.
//! - [`circle`] and [`grid`]: the remaining geofence shapes.
//! - [`entity`]: the sum type over every shape, with the `touches`/`contains`
//!   queries the spatial index relies on.
//! - [`quad`]: a recursive quadtree keyed by fuzzy-extended bounds.
//! - [`mapfile`]: the CSV shape-file reader and writer.

pub mod bounds;
pub mod circle;
pub mod edge;
pub mod entity;
pub mod grid;
pub mod location;
pub mod mapfile;
pub mod quad;

pub use bounds::Bounds;
pub use circle::Circle;
pub use edge::{Area, Edge, RoadClass, RoadNetwork, VertexId};
pub use entity::Shape;
pub use grid::Grid;
pub use location::{Location, Point};
pub use quad::Quad;

use thiserror::Error;

/// Errors raised when constructing geometric shapes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeoError {
    /// An edge was given the same vertex for both endpoints.
    #[error("edge endpoints must be distinct vertices (uid {0})")]
    DegenerateEdge(u64),

    /// An area was requested with a non-positive width.
    #[error("area width must be positive, got {0}")]
    InvalidAreaWidth(f64),
}
