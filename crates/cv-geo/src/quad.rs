//! A recursive quadtree over geofence shapes.
//!
//! Nodes carry two boxes: the exact `bounds` used to partition space, and a
//! `fuzzy_bounds` inflated 1% per axis. Insertion and redistribution test
//! against the fuzzy box, so a shape sitting exactly on a split line lands in
//! every leaf it could belong to and stays reachable from either side of the
//! line.

use std::sync::Arc;

use crate::bounds::Bounds;
use crate::edge::RoadNetwork;
use crate::entity::Shape;
use crate::location::{Location, Point};

/// A leaf holding more than this many shapes tries to split.
pub const MAX_ELEMENTS: usize = 32;
/// Maximum node depth; level 0 is the root.
pub const MAX_LEVEL: u32 = 6;
/// Children are only created while their extent stays at least this many
/// degrees on the split axis.
pub const MIN_DEGREES: f64 = 0.003;

const FUZZ_FACTOR: f64 = 0.01;

/// A quadtree node. The root owns the whole tree.
#[derive(Debug, Clone)]
pub struct Quad {
    bounds: Bounds,
    fuzzy_bounds: Bounds,
    level: u32,
    elements: Vec<Arc<Shape>>,
    children: Vec<Quad>,
}

impl Quad {
    /// Build an empty tree (a single level-0 leaf) over the given corners.
    pub fn new(sw: Point, ne: Point) -> Self {
        Self::with_level(
            Bounds::new(Location::new(sw.lat, sw.lon), Location::new(ne.lat, ne.lon)),
            0,
        )
    }

    fn with_level(bounds: Bounds, level: u32) -> Self {
        let dlat = bounds.height() * FUZZ_FACTOR;
        let dlon = bounds.width() * FUZZ_FACTOR;
        let fuzzy_bounds = Bounds::from_corners(
            bounds.sw.lat - dlat,
            bounds.sw.lon - dlon,
            bounds.ne.lat + dlat,
            bounds.ne.lon + dlon,
        );
        Self {
            bounds,
            fuzzy_bounds,
            level,
            elements: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn fuzzy_bounds(&self) -> &Bounds {
        &self.fuzzy_bounds
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Insert a shape into every leaf whose fuzzy bounds it touches.
    ///
    /// Returns true when at least one leaf accepted the shape; false means
    /// the shape lies wholly outside the tree.
    pub fn insert(&mut self, net: &RoadNetwork, shape: Arc<Shape>) -> bool {
        if self.is_leaf() {
            if !shape.touches(net, &self.fuzzy_bounds) {
                return false;
            }
            self.elements.push(shape);
            self.maybe_split(net);
            return true;
        }
        let mut accepted = false;
        for child in &mut self.children {
            accepted |= child.insert(net, shape.clone());
        }
        accepted
    }

    fn maybe_split(&mut self, net: &RoadNetwork) {
        if self.elements.len() <= MAX_ELEMENTS || self.level >= MAX_LEVEL {
            return;
        }
        let b = &self.bounds;
        let split_lon = b.width() / 2.0 >= MIN_DEGREES;
        let split_lat = b.height() / 2.0 >= MIN_DEGREES;
        let center = b.center();

        let child_bounds: Vec<Bounds> = if split_lon && split_lat {
            // Four quadrants: NW, NE, SW, SE.
            vec![
                Bounds::from_corners(center.lat, b.sw.lon, b.ne.lat, center.lon),
                Bounds::from_corners(center.lat, center.lon, b.ne.lat, b.ne.lon),
                Bounds::from_corners(b.sw.lat, b.sw.lon, center.lat, center.lon),
                Bounds::from_corners(b.sw.lat, center.lon, center.lat, b.ne.lon),
            ]
        } else if split_lon {
            // West and east halves.
            vec![
                Bounds::from_corners(b.sw.lat, b.sw.lon, b.ne.lat, center.lon),
                Bounds::from_corners(b.sw.lat, center.lon, b.ne.lat, b.ne.lon),
            ]
        } else if split_lat {
            // South and north halves.
            vec![
                Bounds::from_corners(b.sw.lat, b.sw.lon, center.lat, b.ne.lon),
                Bounds::from_corners(center.lat, b.sw.lon, b.ne.lat, b.ne.lon),
            ]
        } else {
            // Too small to split further; the leaf just grows.
            return;
        };

        let level = self.level + 1;
        self.children = child_bounds
            .into_iter()
            .map(|cb| Quad::with_level(cb, level))
            .collect();

        // Redistribute by the same fuzzy-touch rule; shapes straddling a
        // split line land in more than one child.
        for shape in std::mem::take(&mut self.elements) {
            for child in &mut self.children {
                child.insert(net, shape.clone());
            }
        }
    }

    fn descend(&self, p: &Point) -> Option<&Quad> {
        if !self.bounds.contains_point(p) {
            return None;
        }
        let mut node = self;
        while !node.is_leaf() {
            node = node
                .children
                .iter()
                .find(|c| c.fuzzy_bounds.contains_point(p))?;
        }
        Some(node)
    }

    /// All shapes stored at the leaf covering `p`, unfiltered: the caller
    /// decides which candidates actually contain the point. Empty when `p`
    /// is outside the root bounds.
    pub fn retrieve_elements(&self, p: &Point) -> Vec<Arc<Shape>> {
        self.descend(p)
            .map(|leaf| leaf.elements.clone())
            .unwrap_or_default()
    }

    /// The bounds (or fuzzy bounds) of the leaf covering `p`.
    pub fn retrieve_bounds(&self, p: &Point, fuzzy: bool) -> Option<Bounds> {
        self.descend(p)
            .map(|leaf| if fuzzy { leaf.fuzzy_bounds } else { leaf.bounds })
    }

    /// Every node's bounds, depth-first; `leaves_only` restricts the walk to
    /// leaves, `fuzzy` selects the inflated boxes.
    pub fn retrieve_all_bounds(&self, leaves_only: bool, fuzzy: bool) -> Vec<Bounds> {
        let mut out = Vec::new();
        self.collect_bounds(leaves_only, fuzzy, &mut out);
        out
    }

    fn collect_bounds(&self, leaves_only: bool, fuzzy: bool, out: &mut Vec<Bounds>) {
        if !leaves_only || self.is_leaf() {
            out.push(if fuzzy { self.fuzzy_bounds } else { self.bounds });
        }
        for child in &self.children {
            child.collect_bounds(leaves_only, fuzzy, out);
        }
    }

    /// Total number of stored element references across all leaves.
    pub fn element_count(&self) -> usize {
        if self.is_leaf() {
            self.elements.len()
        } else {
            self.children.iter().map(Quad::element_count).sum()
        }
    }
}
