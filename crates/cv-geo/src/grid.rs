//! Square grid cells tiling a geographic rectangle.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::bounds::Bounds;
use crate::location::{distance_haversine, project_position, Location, Point};

/// One axis-aligned cell of a grid, tagged with its (row, col) position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub bounds: Bounds,
    pub row: u32,
    pub col: u32,
}

impl Grid {
    pub fn new(bounds: Bounds, row: u32, col: u32) -> Self {
        Self { bounds, row, col }
    }

    pub fn contains_point(&self, p: &Point) -> bool {
        self.bounds.contains_point(p)
    }

    pub fn touches(&self, b: &Bounds) -> bool {
        self.bounds.intersects(b)
    }

    /// Tile the rectangle with northwest corner `nw` and southeast corner
    /// (`se_lat`, `se_lon`) into square cells `side_m` meters on a side.
    ///
    /// Cells are emitted row-major from the northwest. Sides are laid out by
    /// forward projection, with each row's longitude step recomputed at that
    /// row's latitude, so every cell measures `side_m` per side; cells in the
    /// last row/column may overhang the southeast corner.
    pub fn build_grid(nw: Point, side_m: f64, se_lat: f64, se_lon: f64) -> Vec<Grid> {
        let ns_span = distance_haversine(nw.lat, nw.lon, se_lat, nw.lon);
        let ew_span = distance_haversine(nw.lat, nw.lon, nw.lat, se_lon);
        let rows = (ns_span / side_m).ceil() as u32;
        let cols = (ew_span / side_m).ceil() as u32;

        let mut cells = Vec::with_capacity((rows * cols) as usize);
        let mut lat_n = nw.lat;
        for row in 0..rows {
            let lat_s = project_position(lat_n, nw.lon, 180.0, side_m).lat;
            let mut lon_w = nw.lon;
            for col in 0..cols {
                let lon_e = project_position(lat_n, lon_w, 90.0, side_m).lon;
                cells.push(Grid::new(
                    Bounds::new(
                        Location::new(lat_s, lon_w),
                        Location::new(lat_n, lon_e),
                    ),
                    row,
                    col,
                ));
                lon_w = lon_e;
            }
            lat_n = lat_s;
        }
        cells
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.bounds, self.row, self.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_build_grid_dimensions() {
        // A block of the UT campus: ~199 m north-south, ~257 m east-west.
        let nw = Point::new(35.953642, -83.932832);
        let cells = Grid::build_grid(nw, 10.0, 35.951853, -83.929975);
        assert_eq!(cells.len(), 520); // 20 rows x 26 cols

        // Every cell measures 10 m on each of its four sides.
        for cell in &cells {
            let b = &cell.bounds;
            let (nw, ne, se, sw) = (b.nw(), b.ne.point(), b.se(), b.sw.point());
            for (a, z) in [(nw, sw), (nw, ne), (se, sw), (se, ne)] {
                assert_relative_eq!(
                    distance_haversine(a.lat, a.lon, z.lat, z.lon),
                    10.0,
                    max_relative = 1e-3
                );
            }
        }
    }

    #[test]
    fn test_build_grid_cells_are_disjoint() {
        let nw = Point::new(35.953642, -83.932832);
        let cells = Grid::build_grid(nw, 10.0, 35.951853, -83.929975);

        // An interior point lands in exactly one cell.
        let p = Point::new(35.952670, -83.931534);
        let holders: Vec<usize> = cells
            .iter()
            .enumerate()
            .filter(|(_, c)| c.contains_point(&p))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(holders, vec![271]);

        // All cells touch the tiled rectangle.
        let b = Bounds::from_corners(35.951853, -83.932832, 35.953642, -83.929975);
        assert!(cells.iter().all(|c| c.touches(&b)));
    }

    #[test]
    fn test_single_cell_grid() {
        // A rectangle smaller than one side yields a single overhanging cell.
        let nw = Point::new(35.953642, -83.932832);
        let cells = Grid::build_grid(nw, 700.0, 35.951853, -83.929975);
        assert_eq!(cells.len(), 1);
        assert_eq!((cells[0].row, cells[0].col), (0, 0));
    }

    #[test]
    fn test_touches() {
        let g = Grid::new(
            Bounds::from_corners(35.951853, -83.932832, 35.953642, -83.929975),
            0,
            0,
        );
        let overlapping = Bounds::from_corners(35.952062, -83.931951, 35.952320, -83.931718);
        let disjoint = Bounds::from_corners(35.950260, -83.931860, 35.950601, -83.931282);
        assert!(g.touches(&overlapping));
        assert!(!g.touches(&disjoint));
    }
}
