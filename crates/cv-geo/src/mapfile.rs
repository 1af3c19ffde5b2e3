//! Geofence shape file reader and writer.
//!
//! The file is UTF-8, one shape per comma-separated line; whitespace around
//! any field is ignored:
//!
//! ```text
//! edge,<uid>,<vuid1>;<lat1>;<lon1>:<vuid2>;<lat2>;<lon2>,<key>=<value>:<key>=<value>
//! circle,<uid>,<lat>:<lon>:<radius>
//! grid,<row>_<col>,<swLat>:<swLon>:<neLat>:<neLon>
//! ```
//!
//! Recognized edge attributes are `way_type` (an OSM way-type name, checked
//! against a configurable blacklist) and `way_id` (integer). Latitudes must
//! fall in [-80, 80] and longitudes in [-180, 180].

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

use crate::circle::Circle;
use crate::edge::{Edge, RoadClass, RoadNetwork};
use crate::grid::Grid;
use crate::location::Location;
use crate::Bounds;

const LAT_RANGE: std::ops::RangeInclusive<f64> = -80.0..=80.0;
const LON_RANGE: std::ops::RangeInclusive<f64> = -180.0..=180.0;

/// Everything parsed out of a shape file: the vertex arena plus the shapes.
#[derive(Debug, Default)]
pub struct ShapeSet {
    pub network: RoadNetwork,
    pub edges: Vec<Edge>,
    pub circles: Vec<Circle>,
    pub grids: Vec<Grid>,
}

/// Errors raised while parsing a shape file; each carries the 1-based line
/// number it came from.
#[derive(Debug, Error)]
pub enum MapFileError {
    #[error("cannot read shape file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: unknown shape kind {kind:?}")]
    UnknownKind { line: usize, kind: String },

    #[error("line {line}: expected {expected} fields for {kind}, found {found}")]
    FieldCount {
        line: usize,
        kind: &'static str,
        expected: &'static str,
        found: usize,
    },

    #[error("line {line}: invalid {field}: {value:?}")]
    InvalidField {
        line: usize,
        field: &'static str,
        value: String,
    },

    #[error("line {line}: {field} out of range: {value}")]
    OutOfRange {
        line: usize,
        field: &'static str,
        value: f64,
    },

    #[error("line {line}: edge endpoints share vertex uid {uid}")]
    DegenerateEdge { line: usize, uid: u64 },

    #[error("line {line}: way type {way_type} excluded from the geofence [{occurrences}]")]
    ExcludedWayType {
        line: usize,
        way_type: RoadClass,
        occurrences: u64,
    },
}

impl MapFileError {
    /// Blacklisted way types reject a single line, not the whole file.
    pub fn is_excluded_way(&self) -> bool {
        matches!(self, MapFileError::ExcludedWayType { .. })
    }
}

/// Parser for the CSV shape format.
///
/// The reader accumulates shapes across lines so that vertices shared
/// between edges resolve to the same arena slot. Repeated vertex uids keep
/// their first position; a repeat with different coordinates logs a warning.
#[derive(Debug, Default)]
pub struct CsvShapeReader {
    blacklist: HashSet<RoadClass>,
    excluded_way_count: u64,
    shapes: ShapeSet,
}

impl CsvShapeReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// A reader that rejects edges whose `way_type` is in the blacklist.
    pub fn with_blacklist(blacklist: HashSet<RoadClass>) -> Self {
        Self {
            blacklist,
            ..Self::default()
        }
    }

    /// Read an entire file. Lines rejected by the way-type blacklist are
    /// skipped with a warning; any other malformed line fails the load.
    pub fn load(mut self, path: &Path) -> Result<ShapeSet, MapFileError> {
        let file = File::open(path).map_err(|source| MapFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| MapFileError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            match self.parse_line(idx + 1, &line) {
                Ok(()) => {}
                Err(err) if err.is_excluded_way() => {
                    warn!(%err, "skipping excluded way");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(self.shapes)
    }

    pub fn into_shapes(self) -> ShapeSet {
        self.shapes
    }

    /// Parse one line; empty lines and `#` comments are ignored.
    pub fn parse_line(&mut self, line_no: usize, line: &str) -> Result<(), MapFileError> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(());
        }
        let fields: Vec<&str> = trimmed.split(',').map(str::trim).collect();
        match fields[0] {
            "edge" => self.make_edge(line_no, &fields),
            "circle" => self.make_circle(line_no, &fields),
            "grid" => self.make_grid(line_no, &fields),
            other => Err(MapFileError::UnknownKind {
                line: line_no,
                kind: other.to_string(),
            }),
        }
    }

    /// Parse `edge,<uid>,<v1>:<v2>[,<attrs>]`.
    pub fn make_edge(&mut self, line_no: usize, fields: &[&str]) -> Result<(), MapFileError> {
        if fields.len() != 3 && fields.len() != 4 {
            return Err(MapFileError::FieldCount {
                line: line_no,
                kind: "edge",
                expected: "3 or 4",
                found: fields.len(),
            });
        }
        let uid = parse_u64(line_no, "edge uid", fields[1])?;

        let points: Vec<&str> = fields[2].split(':').map(str::trim).collect();
        if points.len() != 2 {
            return Err(MapFileError::FieldCount {
                line: line_no,
                kind: "edge endpoints",
                expected: "2",
                found: points.len(),
            });
        }
        let (uid1, lat1, lon1) = parse_vertex(line_no, points[0])?;
        let (uid2, lat2, lon2) = parse_vertex(line_no, points[1])?;
        if uid1 == uid2 {
            return Err(MapFileError::DegenerateEdge {
                line: line_no,
                uid: uid1,
            });
        }

        let mut road_class = RoadClass::Other;
        let mut way_id = None;
        if fields.len() == 4 {
            for attr in fields[3].split(':') {
                let mut parts = attr.splitn(2, '=');
                let key = parts.next().unwrap_or("").trim();
                let value = parts.next().unwrap_or("").trim();
                match key {
                    "way_type" => {
                        road_class = RoadClass::from_name(value).ok_or_else(|| {
                            MapFileError::InvalidField {
                                line: line_no,
                                field: "way_type",
                                value: value.to_string(),
                            }
                        })?;
                    }
                    "way_id" => {
                        way_id = Some(parse_u64(line_no, "way_id", value)?);
                    }
                    // Unrecognized attributes are ignored.
                    _ => {}
                }
            }
        }

        if self.blacklist.contains(&road_class) {
            self.excluded_way_count += 1;
            return Err(MapFileError::ExcludedWayType {
                line: line_no,
                way_type: road_class,
                occurrences: self.excluded_way_count,
            });
        }

        let v1 = self.intern_vertex(line_no, uid1, lat1, lon1);
        let v2 = self.intern_vertex(line_no, uid2, lat2, lon2);
        let mut edge =
            Edge::new(uid, v1, v2, road_class).map_err(|_| MapFileError::DegenerateEdge {
                line: line_no,
                uid: uid1,
            })?;
        if let Some(way_id) = way_id {
            edge = edge.with_way_id(way_id);
        }
        self.shapes.edges.push(edge);
        Ok(())
    }

    /// Parse `circle,<uid>,<lat>:<lon>:<radius>`.
    pub fn make_circle(&mut self, line_no: usize, fields: &[&str]) -> Result<(), MapFileError> {
        if fields.len() != 3 {
            return Err(MapFileError::FieldCount {
                line: line_no,
                kind: "circle",
                expected: "3",
                found: fields.len(),
            });
        }
        let uid = parse_u64(line_no, "circle uid", fields[1])?;
        let parts: Vec<&str> = fields[2].split(':').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(MapFileError::FieldCount {
                line: line_no,
                kind: "circle center",
                expected: "3",
                found: parts.len(),
            });
        }
        let lat = parse_lat(line_no, parts[0])?;
        let lon = parse_lon(line_no, parts[1])?;
        let radius = parse_f64(line_no, "radius", parts[2])?;
        if radius < 0.0 {
            return Err(MapFileError::OutOfRange {
                line: line_no,
                field: "radius",
                value: radius,
            });
        }
        self.shapes
            .circles
            .push(Circle::new(Location::with_uid(lat, lon, uid), radius));
        Ok(())
    }

    /// Parse `grid,<row>_<col>,<swLat>:<swLon>:<neLat>:<neLon>`.
    pub fn make_grid(&mut self, line_no: usize, fields: &[&str]) -> Result<(), MapFileError> {
        if fields.len() != 3 {
            return Err(MapFileError::FieldCount {
                line: line_no,
                kind: "grid",
                expected: "3",
                found: fields.len(),
            });
        }
        let mut rc = fields[1].splitn(2, '_');
        let row = parse_u32(line_no, "grid row", rc.next().unwrap_or(""))?;
        let col = parse_u32(line_no, "grid col", rc.next().unwrap_or(""))?;

        let parts: Vec<&str> = fields[2].split(':').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(MapFileError::FieldCount {
                line: line_no,
                kind: "grid corners",
                expected: "4",
                found: parts.len(),
            });
        }
        let sw_lat = parse_lat(line_no, parts[0])?;
        let sw_lon = parse_lon(line_no, parts[1])?;
        let ne_lat = parse_lat(line_no, parts[2])?;
        let ne_lon = parse_lon(line_no, parts[3])?;
        self.shapes.grids.push(Grid::new(
            Bounds::from_corners(sw_lat, sw_lon, ne_lat, ne_lon),
            row,
            col,
        ));
        Ok(())
    }

    fn intern_vertex(
        &mut self,
        line_no: usize,
        uid: u64,
        lat: f64,
        lon: f64,
    ) -> crate::edge::VertexId {
        let (id, fresh) = self.shapes.network.intern(uid, lat, lon);
        if !fresh {
            let stored = self.shapes.network.vertex(id);
            if stored.lat != lat || stored.lon != lon {
                warn!(
                    line = line_no,
                    uid,
                    "vertex re-specified with a different position; keeping the first"
                );
            }
        }
        id
    }
}

fn parse_u64(line: usize, field: &'static str, value: &str) -> Result<u64, MapFileError> {
    value.trim().parse().map_err(|_| MapFileError::InvalidField {
        line,
        field,
        value: value.to_string(),
    })
}

fn parse_u32(line: usize, field: &'static str, value: &str) -> Result<u32, MapFileError> {
    value.trim().parse().map_err(|_| MapFileError::InvalidField {
        line,
        field,
        value: value.to_string(),
    })
}

fn parse_f64(line: usize, field: &'static str, value: &str) -> Result<f64, MapFileError> {
    value.trim().parse().map_err(|_| MapFileError::InvalidField {
        line,
        field,
        value: value.to_string(),
    })
}

fn parse_lat(line: usize, value: &str) -> Result<f64, MapFileError> {
    let lat = parse_f64(line, "latitude", value)?;
    if !LAT_RANGE.contains(&lat) {
        return Err(MapFileError::OutOfRange {
            line,
            field: "latitude",
            value: lat,
        });
    }
    Ok(lat)
}

fn parse_lon(line: usize, value: &str) -> Result<f64, MapFileError> {
    let lon = parse_f64(line, "longitude", value)?;
    if !LON_RANGE.contains(&lon) {
        return Err(MapFileError::OutOfRange {
            line,
            field: "longitude",
            value: lon,
        });
    }
    Ok(lon)
}

fn parse_vertex(line: usize, value: &str) -> Result<(u64, f64, f64), MapFileError> {
    let parts: Vec<&str> = value.split(';').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(MapFileError::FieldCount {
            line,
            kind: "vertex",
            expected: "3",
            found: parts.len(),
        });
    }
    Ok((
        parse_u64(line, "vertex uid", parts[0])?,
        parse_lat(line, parts[1])?,
        parse_lon(line, parts[2])?,
    ))
}

/// Serialize a [`ShapeSet`] back to the CSV shape format.
#[derive(Debug)]
pub struct CsvShapeWriter {
    path: PathBuf,
}

impl CsvShapeWriter {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn write(&self, shapes: &ShapeSet) -> Result<(), MapFileError> {
        let file = File::create(&self.path).map_err(|source| MapFileError::Io {
            path: self.path.clone(),
            source,
        })?;
        let mut out = BufWriter::new(file);
        let io_err = |source| MapFileError::Io {
            path: self.path.clone(),
            source,
        };

        for edge in &shapes.edges {
            let (v1, v2) = edge.endpoints(&shapes.network);
            let mut attrs = format!("way_type={}", edge.road_class().name());
            if let Some(way_id) = edge.way_id() {
                attrs.push_str(&format!(":way_id={way_id}"));
            }
            writeln!(
                out,
                "edge,{},{};{};{}:{};{};{},{}",
                edge.uid(),
                v1.uid,
                v1.lat,
                v1.lon,
                v2.uid,
                v2.lat,
                v2.lon,
                attrs
            )
            .map_err(io_err)?;
        }
        for circle in &shapes.circles {
            writeln!(
                out,
                "circle,{},{}:{}:{}",
                circle.center.uid, circle.center.lat, circle.center.lon, circle.radius
            )
            .map_err(io_err)?;
        }
        for grid in &shapes.grids {
            writeln!(
                out,
                "grid,{}_{},{}:{}:{}:{}",
                grid.row,
                grid.col,
                grid.bounds.sw.lat,
                grid.bounds.sw.lon,
                grid.bounds.ne.lat,
                grid.bounds.ne.lon
            )
            .map_err(io_err)?;
        }
        out.flush().map_err(io_err)
    }
}
