//! Core geometric types for the tile cache.
//!
//! These are the data-model building blocks shared by the tiling scheme,
//! the download pipeline, and coverage reconstruction: geographic extents,
//! grid cell addresses, tile coordinates, and cell footprint polygons.

use std::fmt;

/// Spatial reference identifier for Web Mercator (EPSG:3857).
pub const WEB_MERCATOR_WKID: u32 = 3857;

/// A geographic bounding box in map units of a given spatial reference.
///
/// Extents are immutable and supplied by the caller. A degenerate extent
/// (zero or negative area) is valid data but covers no grid cells.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
    /// Well-known spatial reference id (e.g. 3857 for Web Mercator).
    pub wkid: u32,
}

impl Extent {
    /// Creates a new extent in the given spatial reference.
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64, wkid: u32) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
            wkid,
        }
    }

    /// Returns true if this extent has zero or negative area.
    pub fn is_degenerate(&self) -> bool {
        self.xmax <= self.xmin || self.ymax <= self.ymin
    }

    /// Returns true if this extent and `other` overlap (shared edges count).
    pub fn intersects(&self, other: &Extent) -> bool {
        self.xmin <= other.xmax
            && self.xmax >= other.xmin
            && self.ymin <= other.ymax
            && self.ymax >= other.ymin
    }
}

/// Grid address of a single cell at one zoom level.
///
/// Cell ids are produced only by the tiling scheme; callers never construct
/// them from raw numbers except when replaying a parsed tile identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellId {
    /// Column index, increasing west to east.
    pub col: u32,
    /// Row index, increasing north to south.
    pub row: u32,
}

impl CellId {
    pub fn new(col: u32, row: u32) -> Self {
        Self { col, row }
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.col, self.row)
    }
}

/// The enumeration unit of the download pipeline: a cell address plus its
/// zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    /// Zoom level of the tile grid.
    pub level: u8,
    /// Row index, increasing north to south.
    pub row: u32,
    /// Column index, increasing west to east.
    pub col: u32,
}

impl TileCoord {
    pub fn new(level: u8, row: u32, col: u32) -> Self {
        Self { level, row, col }
    }

    /// The cell address of this tile within its level.
    pub fn cell(&self) -> CellId {
        CellId {
            col: self.col,
            row: self.row,
        }
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}/{}/{}", self.level, self.row, self.col)
    }
}

/// Closed ring of map-space vertices describing one cell footprint.
///
/// Only axis-aligned rectangles are ever produced by the tiling scheme, but
/// the ring representation matches what map-rendering collaborators consume.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    /// Ring vertices; first and last vertex are equal.
    pub ring: Vec<(f64, f64)>,
    /// Spatial reference of the vertices.
    pub wkid: u32,
}

impl Polygon {
    /// Bounding box of the ring.
    pub fn bounds(&self) -> Extent {
        if self.ring.is_empty() {
            return Extent::new(0.0, 0.0, 0.0, 0.0, self.wkid);
        }
        let mut xmin = f64::INFINITY;
        let mut ymin = f64::INFINITY;
        let mut xmax = f64::NEG_INFINITY;
        let mut ymax = f64::NEG_INFINITY;
        for &(x, y) in &self.ring {
            xmin = xmin.min(x);
            ymin = ymin.min(y);
            xmax = xmax.max(x);
            ymax = ymax.max(y);
        }
        Extent::new(xmin, ymin, xmax, ymax, self.wkid)
    }
}

/// Derived, read-only estimate of the storage cost of caching one level.
///
/// Recomputed on demand; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelEstimation {
    /// The level the estimate applies to.
    pub level: u8,
    /// Number of tiles the extent covers at this level.
    pub tile_count: usize,
    /// Estimated total size in bytes (tile count times a fixed per-tile
    /// approximation).
    pub size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extent_degenerate() {
        let zero = Extent::new(1.0, 1.0, 1.0, 1.0, WEB_MERCATOR_WKID);
        assert!(zero.is_degenerate());

        let inverted = Extent::new(2.0, 0.0, 1.0, 5.0, WEB_MERCATOR_WKID);
        assert!(inverted.is_degenerate());

        let normal = Extent::new(0.0, 0.0, 1.0, 1.0, WEB_MERCATOR_WKID);
        assert!(!normal.is_degenerate());
    }

    #[test]
    fn test_extent_intersects() {
        let a = Extent::new(0.0, 0.0, 10.0, 10.0, WEB_MERCATOR_WKID);
        let b = Extent::new(5.0, 5.0, 15.0, 15.0, WEB_MERCATOR_WKID);
        let c = Extent::new(20.0, 20.0, 30.0, 30.0, WEB_MERCATOR_WKID);

        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&c));

        // A shared edge counts as intersection
        let d = Extent::new(10.0, 0.0, 20.0, 10.0, WEB_MERCATOR_WKID);
        assert!(a.intersects(&d));
    }

    #[test]
    fn test_polygon_bounds() {
        let poly = Polygon {
            ring: vec![(0.0, 0.0), (4.0, 0.0), (4.0, -3.0), (0.0, -3.0), (0.0, 0.0)],
            wkid: WEB_MERCATOR_WKID,
        };
        let bounds = poly.bounds();
        assert_eq!(bounds.xmin, 0.0);
        assert_eq!(bounds.ymin, -3.0);
        assert_eq!(bounds.xmax, 4.0);
        assert_eq!(bounds.ymax, 0.0);
    }

    #[test]
    fn test_polygon_bounds_empty_ring() {
        let poly = Polygon {
            ring: vec![],
            wkid: WEB_MERCATOR_WKID,
        };
        assert!(poly.bounds().is_degenerate());
    }

    #[test]
    fn test_tile_coord_cell() {
        let coord = TileCoord::new(5, 3, 7);
        assert_eq!(coord.cell(), CellId::new(7, 3));
    }

    #[test]
    fn test_tile_coord_display() {
        let coord = TileCoord::new(12, 1500, 2700);
        assert_eq!(coord.to_string(), "L12/1500/2700");
    }
}
