//! Tiling scheme: the deterministic mapping between geographic extents and
//! grid cells, and from grid cells back to footprint polygons.
//!
//! A scheme is defined by a tile origin (top-left corner of the grid), a
//! tile size in pixels, and one resolution (map units per pixel) per zoom
//! level. Rows grow southward from the origin, columns grow eastward.
//!
//! # Ordering
//!
//! `cells_covering` walks the grid in row-major order: ascending row, then
//! ascending column within each row. The order is stable across calls for
//! the same inputs and is the iteration order used by the download pipeline.
//!
//! # Failure policy
//!
//! Geometry never errors: an out-of-range level, a degenerate extent, a
//! spatial-reference mismatch, or an extent entirely outside the grid all
//! yield an empty cell list.

use tracing::warn;

use crate::coord::{CellId, Extent, Polygon, WEB_MERCATOR_WKID};

/// Half the Web Mercator world width in meters.
const WEB_MERCATOR_HALF_WORLD: f64 = 20_037_508.342_787;

/// Number of zoom levels in the standard Web Mercator scheme.
const WEB_MERCATOR_LEVELS: usize = 20;

/// A tile grid definition for one map service.
#[derive(Debug, Clone)]
pub struct TilingScheme {
    /// Top-left corner of the grid in map units.
    origin: (f64, f64),
    /// Tile edge length in pixels.
    tile_size: u32,
    /// Map units per pixel, one entry per zoom level, finest last.
    resolutions: Vec<f64>,
    /// Full extent of the grid; cells are clamped to it.
    full_extent: Extent,
    /// Spatial reference the grid is defined in.
    wkid: u32,
}

impl TilingScheme {
    /// Creates a scheme from an explicit grid definition.
    pub fn new(
        origin: (f64, f64),
        tile_size: u32,
        resolutions: Vec<f64>,
        full_extent: Extent,
        wkid: u32,
    ) -> Self {
        Self {
            origin,
            tile_size,
            resolutions,
            full_extent,
            wkid,
        }
    }

    /// The standard 20-level Web Mercator grid (256px tiles), the scheme
    /// used by the common public tile services.
    pub fn web_mercator() -> Self {
        let mut resolutions = Vec::with_capacity(WEB_MERCATOR_LEVELS);
        // Level 0 is one 256px tile spanning the whole world width.
        let mut res = WEB_MERCATOR_HALF_WORLD * 2.0 / 256.0;
        for _ in 0..WEB_MERCATOR_LEVELS {
            resolutions.push(res);
            res /= 2.0;
        }
        Self {
            origin: (-WEB_MERCATOR_HALF_WORLD, WEB_MERCATOR_HALF_WORLD),
            tile_size: 256,
            resolutions,
            full_extent: Extent::new(
                -WEB_MERCATOR_HALF_WORLD,
                -WEB_MERCATOR_HALF_WORLD,
                WEB_MERCATOR_HALF_WORLD,
                WEB_MERCATOR_HALF_WORLD,
                WEB_MERCATOR_WKID,
            ),
            wkid: WEB_MERCATOR_WKID,
        }
    }

    /// Highest valid zoom level of this scheme.
    pub fn max_level(&self) -> u8 {
        self.resolutions.len().saturating_sub(1) as u8
    }

    /// Spatial reference the grid is defined in.
    pub fn wkid(&self) -> u32 {
        self.wkid
    }

    /// Map-unit span of one tile edge at `level`, or `None` for an
    /// out-of-range level.
    fn cell_span(&self, level: u8) -> Option<f64> {
        self.resolutions
            .get(level as usize)
            .map(|res| res * self.tile_size as f64)
    }

    /// All grid cells whose footprint intersects `extent` at `level`, in
    /// row-major order (ascending row, then ascending column).
    ///
    /// Deterministic: the same `(extent, level)` always yields the same
    /// ordered sequence. Returns an empty vector for an out-of-range level,
    /// a degenerate extent, a spatial-reference mismatch, or an extent that
    /// does not overlap the grid.
    pub fn cells_covering(&self, extent: &Extent, level: u8) -> Vec<CellId> {
        let Some(span) = self.cell_span(level) else {
            return Vec::new();
        };
        if extent.is_degenerate() {
            return Vec::new();
        }
        if extent.wkid != self.wkid {
            warn!(
                extent_wkid = extent.wkid,
                scheme_wkid = self.wkid,
                "Extent spatial reference does not match tiling scheme"
            );
            return Vec::new();
        }
        if !extent.intersects(&self.full_extent) {
            return Vec::new();
        }

        let (x0, y0) = self.origin;
        let max_index = {
            let width = self.full_extent.xmax - self.full_extent.xmin;
            ((width / span).ceil() as i64 - 1).max(0)
        };

        let clamp = |v: i64| v.clamp(0, max_index) as u32;
        let col_min = clamp(((extent.xmin - x0) / span).floor() as i64);
        let col_max = clamp(((extent.xmax - x0) / span).floor() as i64);
        let row_min = clamp(((y0 - extent.ymax) / span).floor() as i64);
        let row_max = clamp(((y0 - extent.ymin) / span).floor() as i64);

        // Index ranges at deep levels exceed u32 products; size in usize.
        let rows = (row_max - row_min) as usize + 1;
        let cols = (col_max - col_min) as usize + 1;
        let mut cells = Vec::with_capacity(rows.saturating_mul(cols));
        for row in row_min..=row_max {
            for col in col_min..=col_max {
                cells.push(CellId { col, row });
            }
        }
        cells
    }

    /// Footprint polygon of `cell` at `level`: a closed, axis-aligned
    /// rectangle in map units. Exact inverse of the grid walk performed by
    /// [`cells_covering`].
    ///
    /// Returns `None` only for an out-of-range level.
    pub fn polygon_for(&self, cell: CellId, level: u8) -> Option<Polygon> {
        let span = self.cell_span(level)?;
        let (x0, y0) = self.origin;
        let xmin = x0 + cell.col as f64 * span;
        let ymax = y0 - cell.row as f64 * span;
        let xmax = xmin + span;
        let ymin = ymax - span;
        Some(Polygon {
            ring: vec![
                (xmin, ymax),
                (xmax, ymax),
                (xmax, ymin),
                (xmin, ymin),
                (xmin, ymax),
            ],
            wkid: self.wkid,
        })
    }
}
