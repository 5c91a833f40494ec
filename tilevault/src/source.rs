//! Tile source seam: how a layer turns a grid address into a fetch URL.
//!
//! Offline behavior is attached by composition: [`OfflineTileLayer`] wraps
//! anything implementing [`TileSource`] instead of mutating a shared layer
//! type. The trait is the only thing the cache core needs from the map
//! service.
//!
//! [`OfflineTileLayer`]: crate::offline::OfflineTileLayer

use crate::identity::TileIdentity;

/// A capability that produces tile fetch URLs from grid addresses.
pub trait TileSource: Send + Sync {
    /// The fetch URL for the tile at `(level, row, col)`.
    ///
    /// May include a query string; the query is stripped when the URL is
    /// turned into a storage identity.
    fn tile_url(&self, level: u8, row: u32, col: u32) -> String;

    /// The canonical storage identity for the tile at `(level, row, col)`.
    fn tile_identity(&self, level: u8, row: u32, col: u32) -> TileIdentity {
        TileIdentity::from_url(&self.tile_url(level, row, col))
    }
}

/// Tile source backed by a fixed URL template.
///
/// Emits `{base}/{level}/{col}/{row}`, matching the positional segment order
/// that [`TileIdentity::parse_coord`] recovers.
#[derive(Debug, Clone)]
pub struct UrlTemplateSource {
    base_url: String,
}

impl UrlTemplateSource {
    /// Creates a source from a service base URL; a trailing slash is
    /// tolerated.
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url }
    }

    /// The service base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl TileSource for UrlTemplateSource {
    fn tile_url(&self, level: u8, row: u32, col: u32) -> String {
        format!("{}/{}/{}/{}", self.base_url, level, col, row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::TileCoord;

    #[test]
    fn test_template_url_segment_order() {
        let source = UrlTemplateSource::new("https://tiles.example.com/svc");
        assert_eq!(source.tile_url(7, 42, 13), "https://tiles.example.com/svc/7/13/42");
    }

    #[test]
    fn test_trailing_slash_tolerated() {
        let source = UrlTemplateSource::new("https://tiles.example.com/svc/");
        assert_eq!(source.tile_url(0, 0, 0), "https://tiles.example.com/svc/0/0/0");
    }

    #[test]
    fn test_identity_round_trips_to_coordinate() {
        let source = UrlTemplateSource::new("https://tiles.example.com/svc");
        let identity = source.tile_identity(9, 250, 481);
        assert_eq!(identity.parse_coord().unwrap(), TileCoord::new(9, 250, 481));
    }

    #[test]
    fn test_identity_injective_over_distinct_coords() {
        let source = UrlTemplateSource::new("https://tiles.example.com/svc");
        let a = source.tile_identity(5, 3, 7);
        let b = source.tile_identity(5, 7, 3);
        let c = source.tile_identity(6, 3, 7);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }
}
