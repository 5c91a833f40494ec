//! Offline-aware tile layer: the caller-facing surface of the cache.
//!
//! [`OfflineTileLayer`] attaches offline behavior to a tile source by
//! composition: it wraps anything implementing [`TileSource`] together with
//! a store, a tiling scheme and a network client, instead of mutating a
//! shared layer type. The map-rendering collaborator keeps its own protocol
//! for swapping resolved tiles into the view; this layer's obligation ends
//! at delivering `(found, tile)` from [`resolve`](OfflineTileLayer::resolve).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::coord::{Extent, LevelEstimation, Polygon, TileCoord};
use crate::download::{plan_download, BatchOutcome, DownloadError, Downloader, DEFAULT_TILE_CAP};
use crate::fetch::HttpClient;
use crate::identity::{IdentityError, TileIdentity};
use crate::scheme::TilingScheme;
use crate::source::TileSource;
use crate::store::{Flow, StoreError, StoredTile, TileStore};

/// Fixed per-tile size approximation in bytes, used for level estimates.
///
/// An approximation, not a measurement; typical compressed raster tiles
/// land in this neighborhood.
pub const ESTIMATED_TILE_SIZE_BYTES: u64 = 14_000;

/// Where a tile request should be served from, given the layer's mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileRoute {
    /// Online: fetch this URL from the network, bypassing the store.
    Network(String),
    /// Offline: resolve this identity against the store.
    Cache(TileIdentity),
}

/// Why an identity was skipped during coverage reconstruction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoverageSkip {
    /// The identity could not be parsed back into a tile coordinate.
    #[error(transparent)]
    Parse(#[from] IdentityError),

    /// The parsed level is outside the tiling scheme's range.
    #[error("level {0} is outside the tiling scheme")]
    LevelOutOfRange(u8),
}

/// Collaborator hook fired when the layer returns to online mode, so the
/// map-rendering widget can refresh itself.
pub trait RefreshListener: Send + Sync {
    fn refresh(&self);
}

/// Offline capability wrapped around one tile source.
pub struct OfflineTileLayer<S: TileSource> {
    source: S,
    scheme: TilingScheme,
    store: Arc<dyn TileStore>,
    downloader: Downloader,
    online: AtomicBool,
    refresh: Option<Arc<dyn RefreshListener>>,
    tile_cap: usize,
}

impl<S: TileSource> OfflineTileLayer<S> {
    /// Wraps `source` with offline behavior. The layer starts online.
    pub fn new(
        source: S,
        scheme: TilingScheme,
        client: Arc<dyn HttpClient>,
        store: Arc<dyn TileStore>,
    ) -> Self {
        Self {
            source,
            scheme,
            downloader: Downloader::new(client, store.clone()),
            store,
            online: AtomicBool::new(true),
            refresh: None,
            tile_cap: DEFAULT_TILE_CAP,
        }
    }

    /// Registers the map-rendering collaborator's refresh hook.
    pub fn with_refresh_listener(mut self, listener: Arc<dyn RefreshListener>) -> Self {
        self.refresh = Some(listener);
        self
    }

    /// Overrides the plan cap (default [`DEFAULT_TILE_CAP`]).
    pub fn with_tile_cap(mut self, cap: usize) -> Self {
        self.tile_cap = cap;
        self
    }

    /// Initializes the underlying store. Must succeed once before any other
    /// store-touching operation; on failure the offline capability is
    /// unusable.
    pub async fn initialize(&self) -> Result<(), StoreError> {
        self.store.initialize().await
    }

    /// The wrapped tile source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// The layer's tiling scheme.
    pub fn scheme(&self) -> &TilingScheme {
        &self.scheme
    }

    /// True when tile requests go to the network.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    /// Switches tile routing to the store.
    pub fn go_offline(&self) {
        self.online.store(false, Ordering::Release);
        info!("Layer switched offline");
    }

    /// Switches tile routing back to the network and notifies the refresh
    /// listener so the map view reloads its tiles.
    pub fn go_online(&self) {
        self.online.store(true, Ordering::Release);
        info!("Layer switched online");
        if let Some(listener) = &self.refresh {
            listener.refresh();
        }
    }

    /// Routes one tile request according to the current mode: a network URL
    /// when online, a store identity when offline.
    pub fn route(&self, level: u8, row: u32, col: u32) -> TileRoute {
        if self.is_online() {
            TileRoute::Network(self.source.tile_url(level, row, col))
        } else {
            TileRoute::Cache(self.source.tile_identity(level, row, col))
        }
    }

    /// Enumerates the capped download plan for `extent` across
    /// `min_level..=max_level`. See [`plan_download`].
    pub fn plan(&self, min_level: u8, max_level: u8, extent: &Extent) -> Vec<TileCoord> {
        plan_download(&self.scheme, min_level, max_level, extent, self.tile_cap)
    }

    /// Plans and runs one download campaign: every covered tile is fetched,
    /// encoded and persisted sequentially. Progress, cancellation and
    /// completion semantics are those of [`Downloader::run`].
    pub async fn prepare_for_offline(
        &self,
        min_level: u8,
        max_level: u8,
        extent: &Extent,
        on_progress: impl FnMut(usize, usize) -> bool,
        on_finished: impl FnOnce(bool),
    ) -> Result<BatchOutcome, DownloadError> {
        let plan = self.plan(min_level, max_level, extent);
        debug!(tiles = plan.len(), "Starting offline preparation");
        self.downloader
            .run(&self.source, &plan, on_progress, on_finished)
            .await
    }

    /// Offline lookup: answers whether `identity` is cached and hands back
    /// the stored record. A miss is `Ok(None)`; how a caller presents an
    /// unresolved tile (placeholder, retry, blank) is its own concern.
    pub async fn resolve(&self, identity: &TileIdentity) -> Result<Option<StoredTile>, StoreError> {
        self.store.get(identity).await
    }

    /// Rebuilds the geographic footprints of every cached tile.
    ///
    /// Drives the store's identity enumeration, parses each identity back
    /// into a tile coordinate and maps it through the tiling scheme. The
    /// result is finite and the operation is restartable: each call
    /// re-enumerates the store. Malformed identities are skipped and
    /// reported through `on_skip`, never fatal to the enumeration.
    pub async fn reconstruct_coverage(
        &self,
        mut on_skip: impl FnMut(&TileIdentity, CoverageSkip) + Send,
    ) -> Result<Vec<Polygon>, StoreError> {
        let mut polygons = Vec::new();
        let scheme = &self.scheme;
        let mut visit = |identity: &TileIdentity| {
            let coord = match identity.parse_coord() {
                Ok(coord) => coord,
                Err(e) => {
                    warn!(identity = %identity, error = %e, "Skipping unparseable identity");
                    on_skip(identity, CoverageSkip::Parse(e));
                    return Flow::Continue;
                }
            };
            match scheme.polygon_for(coord.cell(), coord.level) {
                Some(polygon) => polygons.push(polygon),
                None => {
                    warn!(identity = %identity, level = coord.level, "Skipping out-of-range level");
                    on_skip(identity, CoverageSkip::LevelOutOfRange(coord.level));
                }
            }
            Flow::Continue
        };
        self.store.enumerate(&mut visit).await?;
        Ok(polygons)
    }

    /// Fixed per-tile size approximation. See [`ESTIMATED_TILE_SIZE_BYTES`].
    pub fn estimate_tile_size(&self) -> u64 {
        ESTIMATED_TILE_SIZE_BYTES
    }

    /// Estimates the tile count and storage cost of caching `extent` at one
    /// level. Derived on demand; no sampling of actual tile sizes.
    pub fn estimate_level(&self, extent: &Extent, level: u8) -> LevelEstimation {
        let tile_count = self.scheme.cells_covering(extent, level).len();
        LevelEstimation {
            level,
            tile_count,
            size_bytes: tile_count as u64 * self.estimate_tile_size(),
        }
    }

    /// Removes every cached tile.
    pub async fn delete_all(&self) -> Result<(), StoreError> {
        self.store.delete_all().await
    }

    /// Aggregate storage footprint of the cache in bytes.
    pub async fn size_bytes(&self) -> Result<u64, StoreError> {
        self.store.size_bytes().await
    }
}
