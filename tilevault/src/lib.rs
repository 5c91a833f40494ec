//! TileVault - offline cache for raster map tiles
//!
//! Given a geographic extent and a range of zoom levels, TileVault
//! enumerates the tile grid cells covering the extent, downloads each
//! tile's image sequentially, encodes it for text-safe storage and persists
//! it in a key-value store keyed by tile identity. When the wrapped layer is
//! offline, lookups against the store substitute for network fetches; when
//! online, fetches bypass the store.
//!
//! The entry point is [`offline::OfflineTileLayer`], a composition wrapper
//! around any [`source::TileSource`].

pub mod codec;
pub mod coord;
pub mod download;
pub mod fetch;
pub mod identity;
pub mod offline;
pub mod scheme;
pub mod source;
pub mod store;

pub use coord::{CellId, Extent, LevelEstimation, Polygon, TileCoord};
pub use download::{plan_download, BatchOutcome, DownloadBatch, Downloader, DEFAULT_TILE_CAP};
pub use fetch::{FetchError, HttpClient, RelayClient, ReqwestClient};
pub use identity::{IdentityError, TileIdentity};
pub use offline::{CoverageSkip, OfflineTileLayer, RefreshListener, TileRoute};
pub use scheme::TilingScheme;
pub use source::{TileSource, UrlTemplateSource};
pub use store::{FileStore, Flow, MemoryStore, StoreError, StoredTile, TileStore};
