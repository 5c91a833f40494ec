//! Tile store: the key-value persistence contract for cached tiles.
//!
//! The store holds one record per tile identity: the canonical identity
//! string and the base64-encoded image. All operations are asynchronous and
//! the trait is dyn-compatible (`Pin<Box<dyn Future>>` returns) so layers
//! can hold `Arc<dyn TileStore>` and swap backends freely.
//!
//! The design assumes a single writer: only one active download campaign
//! mutates a store at a time, while offline lookups read concurrently. The
//! guard enforcing this lives in the download pipeline, not here.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::{self, CodecError};
use crate::identity::TileIdentity;

pub use crate::fetch::BoxFuture;

/// Visitor verdict during identity enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep streaming identities.
    Continue,
    /// Stop the enumeration early; not an error.
    Stop,
}

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying storage mechanism is absent or unusable. Fatal to the
    /// whole offline capability; surfaced once at initialization.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// An operation was attempted before `initialize` succeeded.
    #[error("store used before initialization")]
    NotInitialized,

    /// An individual read or write failed.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted record could not be decoded.
    #[error("corrupt record at {path}: {message}")]
    Corrupt { path: String, message: String },
}

/// One persisted tile record.
///
/// Written once per identity and overwritten on re-download; there is no
/// versioning. `delete_all` is the only migration path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTile {
    /// Canonical storage key (fetch URL, query stripped).
    pub identity: TileIdentity,
    /// Base64-encoded tile image.
    pub encoded_image: String,
}

impl StoredTile {
    /// Builds a record from raw image bytes, encoding them for storage.
    pub fn from_bytes(identity: TileIdentity, raw: &[u8]) -> Self {
        Self {
            identity,
            encoded_image: codec::encode(raw),
        }
    }

    /// Decodes the stored image back into raw bytes.
    pub fn image_bytes(&self) -> Result<Vec<u8>, CodecError> {
        codec::decode(&self.encoded_image)
    }

    /// Approximate footprint of this record in bytes.
    pub fn record_size(&self) -> u64 {
        (self.identity.as_str().len() + self.encoded_image.len()) as u64
    }
}

/// Key-value persistence contract for cached tiles.
///
/// `initialize` must be called once before any other operation; a store
/// whose backend is unavailable fails initialization with a descriptive
/// reason and must not be used further.
pub trait TileStore: Send + Sync {
    /// Prepares the backend. Must be called once before any other operation.
    fn initialize(&self) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Upserts a record by identity.
    fn add(&self, tile: StoredTile) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Looks up a record. A missing identity is `Ok(None)`, never an error.
    fn get<'a>(
        &'a self,
        identity: &'a TileIdentity,
    ) -> BoxFuture<'a, Result<Option<StoredTile>, StoreError>>;

    /// Removes every record.
    fn delete_all(&self) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Aggregate storage footprint in bytes.
    fn size_bytes(&self) -> BoxFuture<'_, Result<u64, StoreError>>;

    /// Streams every stored identity to `visit`, one at a time, until the
    /// visitor returns [`Flow::Stop`] or the records are exhausted.
    ///
    /// Only identities are streamed, never image payloads; this is the
    /// coverage-reconstruction path, not a bulk read.
    fn enumerate<'a>(
        &'a self,
        visit: &'a mut (dyn FnMut(&TileIdentity) -> Flow + Send),
    ) -> BoxFuture<'a, Result<(), StoreError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_tile_from_bytes_round_trip() {
        let identity = TileIdentity::from_url("https://tiles.example.com/svc/5/7/3");
        let raw = vec![0x89, 0x50, 0x4E, 0x47, 0x00, 0xFF];
        let tile = StoredTile::from_bytes(identity.clone(), &raw);

        assert_eq!(tile.identity, identity);
        assert_eq!(tile.image_bytes().unwrap(), raw);
    }

    #[test]
    fn test_record_size_counts_key_and_payload() {
        let identity = TileIdentity::from_canonical("abc".to_string());
        let tile = StoredTile {
            identity,
            encoded_image: "0123456789".to_string(),
        };
        assert_eq!(tile.record_size(), 13);
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError::Unavailable("no database support".to_string());
        assert!(err.to_string().contains("no database support"));
        assert!(StoreError::NotInitialized.to_string().contains("initialization"));
    }
}
