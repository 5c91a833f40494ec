//! File-backed tile store provider.
//!
//! One JSON record per identity under a root directory. Filenames are the
//! SHA-256 digest of the identity string, so arbitrary URLs map to safe,
//! fixed-length names; the identity itself is stored inside the record and
//! recovered during enumeration.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::warn;

use super::{BoxFuture, Flow, StoreError, StoredTile, TileStore};
use crate::identity::TileIdentity;

/// Extension used for record files.
const RECORD_EXT: &str = "json";

/// Durable tile store writing one record file per identity.
pub struct FileStore {
    root: PathBuf,
    initialized: AtomicBool,
}

impl FileStore {
    /// Creates a store rooted at `root`. The directory is created by
    /// [`TileStore::initialize`], not here.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            initialized: AtomicBool::new(false),
        }
    }

    /// Root directory holding the record files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn check_initialized(&self) -> Result<(), StoreError> {
        if self.initialized.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StoreError::NotInitialized)
        }
    }

    fn record_path(&self, identity: &TileIdentity) -> PathBuf {
        let digest = Sha256::digest(identity.as_str().as_bytes());
        self.root
            .join(format!("{:x}", digest))
            .with_extension(RECORD_EXT)
    }

    fn is_record(path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext == RECORD_EXT)
    }

    async fn read_record(path: &Path) -> Result<StoredTile, StoreError> {
        let bytes = fs::read(path).await?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

impl TileStore for FileStore {
    fn initialize(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            fs::create_dir_all(&self.root).await.map_err(|e| {
                StoreError::Unavailable(format!(
                    "cannot create store directory {}: {}",
                    self.root.display(),
                    e
                ))
            })?;
            self.initialized.store(true, Ordering::Release);
            Ok(())
        })
    }

    fn add(&self, tile: StoredTile) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            self.check_initialized()?;
            let path = self.record_path(&tile.identity);
            let bytes = serde_json::to_vec(&tile).map_err(|e| StoreError::Corrupt {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            fs::write(&path, bytes).await?;
            Ok(())
        })
    }

    fn get<'a>(
        &'a self,
        identity: &'a TileIdentity,
    ) -> BoxFuture<'a, Result<Option<StoredTile>, StoreError>> {
        Box::pin(async move {
            self.check_initialized()?;
            let path = self.record_path(identity);
            match fs::try_exists(&path).await {
                Ok(true) => Ok(Some(Self::read_record(&path).await?)),
                Ok(false) => Ok(None),
                Err(e) => Err(StoreError::Io(e)),
            }
        })
    }

    fn delete_all(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            self.check_initialized()?;
            let mut entries = fs::read_dir(&self.root).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if Self::is_record(&path) {
                    fs::remove_file(&path).await?;
                }
            }
            Ok(())
        })
    }

    fn size_bytes(&self) -> BoxFuture<'_, Result<u64, StoreError>> {
        Box::pin(async move {
            self.check_initialized()?;
            let mut total = 0u64;
            let mut entries = fs::read_dir(&self.root).await?;
            while let Some(entry) = entries.next_entry().await? {
                if Self::is_record(&entry.path()) {
                    total += entry.metadata().await?.len();
                }
            }
            Ok(total)
        })
    }

    fn enumerate<'a>(
        &'a self,
        visit: &'a mut (dyn FnMut(&TileIdentity) -> Flow + Send),
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            self.check_initialized()?;
            let mut entries = fs::read_dir(&self.root).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if !Self::is_record(&path) {
                    continue;
                }
                // A record that fails to parse is skipped, not fatal to the
                // enumeration.
                let tile = match Self::read_record(&path).await {
                    Ok(tile) => tile,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Skipping unreadable record");
                        continue;
                    }
                };
                if visit(&tile.identity) == Flow::Stop {
                    break;
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tile(url: &str, payload: &[u8]) -> StoredTile {
        StoredTile::from_bytes(TileIdentity::from_url(url), payload)
    }

    #[tokio::test]
    async fn test_initialize_creates_root() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("tiles");
        let store = FileStore::new(&root);
        store.initialize().await.unwrap();
        assert!(root.is_dir());
    }

    #[tokio::test]
    async fn test_use_before_initialize_fails() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        let result = store.size_bytes().await;
        assert!(matches!(result, Err(StoreError::NotInitialized)));
    }

    #[tokio::test]
    async fn test_add_get_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        store.initialize().await.unwrap();

        let stored = tile("https://t.example.com/5/7/3", &[0x00, 0xFF, 0x42]);
        store.add(stored.clone()).await.unwrap();

        let found = store.get(&stored.identity).await.unwrap().unwrap();
        assert_eq!(found, stored);
        assert_eq!(found.image_bytes().unwrap(), vec![0x00, 0xFF, 0x42]);
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        store.initialize().await.unwrap();

        let missing = TileIdentity::from_url("https://t.example.com/1/1/1");
        assert_eq!(store.get(&missing).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_upsert_keeps_single_record() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        store.initialize().await.unwrap();

        store.add(tile("https://t.example.com/5/7/3", b"old")).await.unwrap();
        store.add(tile("https://t.example.com/5/7/3", b"new")).await.unwrap();

        let mut count = 0;
        let mut visit = |_: &TileIdentity| {
            count += 1;
            Flow::Continue
        };
        store.enumerate(&mut visit).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_delete_all_then_size_zero() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        store.initialize().await.unwrap();

        store.add(tile("https://t.example.com/5/7/3", b"abc")).await.unwrap();
        store.add(tile("https://t.example.com/5/7/4", b"def")).await.unwrap();
        assert!(store.size_bytes().await.unwrap() > 0);

        store.delete_all().await.unwrap();
        assert_eq!(store.size_bytes().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_enumerate_recovers_identities() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        store.initialize().await.unwrap();

        let urls = [
            "https://t.example.com/5/7/3",
            "https://t.example.com/5/7/4",
        ];
        for url in urls {
            store.add(tile(url, b"x")).await.unwrap();
        }

        let mut seen = Vec::new();
        let mut visit = |identity: &TileIdentity| {
            seen.push(identity.as_str().to_string());
            Flow::Continue
        };
        store.enumerate(&mut visit).await.unwrap();

        seen.sort();
        assert_eq!(seen, urls.iter().map(|s| s.to_string()).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_enumerate_skips_corrupt_record() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        store.initialize().await.unwrap();

        store.add(tile("https://t.example.com/5/7/3", b"x")).await.unwrap();
        tokio::fs::write(dir.path().join("bogus.json"), b"not json")
            .await
            .unwrap();

        let mut count = 0;
        let mut visit = |_: &TileIdentity| {
            count += 1;
            Flow::Continue
        };
        store.enumerate(&mut visit).await.unwrap();
        assert_eq!(count, 1);
    }
}
