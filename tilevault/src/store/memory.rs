//! In-memory tile store provider backed by dashmap.
//!
//! The default in-process backend and the workhorse of the test suite.
//! Lock-free concurrent reads suit the single-writer/many-readers model:
//! the active download campaign writes while offline lookups read.

use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;

use super::{BoxFuture, Flow, StoreError, StoredTile, TileStore};
use crate::identity::TileIdentity;

/// In-memory tile store.
///
/// Enforces the initialize-before-use contract so callers exercise the same
/// lifecycle they would against a durable backend.
#[derive(Default)]
pub struct MemoryStore {
    records: DashMap<String, String>,
    initialized: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_initialized(&self) -> Result<(), StoreError> {
        if self.initialized.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StoreError::NotInitialized)
        }
    }
}

impl TileStore for MemoryStore {
    fn initialize(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            self.initialized.store(true, Ordering::Release);
            Ok(())
        })
    }

    fn add(&self, tile: StoredTile) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            self.check_initialized()?;
            self.records
                .insert(tile.identity.as_str().to_string(), tile.encoded_image);
            Ok(())
        })
    }

    fn get<'a>(
        &'a self,
        identity: &'a TileIdentity,
    ) -> BoxFuture<'a, Result<Option<StoredTile>, StoreError>> {
        Box::pin(async move {
            self.check_initialized()?;
            Ok(self.records.get(identity.as_str()).map(|entry| StoredTile {
                identity: identity.clone(),
                encoded_image: entry.value().clone(),
            }))
        })
    }

    fn delete_all(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            self.check_initialized()?;
            self.records.clear();
            Ok(())
        })
    }

    fn size_bytes(&self) -> BoxFuture<'_, Result<u64, StoreError>> {
        Box::pin(async move {
            self.check_initialized()?;
            let total = self
                .records
                .iter()
                .map(|entry| (entry.key().len() + entry.value().len()) as u64)
                .sum();
            Ok(total)
        })
    }

    fn enumerate<'a>(
        &'a self,
        visit: &'a mut (dyn FnMut(&TileIdentity) -> Flow + Send),
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            self.check_initialized()?;
            for entry in self.records.iter() {
                let identity = TileIdentity::from_canonical(entry.key().clone());
                if visit(&identity) == Flow::Stop {
                    break;
                }
            }
            Ok(())
        })
    }
}
