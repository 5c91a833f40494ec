//! Download campaign: plan enumeration and the sequential fetch pipeline.
//!
//! A campaign plans a bounded, ordered list of tile coordinates for an
//! extent and level range, then walks it strictly sequentially: one tile in
//! flight, fetched bytes encoded and persisted before the next coordinate is
//! touched. The sequencing is a design decision, not an accident of the
//! implementation — tiles land in the store in exactly plan order.
//!
//! # Cancellation
//!
//! Cooperative, checked once per tile boundary. The progress callback's
//! return value is the cancellation signal; a request takes effect after the
//! in-flight tile completes, and already-stored tiles are never rolled back.
//!
//! # Failure
//!
//! A single fetch or store failure aborts the entire remaining plan and the
//! batch finishes as cancelled. There is no retry and no skip-and-continue;
//! callers re-plan and re-run from scratch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::coord::{Extent, TileCoord};
use crate::fetch::HttpClient;
use crate::scheme::TilingScheme;
use crate::source::TileSource;
use crate::store::{StoredTile, TileStore};

/// Default cap on the number of coordinates in one plan.
pub const DEFAULT_TILE_CAP: usize = 5000;

/// Errors raised when starting a download campaign.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DownloadError {
    /// Another campaign is already running against this store.
    #[error("a download batch is already in progress for this store")]
    BatchInProgress,
}

/// Result summary of a finished batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Number of tiles fetched, encoded and persisted.
    pub persisted: usize,
    /// True if the batch ended early: caller cancellation or a tile failure.
    pub cancelled: bool,
}

/// Enumerates the tile coordinates to cache for `extent` across
/// `min_level..=max_level`, in level order then row-major grid order.
///
/// The plan is capped: after a level's cells are appended, if the
/// accumulated count exceeds `cap` and that level is not the final one,
/// enumeration stops. Levels are never split, so the plan may exceed `cap`
/// by part of one level but never contains coordinates from a level past
/// the one where the cap was crossed. Truncation is a policy, not an error:
/// the result is always a valid, partial plan.
pub fn plan_download(
    scheme: &TilingScheme,
    min_level: u8,
    max_level: u8,
    extent: &Extent,
    cap: usize,
) -> Vec<TileCoord> {
    let mut plan = Vec::new();
    for level in min_level..=max_level {
        for cell in scheme.cells_covering(extent, level) {
            plan.push(TileCoord {
                level,
                row: cell.row,
                col: cell.col,
            });
        }
        if plan.len() > cap && level != max_level {
            info!(
                level,
                planned = plan.len(),
                cap,
                "Tile cap exceeded, truncating plan before deeper levels"
            );
            break;
        }
    }
    debug!(tiles = plan.len(), min_level, max_level, "Download plan ready");
    plan
}

/// Explicit iteration state of one campaign.
///
/// Created per run and discarded when the run finishes or is cancelled;
/// never persisted and never shared between campaigns.
#[derive(Debug)]
pub struct DownloadBatch {
    plan: Vec<TileCoord>,
    cursor: usize,
    cancelled: bool,
}

impl DownloadBatch {
    /// Wraps a plan in a fresh batch with the cursor at the start.
    pub fn new(plan: Vec<TileCoord>) -> Self {
        Self {
            plan,
            cursor: 0,
            cancelled: false,
        }
    }

    /// Total number of coordinates in the plan.
    pub fn total(&self) -> usize {
        self.plan.len()
    }

    /// Index of the next coordinate to process.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The coordinate at the cursor, if any remain and the batch is not
    /// cancelled.
    pub fn current(&self) -> Option<TileCoord> {
        if self.cancelled {
            return None;
        }
        self.plan.get(self.cursor).copied()
    }

    /// Moves the cursor past the current coordinate.
    pub fn advance(&mut self) {
        if self.cursor < self.plan.len() {
            self.cursor += 1;
        }
    }

    /// Marks the batch as ended early.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// True if the batch was cancelled or aborted.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

/// Sequential tile download pipeline.
///
/// Owns the network client and the store; one instance guards one store,
/// rejecting a second concurrent [`run`](Downloader::run) while a batch is
/// active.
pub struct Downloader {
    client: Arc<dyn HttpClient>,
    store: Arc<dyn TileStore>,
    active: AtomicBool,
}

impl Downloader {
    pub fn new(client: Arc<dyn HttpClient>, store: Arc<dyn TileStore>) -> Self {
        Self {
            client,
            store,
            active: AtomicBool::new(false),
        }
    }

    /// True while a batch is running.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Drives `plan` to completion, strictly sequentially.
    ///
    /// `on_progress(i, total)` fires before the fetch of coordinate `i`; a
    /// `true` return requests cancellation, honored after the in-flight tile
    /// is persisted. `on_finished(cancelled)` fires exactly once when the
    /// batch ends: `cancelled` is true for both caller cancellation and a
    /// tile failure, false for normal completion.
    ///
    /// Returns [`DownloadError::BatchInProgress`] without touching the plan
    /// if another run is active on this downloader.
    pub async fn run<S: TileSource>(
        &self,
        source: &S,
        plan: &[TileCoord],
        mut on_progress: impl FnMut(usize, usize) -> bool,
        on_finished: impl FnOnce(bool),
    ) -> Result<BatchOutcome, DownloadError> {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(DownloadError::BatchInProgress);
        }

        let outcome = self.run_batch(source, plan, &mut on_progress).await;
        self.active.store(false, Ordering::Release);

        info!(
            persisted = outcome.persisted,
            cancelled = outcome.cancelled,
            "Download batch finished"
        );
        on_finished(outcome.cancelled);
        Ok(outcome)
    }

    async fn run_batch<S: TileSource>(
        &self,
        source: &S,
        plan: &[TileCoord],
        on_progress: &mut impl FnMut(usize, usize) -> bool,
    ) -> BatchOutcome {
        let mut batch = DownloadBatch::new(plan.to_vec());
        let total = batch.total();
        let mut persisted = 0usize;

        while let Some(coord) = batch.current() {
            let cancel_requested = on_progress(batch.cursor(), total);

            let url = source.tile_url(coord.level, coord.row, coord.col);
            let identity = source.tile_identity(coord.level, coord.row, coord.col);

            let bytes = match self.client.get(&url).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(tile = %coord, error = %e, "Tile fetch failed, aborting batch");
                    batch.cancel();
                    break;
                }
            };

            let tile = StoredTile::from_bytes(identity, &bytes);
            if let Err(e) = self.store.add(tile).await {
                warn!(tile = %coord, error = %e, "Tile persist failed, aborting batch");
                batch.cancel();
                break;
            }

            persisted += 1;
            debug!(tile = %coord, bytes = bytes.len(), "Tile cached");
            batch.advance();

            if cancel_requested {
                debug!(tile = %coord, "Cancellation honored at tile boundary");
                batch.cancel();
            }
        }

        BatchOutcome {
            persisted,
            cancelled: batch.is_cancelled(),
        }
    }
}
