//! Tile cache boundary: rendered terrain regions and their load queue.
//!
//! DESIGN
//! ======
//! Terrain is stored externally in square regions of `REGION_SIZE` blocks,
//! one palette index per block. Composition tasks only ever read through
//! `PixelSource`; a missing region is reported back as a `RegionKey` and
//! queued by the scheduler after fan-in, never from inside a task.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

/// Side length of a region, in blocks.
pub const REGION_SIZE: i64 = 256;

/// Number of bytes in a fully rendered region.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub const REGION_LEN: usize = (REGION_SIZE * REGION_SIZE) as usize;

/// Identifies one region of rendered terrain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionKey {
    pub world: String,
    pub x: i32,
    pub z: i32,
}

impl RegionKey {
    #[must_use]
    pub fn new(world: impl Into<String>, x: i32, z: i32) -> Self {
        Self { world: world.into(), x, z }
    }

    /// Region containing block `(block_x, block_z)`.
    #[must_use]
    pub fn containing(world: &str, block_x: i64, block_z: i64) -> Self {
        let (x, z) = region_coords(block_x, block_z);
        Self { world: world.to_owned(), x, z }
    }

    /// Offset of block `(block_x, block_z)` inside its region's byte tile.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn local_index(block_x: i64, block_z: i64) -> usize {
        let lx = block_x.rem_euclid(REGION_SIZE);
        let lz = block_z.rem_euclid(REGION_SIZE);
        (lz * REGION_SIZE + lx) as usize
    }
}

/// Region coordinates of a block, without allocating a key.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn region_coords(block_x: i64, block_z: i64) -> (i32, i32) {
    (block_x.div_euclid(REGION_SIZE) as i32, block_z.div_euclid(REGION_SIZE) as i32)
}

/// Outcome of a tile lookup.
#[derive(Debug, Clone)]
pub enum TileData {
    /// Rendered palette indices, row-major, `REGION_LEN` bytes.
    Ready(Arc<[u8]>),
    /// Not rendered yet; the caller should queue a load.
    NotReady,
}

/// Read-only view of rendered terrain, shared by every composition task.
pub trait PixelSource: Send + Sync {
    fn fetch(&self, key: &RegionKey) -> TileData;
}

/// Fire-and-forget request to render a region.
pub trait LoadQueue: Send + Sync {
    fn load(&self, key: RegionKey);
}

// =============================================================================
// IN-MEMORY CACHE
// =============================================================================

/// `PixelSource` backed by a map of rendered regions.
#[derive(Debug, Default)]
pub struct MemoryTileCache {
    tiles: RwLock<HashMap<RegionKey, Arc<[u8]>>>,
}

impl MemoryTileCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: RegionKey, bytes: impl Into<Arc<[u8]>>) {
        let mut tiles = self.tiles.write().unwrap_or_else(PoisonError::into_inner);
        tiles.insert(key, bytes.into());
    }

    pub fn remove(&self, key: &RegionKey) -> bool {
        let mut tiles = self.tiles.write().unwrap_or_else(PoisonError::into_inner);
        tiles.remove(key).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tiles.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PixelSource for MemoryTileCache {
    fn fetch(&self, key: &RegionKey) -> TileData {
        let tiles = self.tiles.read().unwrap_or_else(PoisonError::into_inner);
        match tiles.get(key) {
            Some(bytes) => TileData::Ready(Arc::clone(bytes)),
            None => TileData::NotReady,
        }
    }
}

// =============================================================================
// CHANNEL LOAD QUEUE
// =============================================================================

/// `LoadQueue` that forwards requests over a bounded channel to a loader task.
///
/// Uses `try_send`: a full or closed queue drops the request, and the region
/// is simply reported again on a later frame.
#[derive(Debug, Clone)]
pub struct ChannelLoadQueue {
    tx: mpsc::Sender<RegionKey>,
}

impl ChannelLoadQueue {
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<RegionKey>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl LoadQueue for ChannelLoadQueue {
    fn load(&self, key: RegionKey) {
        match self.tx.try_send(key) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(key)) => {
                warn!(world = %key.world, x = key.x, z = key.z, "region load queue full; dropping request");
            }
            Err(mpsc::error::TrySendError::Closed(key)) => {
                warn!(world = %key.world, x = key.x, z = key.z, "region load queue closed; dropping request");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn containing_handles_negative_blocks() {
        assert_eq!(RegionKey::containing("w", 0, 0), RegionKey::new("w", 0, 0));
        assert_eq!(RegionKey::containing("w", 255, 256), RegionKey::new("w", 0, 1));
        assert_eq!(RegionKey::containing("w", -1, -256), RegionKey::new("w", -1, -1));
        assert_eq!(RegionKey::containing("w", -257, 0), RegionKey::new("w", -2, 0));
    }

    #[test]
    fn local_index_wraps_into_tile() {
        assert_eq!(RegionKey::local_index(0, 0), 0);
        assert_eq!(RegionKey::local_index(1, 1), 257);
        assert_eq!(RegionKey::local_index(-1, -1), REGION_LEN - 1);
    }

    #[test]
    fn memory_cache_fetch_reports_not_ready_then_ready() {
        let cache = MemoryTileCache::new();
        let key = RegionKey::new("w", 3, -2);
        assert!(matches!(cache.fetch(&key), TileData::NotReady));

        cache.insert(key.clone(), vec![7_u8; REGION_LEN]);
        assert_eq!(cache.len(), 1);
        assert!(matches!(cache.fetch(&key), TileData::Ready(ref bytes) if bytes[10] == 7));

        assert!(cache.remove(&key));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn channel_queue_forwards_and_drops_when_full() {
        let (queue, mut rx) = ChannelLoadQueue::new(1);
        queue.load(RegionKey::new("w", 1, 1));
        queue.load(RegionKey::new("w", 2, 2));

        assert_eq!(rx.recv().await, Some(RegionKey::new("w", 1, 1)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn channel_queue_closed_is_noop() {
        let (queue, rx) = ChannelLoadQueue::new(4);
        drop(rx);
        queue.load(RegionKey::new("w", 0, 0));
    }
}
