//! Shared tile cache with LRU replacement.
//!
//! The cache owns a fixed pool of tile buffers and maps tile coordinates to
//! resident entries. A single mutex covers the coordinate map, the recency
//! order, the free pool and the counters; each entry additionally carries
//! its own lock protecting the pixel bytes.
//!
//! # Locking
//!
//! `get_locked_tile` acquires the entry lock *while still holding* the cache
//! mutex and returns an owned guard, so a freshly claimed entry can never be
//! observed unlocked through the map, and an entry can never be evicted
//! between lookup and lock. Lock order is strictly cache → entry; callers
//! must not invoke any cache operation while holding a [`TileGuard`]
//! (`add_disk_time` in particular is charged after the guard is dropped).
//!
//! # Capacity
//!
//! A requested capacity of zero resolves to `2 * num_tiles_width`, matching
//! the stride of a snake walk over the image; the result is clipped to the
//! level's total tile count.

mod stats;

pub use stats::CacheStats;

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use lru::LruCache;
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};
use tracing::trace;

use crate::error::{Error, Result};
use crate::geometry::{LevelGeometry, TileCoord};
use crate::pixel::Pixel;

/// Contents of one cached tile entry, protected by the entry lock.
pub struct TileState<P> {
    /// Tile samples, `tile_height * tile_width` long.
    pub data: Vec<P>,
    /// Grid coordinate the entry is currently bound to.
    pub coord: TileCoord,
    /// True until the buffer has been populated from the reader.
    pub fresh: bool,
}

type Entry<P> = Arc<Mutex<TileState<P>>>;

/// Owned lock over one cached tile.
///
/// Holding the guard gives exclusive access to the tile bytes; dropping it
/// releases the entry back to the cache's control.
pub type TileGuard<P> = ArcMutexGuard<RawMutex, TileState<P>>;

struct CacheInner<P> {
    /// Coordinate map doubling as the recency order (front = most recent).
    resident: LruCache<TileCoord, Entry<P>>,
    /// Buffers not currently bound to a coordinate.
    free: Vec<Entry<P>>,
    stats: CacheStats,
}

/// Fixed-size tile cache for one pyramid level.
pub struct TileCache<P: Pixel> {
    inner: StdMutex<CacheInner<P>>,
    geometry: LevelGeometry,
    capacity: u32,
}

impl<P: Pixel> TileCache<P> {
    /// Allocate the cache for one level.
    ///
    /// `requested` buffers are pre-allocated (after the zero-default and
    /// total-tile-count clipping described in the module docs).
    pub fn new(requested: u32, geometry: LevelGeometry) -> Self {
        let mut capacity = if requested == 0 {
            2 * geometry.num_tiles_width()
        } else {
            requested
        };
        capacity = capacity.min(geometry.num_tiles()).max(1);

        let free = (0..capacity)
            .map(|_| {
                Arc::new(Mutex::new(TileState {
                    data: vec![P::default(); geometry.tile_len()],
                    coord: TileCoord::new(0, 0),
                    fresh: true,
                }))
            })
            .collect();

        Self {
            inner: StdMutex::new(CacheInner {
                resident: LruCache::unbounded(),
                free,
                stats: CacheStats::default(),
            }),
            geometry,
            capacity,
        }
    }

    /// Number of tile buffers owned by the cache.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Blockingly obtain a locked entry for `coord`.
    ///
    /// On a hit the entry is promoted to the front of the recency order; on
    /// a miss a free buffer is claimed (evicting the least recently used
    /// entry when none is free) and returned with `fresh == true`. The
    /// caller populates fresh entries from the reader and clears the flag
    /// before copying out.
    pub fn get_locked_tile(&self, coord: TileCoord) -> Result<TileGuard<P>> {
        if !self.geometry.contains(coord) {
            return Err(Error::bad_index("cached tile", coord.row, coord.col));
        }

        let mut inner = self.inner.lock().unwrap();

        if let Some(entry) = inner.resident.get(&coord) {
            let entry = Arc::clone(entry);
            inner.stats.hits += 1;
            trace!(row = coord.row, col = coord.col, "tile cache hit");
            // Entry lock taken under the cache mutex: a concurrent request
            // for the same coordinate blocks here instead of racing the
            // populating worker.
            return Ok(entry.lock_arc());
        }

        inner.stats.misses += 1;
        let entry = match inner.free.pop() {
            Some(entry) => entry,
            None => self.recycle_lru(&mut inner)?,
        };

        let mut guard = entry.lock_arc();
        guard.coord = coord;
        guard.fresh = true;
        inner.resident.put(coord, Arc::clone(&entry));
        trace!(row = coord.row, col = coord.col, "tile cache miss");
        Ok(guard)
    }

    /// Pop the least recently used entry and return it unbound.
    fn recycle_lru(&self, inner: &mut CacheInner<P>) -> Result<Entry<P>> {
        let Some((coord, victim)) = inner.resident.pop_lru() else {
            return Err(Error::ResourceExhausted(
                "tile cache has no resident entry to evict".into(),
            ));
        };
        // Wait for any worker still copying out of the victim, then unbind.
        {
            let mut state = victim.lock();
            state.fresh = true;
            state.coord = TileCoord::new(0, 0);
        }
        inner.stats.evictions += 1;
        trace!(row = coord.row, col = coord.col, "tile evicted");
        Ok(victim)
    }

    /// `(hits, misses)` counters.
    pub fn hit_miss(&self) -> (u64, u64) {
        let inner = self.inner.lock().unwrap();
        (inner.stats.hits, inner.stats.misses)
    }

    /// Charge `elapsed` to the cache's disk-time counter.
    ///
    /// Must not be called while holding a [`TileGuard`].
    pub fn add_disk_time(&self, elapsed: Duration) {
        let mut inner = self.inner.lock().unwrap();
        inner.stats.disk_time += elapsed;
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().unwrap().stats
    }

    /// Number of entries currently bound to a coordinate.
    pub fn resident(&self) -> usize {
        self.inner.lock().unwrap().resident.len()
    }

    /// Number of unbound buffers in the free pool.
    pub fn free(&self) -> usize {
        self.inner.lock().unwrap().free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn grid_3x3() -> LevelGeometry {
        LevelGeometry::new(48, 48, 16, 16)
    }

    #[test]
    fn test_capacity_default_is_twice_tile_width() {
        // 3x4 grid: 0 resolves to 2 * 4 = 8.
        let cache = TileCache::<u8>::new(0, LevelGeometry::new(48, 50, 16, 16));
        assert_eq!(cache.capacity(), 8);
    }

    #[test]
    fn test_capacity_clipped_to_tile_count() {
        let cache = TileCache::<u8>::new(100, grid_3x3());
        assert_eq!(cache.capacity(), 9);
    }

    #[test]
    fn test_out_of_grid_request_fails() {
        let cache = TileCache::<u8>::new(1, grid_3x3());
        let err = cache.get_locked_tile(TileCoord::new(3, 0)).err().unwrap();
        assert!(matches!(err, Error::OutOfBounds(_)));
    }

    #[test]
    fn test_hit_miss_sequence_with_single_buffer() {
        // A single buffer makes every non-repeating request a miss.
        let cache = TileCache::<u8>::new(1, grid_3x3());

        drop(cache.get_locked_tile(TileCoord::new(0, 0)).unwrap());
        drop(cache.get_locked_tile(TileCoord::new(0, 0)).unwrap());
        assert_eq!(cache.hit_miss(), (1, 1));

        // (2, 2) evicts (0, 0); asking for (0, 0) again misses.
        drop(cache.get_locked_tile(TileCoord::new(2, 2)).unwrap());
        drop(cache.get_locked_tile(TileCoord::new(0, 0)).unwrap());
        assert_eq!(cache.hit_miss(), (1, 3));
        assert_eq!(cache.stats().evictions, 2);
    }

    #[test]
    fn test_fresh_flag_survives_until_cleared() {
        let cache = TileCache::<u8>::new(2, grid_3x3());
        {
            let mut guard = cache.get_locked_tile(TileCoord::new(1, 1)).unwrap();
            assert!(guard.fresh);
            guard.data[0] = 42;
            guard.fresh = false;
        }
        let guard = cache.get_locked_tile(TileCoord::new(1, 1)).unwrap();
        assert!(!guard.fresh);
        assert_eq!(guard.data[0], 42);
    }

    #[test]
    fn test_integrity_resident_plus_free_equals_capacity() {
        let cache = TileCache::<u8>::new(4, grid_3x3());
        let walk = [(0, 0), (0, 1), (1, 0), (0, 0), (2, 2), (1, 2), (2, 0)];
        for (row, col) in walk {
            drop(cache.get_locked_tile(TileCoord::new(row, col)).unwrap());
            assert_eq!(cache.resident() + cache.free(), cache.capacity() as usize);
        }
        assert_eq!(cache.free(), 0);
    }

    #[test]
    fn test_lru_evicts_least_recently_used() {
        let cache = TileCache::<u8>::new(2, grid_3x3());
        drop(cache.get_locked_tile(TileCoord::new(0, 0)).unwrap());
        drop(cache.get_locked_tile(TileCoord::new(0, 1)).unwrap());
        // Touch (0, 0) so (0, 1) becomes the eviction victim.
        drop(cache.get_locked_tile(TileCoord::new(0, 0)).unwrap());
        drop(cache.get_locked_tile(TileCoord::new(0, 2)).unwrap());

        let (hits_before, _) = cache.hit_miss();
        drop(cache.get_locked_tile(TileCoord::new(0, 0)).unwrap());
        let (hits_after, _) = cache.hit_miss();
        assert_eq!(hits_after, hits_before + 1, "(0, 0) should still be resident");
    }

    #[test]
    fn test_concurrent_requests_for_same_tile_serialize() {
        let cache = Arc::new(TileCache::<u32>::new(2, grid_3x3()));
        let coord = TileCoord::new(1, 1);

        let mut handles = Vec::new();
        for _ in 0..4 {
            let cache = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                let mut guard = cache.get_locked_tile(coord).unwrap();
                if guard.fresh {
                    // Simulated disk read; only one worker should get here.
                    guard.data[0] += 1;
                    guard.fresh = false;
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let guard = cache.get_locked_tile(coord).unwrap();
        assert_eq!(guard.data[0], 1, "tile must be populated exactly once");
    }
}
