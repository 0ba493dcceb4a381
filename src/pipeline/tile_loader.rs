//! Tile-loader stage.
//!
//! Worker group sharing one MPMC input queue. Each worker resolves its tile
//! through the shared cache (reading from disk exactly once per residency),
//! copies the requested sub-rectangle into the view, and forwards the
//! request to the view counter.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use tracing::warn;

use crate::cache::TileCache;
use crate::pipeline::request::TileRequest;
use crate::pipeline::FailureFlag;
use crate::pixel::Pixel;
use crate::reader::TileReader;

pub(crate) fn run<P: Pixel>(
    tiles: Receiver<TileRequest<P>>,
    loaded: Sender<TileRequest<P>>,
    caches: Vec<Arc<TileCache<P>>>,
    reader: Arc<dyn TileReader<P>>,
    failure: FailureFlag,
) {
    for request in tiles.iter() {
        if failure.is_set() {
            // The pipeline is already failed; keep draining so producers
            // never block on a full view pool forever.
            continue;
        }

        let level = request.view.level();
        let cache = &caches[level as usize];

        let mut guard = match cache.get_locked_tile(request.tile) {
            Ok(guard) => guard,
            Err(err) => {
                failure.set(err);
                continue;
            }
        };

        let mut disk_time = None;
        if guard.fresh {
            match reader.read_tile(&mut guard.data, level, request.tile.row, request.tile.col) {
                Ok(elapsed) => {
                    guard.fresh = false;
                    disk_time = Some(elapsed);
                }
                Err(err) => {
                    warn!(
                        row = request.tile.row,
                        col = request.tile.col,
                        level,
                        error = %err,
                        "tile read failed"
                    );
                    drop(guard);
                    failure.set(err);
                    continue;
                }
            }
        }

        request.view.copy_from_tile(
            &guard.data,
            request.view.request().tile_width as usize,
            request.src_row as usize,
            request.src_col as usize,
            request.dst_row as usize,
            request.dst_col as usize,
            request.rows as usize,
            request.cols as usize,
        );
        // The disk-time charge takes the cache mutex; it must happen after
        // the entry lock is gone (lock order is cache -> entry only).
        drop(guard);
        if let Some(elapsed) = disk_time {
            cache.add_disk_time(elapsed);
        }

        if loaded.send(request).is_err() {
            return;
        }
    }
}
