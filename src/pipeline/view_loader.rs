//! View-loader stage.
//!
//! First stage of the pipeline: turns each [`ViewRequest`] into one
//! [`TileRequest`] per overlapped tile. Acquiring the view buffer blocks on
//! the level's pool, which is what bounds the number of in-flight views.

use crossbeam_channel::{Receiver, Sender};
use tracing::debug;

use crate::pipeline::request::TileRequest;
use crate::pixel::Pixel;
use crate::view::{ViewPool, ViewRequest};

pub(crate) fn run<P: Pixel>(
    requests: Receiver<ViewRequest>,
    tiles: Sender<TileRequest<P>>,
    pools: Vec<ViewPool<P>>,
    release_counts: Vec<u32>,
) {
    for request in requests.iter() {
        let level = request.level as usize;
        let release_count = release_counts[level];
        // A closed pool means the engine is shutting down; the request is
        // dropped without emitting anything.
        let Some(view) = pools[level].acquire(request.clone(), release_count) else {
            debug!(
                row = request.tile_row,
                col = request.tile_col,
                "view request dropped during shutdown"
            );
            continue;
        };

        let tile_height = request.tile_height;
        let tile_width = request.tile_width;

        // Walk the overlapped tiles row-major. The first in-image row of
        // the copied range lands at dst_row == top_fill, and each tile row
        // resumes the destination column at left_fill.
        let mut dst_row = request.top_fill;
        for tile_row in request.tile_row_min..request.tile_row_max {
            let origin_row = tile_row * tile_height;
            let src_row = request.file_row_min.saturating_sub(origin_row);
            let rows = request.file_row_max.min(origin_row + tile_height) - origin_row - src_row;

            let mut dst_col = request.left_fill;
            for tile_col in request.tile_col_min..request.tile_col_max {
                let origin_col = tile_col * tile_width;
                let src_col = request.file_col_min.saturating_sub(origin_col);
                let cols =
                    request.file_col_max.min(origin_col + tile_width) - origin_col - src_col;

                let tile_request = TileRequest {
                    tile: crate::geometry::TileCoord::new(tile_row, tile_col),
                    src_row,
                    src_col,
                    dst_row,
                    dst_col,
                    rows,
                    cols,
                    view: view.clone(),
                };
                if tiles.send(tile_request).is_err() {
                    return;
                }
                dst_col += cols;
            }
            dst_row += rows;
        }
    }
}
