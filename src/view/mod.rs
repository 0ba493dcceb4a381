//! Views: a center tile plus its halo.
//!
//! A [`View`] is the unit handed to consumers: a contiguous buffer of
//! `(tile_height + 2*radius) x (tile_width + 2*radius)` samples where the
//! center tile starts at local coordinate `(0, 0)` and the halo extends to
//! negative coordinates. Views are pooled ([`ViewPool`]) and released back
//! via a reference count; while in flight, tile-loader workers copy
//! disjoint sub-rectangles into the shared buffer under its lock.

mod fill;
mod pool;
mod request;

pub use fill::FillKind;
pub use pool::ViewPool;
pub use request::ViewRequest;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::pixel::Pixel;
use crate::view::pool::PoolShared;

/// Shared handle to a completed (or in-flight) view.
pub type ViewHandle<P> = Arc<View<P>>;

/// One center tile with its halo, backed by a pooled buffer.
///
/// Local coordinates are centered on the tile: `(0, 0)` is the center
/// tile's top-left pixel, and the halo spans `[-radius, 0)` /
/// `[tile_size, tile_size + radius)` on each axis.
pub struct View<P: Pixel> {
    request: ViewRequest,
    data: Mutex<Vec<P>>,
    remaining: AtomicU32,
    pool: Arc<PoolShared<P>>,
}

impl<P: Pixel> View<P> {
    pub(crate) fn new(
        request: ViewRequest,
        buffer: Vec<P>,
        remaining: AtomicU32,
        pool: Arc<PoolShared<P>>,
    ) -> Self {
        debug_assert_eq!(buffer.len(), request.view_len());
        Self {
            request,
            data: Mutex::new(buffer),
            remaining,
            pool,
        }
    }

    /// Grid row of the center tile.
    pub fn row(&self) -> u32 {
        self.request.tile_row
    }

    /// Grid column of the center tile.
    pub fn col(&self) -> u32 {
        self.request.tile_col
    }

    /// Halo radius in pixels.
    pub fn radius(&self) -> u32 {
        self.request.radius
    }

    /// Pyramid level the view was loaded from.
    pub fn level(&self) -> u32 {
        self.request.level
    }

    /// Effective (edge-clipped) height of the center tile.
    pub fn tile_height(&self) -> u32 {
        self.request.effective_tile_height()
    }

    /// Effective (edge-clipped) width of the center tile.
    pub fn tile_width(&self) -> u32 {
        self.request.effective_tile_width()
    }

    /// Total view height including the halo.
    pub fn view_height(&self) -> u32 {
        self.request.view_height
    }

    /// Total view width including the halo.
    pub fn view_width(&self) -> u32 {
        self.request.view_width
    }

    /// Pixel column of the center tile's top-left corner in the image.
    pub fn global_x_offset(&self) -> u32 {
        self.request.global_x_offset()
    }

    /// Pixel row of the center tile's top-left corner in the image.
    pub fn global_y_offset(&self) -> u32 {
        self.request.global_y_offset()
    }

    /// The request this view was built from.
    pub fn request(&self) -> &ViewRequest {
        &self.request
    }

    #[inline]
    fn local_index(&self, row: i64, col: i64) -> Result<usize> {
        let radius = self.request.radius as i64;
        let height = self.request.view_height as i64;
        let width = self.request.view_width as i64;
        if row < -radius || row >= height - radius || col < -radius || col >= width - radius {
            return Err(Error::OutOfBounds(format!("view pixel ({row}, {col})")));
        }
        Ok(((row + radius) * width + (col + radius)) as usize)
    }

    /// Read one pixel by local coordinate.
    ///
    /// Valid coordinates span `[-radius, tile_height + radius)` by
    /// `[-radius, tile_width + radius)` (nominal tile size); anything else
    /// fails with `OutOfBounds`.
    pub fn pixel(&self, row: i64, col: i64) -> Result<P> {
        let index = self.local_index(row, col)?;
        Ok(self.data.lock()[index])
    }

    /// Lock the buffer once for bulk access.
    pub fn pixels(&self) -> ViewPixels<'_, P> {
        ViewPixels {
            guard: self.data.lock(),
            view: self,
        }
    }

    /// Copy a `rows x cols` rectangle out of a tile buffer into this view.
    ///
    /// `src` is a full tile of stride `src_stride`; the destination
    /// rectangle is expressed in buffer (not local) coordinates.
    pub(crate) fn copy_from_tile(
        &self,
        src: &[P],
        src_stride: usize,
        src_row: usize,
        src_col: usize,
        dst_row: usize,
        dst_col: usize,
        rows: usize,
        cols: usize,
    ) {
        let stride = self.request.view_width as usize;
        let mut data = self.data.lock();
        for r in 0..rows {
            let from = (src_row + r) * src_stride + src_col;
            let to = (dst_row + r) * stride + dst_col;
            data[to..to + cols].copy_from_slice(&src[from..from + cols]);
        }
    }

    /// Synthesize the out-of-image border.
    pub(crate) fn fill_ghost(&self, kind: FillKind) {
        let mut data = self.data.lock();
        fill::fill_ghost(&mut data, &self.request, kind);
    }

    /// Hand the view back toward the pool.
    ///
    /// The buffer is recycled once the view has been released as many times
    /// as the level's configured release count.
    pub fn release(&self) {
        let previous = self.remaining.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "view released more often than acquired");
        if previous == 1 {
            let buffer = std::mem::take(&mut *self.data.lock());
            self.pool.put_back(buffer);
        }
    }
}

/// Bulk pixel access holding the view lock once.
///
/// Used by the analyzer's flood fill, which reads and clears thousands of
/// pixels per view; coordinates are the same local coordinates as
/// [`View::pixel`]. Out-of-range coordinates panic, as slice indexing does.
pub struct ViewPixels<'a, P: Pixel> {
    guard: MutexGuard<'a, Vec<P>>,
    view: &'a View<P>,
}

impl<P: Pixel> ViewPixels<'_, P> {
    #[inline]
    fn index(&self, row: i64, col: i64) -> usize {
        self.view
            .local_index(row, col)
            .expect("local coordinate within view bounds")
    }

    /// Read one pixel.
    #[inline]
    pub fn get(&self, row: i64, col: i64) -> P {
        self.guard[self.index(row, col)]
    }

    /// Overwrite one pixel.
    #[inline]
    pub fn set(&mut self, row: i64, col: i64, value: P) {
        let index = self.index(row, col);
        self.guard[index] = value;
    }
}
