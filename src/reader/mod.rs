//! Tile reader abstraction.
//!
//! The engine never touches an image file directly; everything flows through
//! the [`TileReader`] trait. A reader exposes immutable image metadata and a
//! single `read_tile` operation that materializes one tile into a
//! caller-provided buffer, casting from the on-disk sample type to the
//! requested [`Pixel`](crate::pixel::Pixel) type.
//!
//! The crate ships [`InMemoryTileReader`] as a reference implementation;
//! codec-backed readers (tiled TIFF and friends) live outside this crate.

mod memory;

pub use memory::InMemoryTileReader;

use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::pixel::Pixel;

/// Source of tiles for one pyramidal image.
///
/// Implementations must be safe to call from multiple tile-loader workers
/// at once. `read_tile` reports the time spent on I/O so the engine can
/// account disk time separately from cache bookkeeping.
pub trait TileReader<P: Pixel>: Send + Sync {
    /// `(height, width)` of the image at `level`, in pixels.
    fn image_dimensions(&self, level: u32) -> (u32, u32);

    /// `(height, width)` of one tile at `level`, in pixels.
    fn tile_dimensions(&self, level: u32) -> (u32, u32);

    /// Number of pyramid levels; at least 1.
    fn num_levels(&self) -> u32;

    /// Bits per sample of the underlying storage.
    fn bits_per_sample(&self) -> u32;

    /// Downscale factor of `level` relative to level 0.
    fn downscale_factor(&self, _level: u32) -> f32 {
        1.0
    }

    /// Populate `dst` with tile `(tile_row, tile_col)` of `level`.
    ///
    /// `dst` holds exactly `tile_height * tile_width` samples; tiles clipped
    /// by the image edge are padded, and the padding is never observed by
    /// downstream consumers. Returns the observed I/O duration.
    fn read_tile(&self, dst: &mut [P], level: u32, tile_row: u32, tile_col: u32)
        -> Result<Duration>;
}

impl<P: Pixel, T: TileReader<P> + ?Sized> TileReader<P> for Arc<T> {
    fn image_dimensions(&self, level: u32) -> (u32, u32) {
        (**self).image_dimensions(level)
    }

    fn tile_dimensions(&self, level: u32) -> (u32, u32) {
        (**self).tile_dimensions(level)
    }

    fn num_levels(&self) -> u32 {
        (**self).num_levels()
    }

    fn bits_per_sample(&self) -> u32 {
        (**self).bits_per_sample()
    }

    fn downscale_factor(&self, level: u32) -> f32 {
        (**self).downscale_factor(level)
    }

    fn read_tile(
        &self,
        dst: &mut [P],
        level: u32,
        tile_row: u32,
        tile_col: u32,
    ) -> Result<Duration> {
        (**self).read_tile(dst, level, tile_row, tile_col)
    }
}
