//! In-memory tile reader.
//!
//! Holds the full image (one buffer per pyramid level) in RAM and serves
//! tiles by copying rows out of it. Used as the reference reader in tests
//! and wherever the mask rasterizer's output is fed back into the engine.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::geometry::LevelGeometry;
use crate::pixel::Pixel;
use crate::reader::TileReader;

#[derive(Debug)]
struct MemoryLevel<P> {
    geometry: LevelGeometry,
    pixels: Vec<P>,
    downscale: f32,
}

/// Tile reader over pixel data held in memory.
///
/// Tiles clipped by the image edge are padded with `P::default()`. The
/// reader counts `read_tile` calls, which the cache tests use to verify
/// that each tile is materialized exactly once per residency.
#[derive(Debug)]
pub struct InMemoryTileReader<P> {
    levels: Vec<MemoryLevel<P>>,
    reads: AtomicU64,
}

impl<P: Pixel> InMemoryTileReader<P> {
    /// Build a single-level reader from a row-major pixel buffer.
    ///
    /// Fails with `InvalidArgument` when the buffer length does not match
    /// `image_height * image_width`, or any dimension is zero.
    pub fn from_pixels(
        image_height: u32,
        image_width: u32,
        tile_height: u32,
        tile_width: u32,
        pixels: Vec<P>,
    ) -> Result<Self> {
        if image_height == 0 || image_width == 0 || tile_height == 0 || tile_width == 0 {
            return Err(Error::InvalidArgument(
                "image and tile dimensions must be non-zero".into(),
            ));
        }
        let expected = image_height as usize * image_width as usize;
        if pixels.len() != expected {
            return Err(Error::InvalidArgument(format!(
                "pixel buffer holds {} samples, expected {expected}",
                pixels.len()
            )));
        }
        Ok(Self {
            levels: vec![MemoryLevel {
                geometry: LevelGeometry::new(image_height, image_width, tile_height, tile_width),
                pixels,
                downscale: 1.0,
            }],
            reads: AtomicU64::new(0),
        })
    }

    /// Build a single-level reader by evaluating `f(row, col)` per pixel.
    pub fn from_fn(
        image_height: u32,
        image_width: u32,
        tile_height: u32,
        tile_width: u32,
        f: impl Fn(u32, u32) -> P,
    ) -> Self {
        let mut pixels = Vec::with_capacity(image_height as usize * image_width as usize);
        for row in 0..image_height {
            for col in 0..image_width {
                pixels.push(f(row, col));
            }
        }
        Self::from_pixels(image_height, image_width, tile_height, tile_width, pixels)
            .expect("buffer length matches by construction")
    }

    /// Append a downscaled pyramid level with its own pixel buffer.
    pub fn with_level(
        mut self,
        image_height: u32,
        image_width: u32,
        tile_height: u32,
        tile_width: u32,
        downscale: f32,
        pixels: Vec<P>,
    ) -> Result<Self> {
        let expected = image_height as usize * image_width as usize;
        if pixels.len() != expected {
            return Err(Error::InvalidArgument(format!(
                "pixel buffer holds {} samples, expected {expected}",
                pixels.len()
            )));
        }
        self.levels.push(MemoryLevel {
            geometry: LevelGeometry::new(image_height, image_width, tile_height, tile_width),
            pixels,
            downscale,
        });
        Ok(self)
    }

    /// Number of `read_tile` calls served so far.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    fn level(&self, level: u32) -> &MemoryLevel<P> {
        &self.levels[level as usize]
    }
}

impl<P: Pixel> TileReader<P> for InMemoryTileReader<P> {
    fn image_dimensions(&self, level: u32) -> (u32, u32) {
        let geom = self.level(level).geometry;
        (geom.image_height, geom.image_width)
    }

    fn tile_dimensions(&self, level: u32) -> (u32, u32) {
        let geom = self.level(level).geometry;
        (geom.tile_height, geom.tile_width)
    }

    fn num_levels(&self) -> u32 {
        self.levels.len() as u32
    }

    fn bits_per_sample(&self) -> u32 {
        P::BITS
    }

    fn downscale_factor(&self, level: u32) -> f32 {
        self.level(level).downscale
    }

    fn read_tile(
        &self,
        dst: &mut [P],
        level: u32,
        tile_row: u32,
        tile_col: u32,
    ) -> Result<Duration> {
        let start = Instant::now();
        if level >= self.num_levels() {
            return Err(Error::OutOfBounds(format!("pyramid level {level}")));
        }
        let lvl = self.level(level);
        let geom = lvl.geometry;
        if tile_row >= geom.num_tiles_height() || tile_col >= geom.num_tiles_width() {
            return Err(Error::bad_index("tile", tile_row, tile_col));
        }
        if dst.len() != geom.tile_len() {
            return Err(Error::InvalidArgument(format!(
                "destination holds {} samples, expected {}",
                dst.len(),
                geom.tile_len()
            )));
        }

        let rows = geom.effective_tile_height(tile_row) as usize;
        let cols = geom.effective_tile_width(tile_col) as usize;
        let tile_width = geom.tile_width as usize;
        let image_width = geom.image_width as usize;
        let origin_row = (tile_row * geom.tile_height) as usize;
        let origin_col = (tile_col * geom.tile_width) as usize;

        dst.fill(P::default());
        for r in 0..rows {
            let src = (origin_row + r) * image_width + origin_col;
            dst[r * tile_width..r * tile_width + cols]
                .copy_from_slice(&lvl.pixels[src..src + cols]);
        }

        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(start.elapsed())
    }
}
