//! User-facing engine API.
//!
//! The engine owns the per-level tile caches and view pools, the pipeline
//! worker threads, and the traversal bookkeeping for ordered output. The
//! expected call sequence mirrors the pipeline's lifecycle:
//!
//! ```ignore
//! let mut engine = Engine::<u8>::open(reader, radius)?;
//! engine.configure(EngineOptions::default().with_num_parallel_views(8));
//! engine.run()?;
//! engine.request_all_tiles(true, 0)?;
//! while let Some(view) = engine.next_view_blocking()? {
//!     // consume view.pixel(..) ...
//!     view.release();
//! }
//! engine.wait_for_complete();
//! ```
//!
//! Consumers must release every view they drain; the pool otherwise runs
//! dry and the pipeline stalls until a release arrives.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::cache::TileCache;
use crate::error::{Error, Result};
use crate::features::Feature;
use crate::geometry::LevelGeometry;
use crate::options::EngineOptions;
use crate::pipeline::{Pipeline, PipelineConfig, TraversalQueue};
use crate::pixel::Pixel;
use crate::reader::TileReader;
use crate::traversal::Traversal;
use crate::view::{ViewHandle, ViewPool, ViewRequest};

/// Streaming engine over one tiled pyramidal image.
pub struct Engine<P: Pixel> {
    reader: Arc<dyn TileReader<P>>,
    radius: u32,
    levels: Vec<LevelGeometry>,
    options: EngineOptions,
    caches: Vec<Arc<TileCache<P>>>,
    pools: Vec<ViewPool<P>>,
    pipeline: Option<Pipeline<P>>,
    traversals: TraversalQueue,
    finished: bool,
}

impl<P: Pixel> Engine<P> {
    /// Open an engine over `reader` with a halo of `radius` pixels.
    ///
    /// Fails with `Format` when the reader reports no levels or a level
    /// with zero-sized image or tile dimensions.
    pub fn open(reader: impl TileReader<P> + 'static, radius: u32) -> Result<Self> {
        let reader: Arc<dyn TileReader<P>> = Arc::new(reader);

        let num_levels = reader.num_levels();
        if num_levels == 0 {
            return Err(Error::Format("image reports no pyramid levels".into()));
        }

        let mut levels = Vec::with_capacity(num_levels as usize);
        for level in 0..num_levels {
            let (image_height, image_width) = reader.image_dimensions(level);
            let (tile_height, tile_width) = reader.tile_dimensions(level);
            if image_height == 0 || image_width == 0 || tile_height == 0 || tile_width == 0 {
                return Err(Error::Format(format!(
                    "level {level} has zero-sized image or tile dimensions"
                )));
            }
            levels.push(LevelGeometry::new(
                image_height,
                image_width,
                tile_height,
                tile_width,
            ));
        }

        Ok(Self {
            reader,
            radius,
            levels,
            options: EngineOptions::default(),
            caches: Vec::new(),
            pools: Vec::new(),
            pipeline: None,
            traversals: Arc::new(Mutex::new(VecDeque::new())),
            finished: false,
        })
    }

    /// Replace the options; must be called before [`run`](Self::run).
    pub fn configure(&mut self, options: EngineOptions) -> &mut Self {
        self.options = options;
        self
    }

    /// Allocate caches and pools and start the pipeline workers.
    ///
    /// Calling `run` twice is a no-op.
    pub fn run(&mut self) -> Result<()> {
        if self.pipeline.is_some() {
            return Ok(());
        }
        if self.options.num_parallel_views == 0 {
            return Err(Error::InvalidArgument(
                "num_parallel_views must be at least 1".into(),
            ));
        }
        if self.options.num_tile_loaders == 0 {
            return Err(Error::InvalidArgument(
                "num_tile_loaders must be at least 1".into(),
            ));
        }

        let mut release_counts = Vec::with_capacity(self.levels.len());
        for level in 0..self.levels.len() as u32 {
            let count = self.options.release_count(level);
            if count == 0 {
                return Err(Error::InvalidArgument(format!(
                    "release count for level {level} must be at least 1"
                )));
            }
            release_counts.push(count);
        }

        for geometry in &self.levels {
            self.caches.push(Arc::new(TileCache::new(
                self.options.num_cached_tiles,
                *geometry,
            )));
            let pool_size = self.options.num_parallel_views.min(geometry.num_tiles());
            let view_len = (geometry.tile_height + 2 * self.radius) as usize
                * (geometry.tile_width + 2 * self.radius) as usize;
            self.pools.push(ViewPool::new(pool_size as usize, view_len));
        }

        info!(
            levels = self.levels.len(),
            radius = self.radius,
            tile_loaders = self.options.num_tile_loaders,
            parallel_views = self.options.num_parallel_views,
            "engine starting"
        );

        self.pipeline = Some(Pipeline::start(
            Arc::clone(&self.reader),
            self.caches.clone(),
            self.pools.clone(),
            Arc::clone(&self.traversals),
            PipelineConfig {
                num_tile_loaders: self.options.num_tile_loaders,
                fill: self.options.fill,
                ordered: self.options.preserve_order,
                release_counts,
            },
        ));
        Ok(())
    }

    fn pipeline(&self) -> Result<&Pipeline<P>> {
        self.pipeline
            .as_ref()
            .ok_or_else(|| Error::InvalidArgument("engine is not running; call run() first".into()))
    }

    fn level_geometry(&self, level: u32) -> Result<&LevelGeometry> {
        self.levels
            .get(level as usize)
            .ok_or_else(|| Error::OutOfBounds(format!("pyramid level {level}")))
    }

    /// Record a traversal for ordered emission.
    fn register_traversal(&self, steps: impl IntoIterator<Item = (u32, u32)>) {
        if self.options.preserve_order {
            self.traversals
                .lock()
                .unwrap()
                .push_back(steps.into_iter().collect());
        }
    }

    fn send_request(&self, row: u32, col: u32, level: u32) -> Result<()> {
        let geometry = self.level_geometry(level)?;
        let request = ViewRequest::new(row, col, self.radius, level, geometry);
        self.pipeline()?.send(request);
        Ok(())
    }

    /// Request the view centered on tile `(row, col)` of `level`.
    ///
    /// `finish == true` closes the input after this request. Requests made
    /// after the input was closed are silently ignored.
    pub fn request_tile(&mut self, row: u32, col: u32, level: u32, finish: bool) -> Result<()> {
        self.pipeline()?;
        let geometry = self.level_geometry(level)?;
        if row >= geometry.num_tiles_height() || col >= geometry.num_tiles_width() {
            return Err(Error::bad_index("tile", row, col));
        }
        if !self.finished {
            self.register_traversal([(row, col)]);
            self.send_request(row, col, level)?;
        }
        if finish {
            self.finished_requesting();
        }
        Ok(())
    }

    /// Request every tile of `level`, walking the configured traversal.
    pub fn request_all_tiles(&mut self, finish: bool, level: u32) -> Result<()> {
        self.pipeline()?;
        let geometry = self.level_geometry(level)?;
        if !self.finished {
            let traversal = Traversal::new(
                self.options.traversal,
                geometry.num_tiles_height(),
                geometry.num_tiles_width(),
            );
            self.register_traversal(traversal.steps().iter().copied());
            for &(row, col) in traversal.steps() {
                self.send_request(row, col, level)?;
            }
        }
        if finish {
            self.finished_requesting();
        }
        Ok(())
    }

    /// Request every view overlapping `feature`'s bounding box.
    pub fn request_feature(&mut self, feature: &Feature, level: u32) -> Result<()> {
        self.pipeline()?;
        let geometry = self.level_geometry(level)?;
        let bbox = feature.bounding_box();
        if bbox.br_row() > geometry.image_height || bbox.br_col() > geometry.image_width {
            return Err(Error::OutOfBounds(format!(
                "feature {} extends outside the image",
                feature.id()
            )));
        }
        if self.finished {
            return Ok(());
        }

        let row_min = bbox.ul_row() / geometry.tile_height;
        let col_min = bbox.ul_col() / geometry.tile_width;
        let row_max = if bbox.br_row() == geometry.image_height {
            geometry.num_tiles_height()
        } else {
            bbox.br_row() / geometry.tile_height + 1
        };
        let col_max = if bbox.br_col() == geometry.image_width {
            geometry.num_tiles_width()
        } else {
            bbox.br_col() / geometry.tile_width + 1
        };

        let steps: Vec<(u32, u32)> = (row_min..row_max)
            .flat_map(|row| (col_min..col_max).map(move |col| (row, col)))
            .collect();
        self.register_traversal(steps.iter().copied());
        for (row, col) in steps {
            self.send_request(row, col, level)?;
        }
        Ok(())
    }

    /// Signal that no further requests will be made.
    pub fn finished_requesting(&mut self) {
        if !self.finished {
            debug!("request input closed");
            self.finished = true;
            if let Some(pipeline) = &mut self.pipeline {
                pipeline.close_input();
            }
        }
    }

    /// Block until the next view is ready.
    ///
    /// Returns `Ok(None)` once the pipeline has drained after
    /// [`finished_requesting`](Self::finished_requesting), or the latched
    /// error if the pipeline failed.
    pub fn next_view_blocking(&mut self) -> Result<Option<ViewHandle<P>>> {
        self.pipeline()?.next_view_blocking()
    }

    /// Close the input (if still open) and join all pipeline workers.
    pub fn wait_for_complete(&mut self) {
        self.finished_requesting();
        if let Some(pipeline) = &mut self.pipeline {
            pipeline.join();
        }
    }

    /// `(hits, misses)` of the tile cache at `level`.
    pub fn hit_miss(&self, level: u32) -> Result<(u64, u64)> {
        self.pipeline()?;
        self.caches
            .get(level as usize)
            .map(|cache| cache.hit_miss())
            .ok_or_else(|| Error::OutOfBounds(format!("pyramid level {level}")))
    }

    /// Halo radius the engine was opened with.
    pub fn radius(&self) -> u32 {
        self.radius
    }

    /// Number of pyramid levels.
    pub fn num_levels(&self) -> u32 {
        self.levels.len() as u32
    }

    /// Image height in pixels. Panics when `level` is out of range.
    pub fn image_height(&self, level: u32) -> u32 {
        self.levels[level as usize].image_height
    }

    /// Image width in pixels. Panics when `level` is out of range.
    pub fn image_width(&self, level: u32) -> u32 {
        self.levels[level as usize].image_width
    }

    /// Nominal tile height in pixels. Panics when `level` is out of range.
    pub fn tile_height(&self, level: u32) -> u32 {
        self.levels[level as usize].tile_height
    }

    /// Nominal tile width in pixels. Panics when `level` is out of range.
    pub fn tile_width(&self, level: u32) -> u32 {
        self.levels[level as usize].tile_width
    }

    /// View height including the halo. Panics when `level` is out of range.
    pub fn view_height(&self, level: u32) -> u32 {
        self.tile_height(level) + 2 * self.radius
    }

    /// View width including the halo. Panics when `level` is out of range.
    pub fn view_width(&self, level: u32) -> u32 {
        self.tile_width(level) + 2 * self.radius
    }

    /// Number of tile rows. Panics when `level` is out of range.
    pub fn num_tiles_height(&self, level: u32) -> u32 {
        self.levels[level as usize].num_tiles_height()
    }

    /// Number of tile columns. Panics when `level` is out of range.
    pub fn num_tiles_width(&self, level: u32) -> u32 {
        self.levels[level as usize].num_tiles_width()
    }
}

impl<P: Pixel> Drop for Engine<P> {
    fn drop(&mut self) {
        // Dropping an engine mid-stream abandons queued requests: closing
        // the pools unblocks a view loader stuck on acquisition so the
        // worker threads can drain and join.
        self.finished_requesting();
        for pool in &self.pools {
            pool.close();
        }
        if let Some(pipeline) = &mut self.pipeline {
            pipeline.join();
        }
    }
}
