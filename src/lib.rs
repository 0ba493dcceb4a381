//! TileStream - streaming access to very large tiled raster images.
//!
//! This library serves *views* (a center tile plus an optional halo of
//! neighboring pixels) out of images too large to hold in memory. Tiles
//! are read through a pluggable [`TileReader`], kept in a bounded
//! LRU [`cache`](cache::TileCache), and assembled into pooled view buffers
//! by a pipeline of worker threads. On top of the engine, the
//! [`features`] module extracts connected components from mask images and
//! packs them into serializable feature collections.
//!
//! # Quick tour
//!
//! ```
//! use tilestream::{Engine, EngineOptions, InMemoryTileReader};
//!
//! // A 48x50 8-bit image cut into 16x16 tiles.
//! let reader = InMemoryTileReader::from_fn(48, 50, 16, 16, |row, col| {
//!     if (row / 16 + col / 16) % 2 == 0 { 0u8 } else { 255 }
//! });
//!
//! let mut engine = Engine::open(reader, 0).unwrap();
//! engine.configure(EngineOptions::default().with_num_parallel_views(4));
//! engine.run().unwrap();
//! engine.request_all_tiles(true, 0).unwrap();
//!
//! let mut tiles = 0;
//! while let Some(view) = engine.next_view_blocking().unwrap() {
//!     tiles += 1;
//!     view.release();
//! }
//! engine.wait_for_complete();
//! assert_eq!(tiles, 12);
//! ```

pub mod cache;
pub mod engine;
pub mod error;
pub mod features;
pub mod geometry;
pub mod logging;
pub mod options;
pub mod pipeline;
pub mod pixel;
pub mod reader;
pub mod traversal;
pub mod view;

pub use cache::{CacheStats, TileCache};
pub use engine::Engine;
pub use error::{Error, Result};
pub use features::{
    rasterize_binary, rasterize_labeled, BoundingBox, Connectivity, Feature, FeatureCollection,
    MaskSink,
};
pub use geometry::{LevelGeometry, TileCoord};
pub use options::EngineOptions;
pub use pixel::Pixel;
pub use reader::{InMemoryTileReader, TileReader};
pub use traversal::{Traversal, TraversalKind};
pub use view::{FillKind, View, ViewHandle, ViewPool, ViewRequest};

/// Version of the library, injected from `Cargo.toml` at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
