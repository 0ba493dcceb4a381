//! Engine configuration.

use std::collections::HashMap;

use crate::traversal::TraversalKind;
use crate::view::FillKind;

/// Tunables applied when the engine starts.
///
/// Every option has a sensible default; builder-style setters allow
/// chaining:
///
/// ```
/// use tilestream::{EngineOptions, TraversalKind};
///
/// let options = EngineOptions::default()
///     .with_preserve_order(true)
///     .with_num_parallel_views(50)
///     .with_traversal(TraversalKind::Diagonal);
/// ```
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Emit views in the order they were requested.
    pub preserve_order: bool,
    /// View-pool size per level (clipped to the level's tile count).
    pub num_parallel_views: u32,
    /// Tile-cache capacity per level; `0` resolves to twice the level's
    /// tile-column count, clipped to its tile count.
    pub num_cached_tiles: u32,
    /// Tile-loader worker count.
    pub num_tile_loaders: u32,
    /// Order of `request_all_tiles` walks.
    pub traversal: TraversalKind,
    /// Ghost-region synthesis mode.
    pub fill: FillKind,
    /// Per-level release counts; levels not present default to 1.
    release_counts: HashMap<u32, u32>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            preserve_order: false,
            num_parallel_views: 1,
            num_cached_tiles: 0,
            num_tile_loaders: 1,
            traversal: TraversalKind::Snake,
            fill: FillKind::EdgeReplicate,
            release_counts: HashMap::new(),
        }
    }
}

impl EngineOptions {
    /// Enable or disable ordered output.
    pub fn with_preserve_order(mut self, preserve_order: bool) -> Self {
        self.preserve_order = preserve_order;
        self
    }

    /// Set the view-pool size.
    pub fn with_num_parallel_views(mut self, num_parallel_views: u32) -> Self {
        self.num_parallel_views = num_parallel_views;
        self
    }

    /// Set the tile-cache capacity (`0` = default heuristic).
    pub fn with_num_cached_tiles(mut self, num_cached_tiles: u32) -> Self {
        self.num_cached_tiles = num_cached_tiles;
        self
    }

    /// Set the tile-loader worker count.
    pub fn with_num_tile_loaders(mut self, num_tile_loaders: u32) -> Self {
        self.num_tile_loaders = num_tile_loaders;
        self
    }

    /// Set the full-image traversal order.
    pub fn with_traversal(mut self, traversal: TraversalKind) -> Self {
        self.traversal = traversal;
        self
    }

    /// Set the ghost-fill mode.
    pub fn with_fill(mut self, fill: FillKind) -> Self {
        self.fill = fill;
        self
    }

    /// Require `count` releases per view on `level` before its buffer is
    /// recycled (one per downstream consumer).
    pub fn with_release_count(mut self, level: u32, count: u32) -> Self {
        self.release_counts.insert(level, count);
        self
    }

    /// Release count for `level` (default 1).
    pub fn release_count(&self, level: u32) -> u32 {
        self.release_counts.get(&level).copied().unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = EngineOptions::default();
        assert!(!options.preserve_order);
        assert_eq!(options.num_parallel_views, 1);
        assert_eq!(options.num_cached_tiles, 0);
        assert_eq!(options.num_tile_loaders, 1);
        assert_eq!(options.traversal, TraversalKind::Snake);
        assert_eq!(options.fill, FillKind::EdgeReplicate);
        assert_eq!(options.release_count(0), 1);
        assert_eq!(options.release_count(3), 1);
    }

    #[test]
    fn test_builder_chaining() {
        let options = EngineOptions::default()
            .with_num_tile_loaders(4)
            .with_release_count(1, 2);
        assert_eq!(options.num_tile_loaders, 4);
        assert_eq!(options.release_count(1), 2);
        assert_eq!(options.release_count(0), 1);
    }
}
