//! Per-view connected-component analysis.
//!
//! Each view (served with radius 1 so neighbor pixels are visible) is
//! flood-filled over its center tile. Visited pixels are overwritten with
//! the background value so the row-major scan never revisits them; pixels
//! are recorded at global image coordinates. Wherever a component touches
//! the tile's right or bottom edge (or a diagonal corner under
//! 8-connectivity) and the neighbor pixel in the next tile is foreground, a
//! *merge edge* is recorded for the [`BlobMerger`](super::BlobMerger).

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::features::blob::Blob;
use crate::pixel::Pixel;
use crate::view::{View, ViewPixels};

/// Neighborhood rank for connectivity analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    /// Orthogonal neighbors only.
    Four,
    /// Orthogonal plus diagonal neighbors.
    Eight,
}

impl Connectivity {
    /// Parse a rank; only 4 and 8 are valid.
    pub fn from_rank(rank: u8) -> Result<Self> {
        match rank {
            4 => Ok(Connectivity::Four),
            8 => Ok(Connectivity::Eight),
            other => Err(Error::InvalidArgument(format!(
                "connectivity rank must be 4 or 8, got {other}"
            ))),
        }
    }

    /// Numeric rank.
    pub fn rank(&self) -> u8 {
        match self {
            Connectivity::Four => 4,
            Connectivity::Eight => 8,
        }
    }
}

/// Result of analyzing one view: its local blobs and the cross-tile edges.
#[derive(Debug, Default)]
pub struct ViewAnalysis {
    /// Components found inside the view's center tile.
    pub blobs: Vec<Blob>,
    /// `(blob tag, global coordinate of a foreground pixel in the next
    /// tile)` pairs to resolve during the merge phase.
    pub merges: Vec<(u32, (u32, u32))>,
}

/// Flood-fill analyzer shared by the collection-building workers.
///
/// Blob tags are drawn from an atomic counter owned by the run, so tags
/// are unique across workers and deterministic per run.
#[derive(Clone)]
pub struct ViewAnalyzer<P: Pixel> {
    connectivity: Connectivity,
    background: P,
    image_height: i64,
    image_width: i64,
    tags: Arc<AtomicU32>,
}

impl<P: Pixel> ViewAnalyzer<P> {
    /// Build an analyzer for an `image_height x image_width` mask.
    pub fn new(
        connectivity: Connectivity,
        background: P,
        image_height: u32,
        image_width: u32,
        tags: Arc<AtomicU32>,
    ) -> Self {
        Self {
            connectivity,
            background,
            image_height: image_height as i64,
            image_width: image_width as i64,
            tags,
        }
    }

    /// Flood-fill `view`'s center tile.
    ///
    /// The view's pixels are consumed (foreground is cleared); callers
    /// release the view afterwards.
    pub fn analyze(&self, view: &View<P>) -> ViewAnalysis {
        let mut flood = Flood {
            px: view.pixels(),
            background: self.background,
            connectivity: self.connectivity,
            tile_height: view.tile_height() as i64,
            tile_width: view.tile_width() as i64,
            global_y: view.global_y_offset() as i64,
            global_x: view.global_x_offset() as i64,
            image_height: self.image_height,
            image_width: self.image_width,
            frontier: BTreeSet::new(),
            merges: Vec::new(),
        };

        let mut blobs = Vec::new();
        for row in 0..flood.tile_height {
            for col in 0..flood.tile_width {
                if flood.px.get(row, col) == self.background {
                    continue;
                }
                let mut blob = Blob::new(self.tags.fetch_add(1, Ordering::Relaxed));
                flood.visit(row, col, &mut blob);
                while let Some((r, c)) = flood.frontier.pop_first() {
                    flood.visit(r, c, &mut blob);
                }
                blobs.push(blob);
            }
        }

        ViewAnalysis {
            blobs,
            merges: flood.merges,
        }
    }
}

struct Flood<'a, P: Pixel> {
    px: ViewPixels<'a, P>,
    background: P,
    connectivity: Connectivity,
    tile_height: i64,
    tile_width: i64,
    global_y: i64,
    global_x: i64,
    image_height: i64,
    image_width: i64,
    frontier: BTreeSet<(i64, i64)>,
    merges: Vec<(u32, (u32, u32))>,
}

impl<P: Pixel> Flood<'_, P> {
    #[inline]
    fn foreground(&self, row: i64, col: i64) -> bool {
        self.px.get(row, col) != self.background
    }

    /// Claim `(row, col)` for `blob` and scan its neighborhood.
    fn visit(&mut self, row: i64, col: i64, blob: &mut Blob) {
        self.px.set(row, col, self.background);
        blob.add_pixel((self.global_y + row) as u32, (self.global_x + col) as u32);
        match self.connectivity {
            Connectivity::Four => self.scan4(row, col, blob.tag()),
            Connectivity::Eight => self.scan8(row, col, blob.tag()),
        }
    }

    fn enqueue_if_foreground(&mut self, row: i64, col: i64) {
        if self.foreground(row, col) {
            self.frontier.insert((row, col));
        }
    }

    fn scan4(&mut self, row: i64, col: i64, tag: u32) {
        if row >= 1 {
            self.enqueue_if_foreground(row - 1, col);
        }
        if row + 1 < self.tile_height {
            self.enqueue_if_foreground(row + 1, col);
        }
        if col >= 1 {
            self.enqueue_if_foreground(row, col - 1);
        }
        if col + 1 < self.tile_width {
            self.enqueue_if_foreground(row, col + 1);
        }
        self.edge_merges(row, col, tag);
    }

    fn scan8(&mut self, row: i64, col: i64, tag: u32) {
        let row_lo = (row - 1).max(0);
        let row_hi = (row + 2).min(self.tile_height);
        let col_lo = (col - 1).max(0);
        let col_hi = (col + 2).min(self.tile_width);
        for r in row_lo..row_hi {
            for c in col_lo..col_hi {
                self.enqueue_if_foreground(r, c);
            }
        }

        self.edge_merges(row, col, tag);

        // Bottom-right diagonal into the next tile.
        if (col == self.tile_width - 1 || row == self.tile_height - 1)
            && self.global_y + row + 1 != self.image_height
            && self.global_x + col + 1 != self.image_width
            && self.foreground(row + 1, col + 1)
        {
            self.add_merge(tag, row + 1, col + 1);
        }
        // Top-right diagonal into the tile above or to the right.
        if (row == 0 || col == self.tile_width - 1)
            && self.global_y + row > 0
            && self.global_x + col + 1 != self.image_width
            && self.foreground(row - 1, col + 1)
        {
            self.add_merge(tag, row - 1, col + 1);
        }
    }

    /// Right/bottom edges shared by both ranks.
    fn edge_merges(&mut self, row: i64, col: i64, tag: u32) {
        if row + 1 == self.tile_height
            && self.global_y + row + 1 != self.image_height
            && self.foreground(row + 1, col)
        {
            self.add_merge(tag, row + 1, col);
        }
        if col + 1 == self.tile_width
            && self.global_x + col + 1 != self.image_width
            && self.foreground(row, col + 1)
        {
            self.add_merge(tag, row, col + 1);
        }
    }

    fn add_merge(&mut self, tag: u32, row: i64, col: i64) {
        self.merges.push((
            tag,
            ((self.global_y + row) as u32, (self.global_x + col) as u32),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::options::EngineOptions;
    use crate::reader::InMemoryTileReader;

    /// Drive the engine at radius 1 over a mask and analyze every view.
    fn analyze_mask(
        height: u32,
        width: u32,
        tile: u32,
        connectivity: Connectivity,
        mask: impl Fn(u32, u32) -> u8,
    ) -> Vec<ViewAnalysis> {
        let reader = InMemoryTileReader::from_fn(height, width, tile, tile, mask);
        let mut engine = Engine::open(reader, 1).unwrap();
        engine.configure(EngineOptions::default().with_num_parallel_views(4));
        engine.run().unwrap();
        engine.request_all_tiles(true, 0).unwrap();

        let analyzer = ViewAnalyzer::new(
            connectivity,
            0u8,
            height,
            width,
            Arc::new(AtomicU32::new(0)),
        );
        let mut analyses = Vec::new();
        while let Some(view) = engine.next_view_blocking().unwrap() {
            analyses.push(analyzer.analyze(&view));
            view.release();
        }
        engine.wait_for_complete();
        analyses
    }

    #[test]
    fn test_single_tile_two_components() {
        // 4x4 single tile: one pixel at (0, 0), an L at the bottom-right.
        let analyses = analyze_mask(4, 4, 4, Connectivity::Four, |r, c| {
            u8::from((r, c) == (0, 0) || (r == 3 && c >= 2) || (r == 2 && c == 3))
        });
        assert_eq!(analyses.len(), 1);
        let blobs = &analyses[0].blobs;
        assert_eq!(blobs.len(), 2);
        let total: u64 = blobs.iter().map(Blob::count).sum();
        assert_eq!(total, 4);
        assert!(analyses[0].merges.is_empty());
    }

    #[test]
    fn test_diagonal_joins_only_under_rank_eight() {
        let mask = |r: u32, c: u32| u8::from((r == 0 && c == 0) || (r == 1 && c == 1));
        let four = analyze_mask(2, 2, 2, Connectivity::Four, mask);
        assert_eq!(four[0].blobs.len(), 2);
        let eight = analyze_mask(2, 2, 2, Connectivity::Eight, mask);
        assert_eq!(eight[0].blobs.len(), 1);
        assert_eq!(eight[0].blobs[0].count(), 2);
    }

    #[test]
    fn test_cross_tile_component_records_merge_edge() {
        // 4x8 image, 4x4 tiles; a horizontal bar crossing the tile seam.
        let analyses = analyze_mask(4, 8, 4, Connectivity::Four, |r, c| {
            u8::from(r == 1 && (2..6).contains(&c))
        });
        let merges: usize = analyses.iter().map(|a| a.merges.len()).sum();
        assert_eq!(merges, 1);
        let all: Vec<_> = analyses.iter().flat_map(|a| a.merges.iter()).collect();
        // The left tile's blob points at the first foreground pixel of the
        // right tile.
        assert_eq!(all[0].1, (1, 4));
    }

    #[test]
    fn test_rank_rejects_other_values() {
        assert!(Connectivity::from_rank(4).is_ok());
        assert!(Connectivity::from_rank(8).is_ok());
        assert!(matches!(
            Connectivity::from_rank(6),
            Err(Error::InvalidArgument(_))
        ));
    }
}
