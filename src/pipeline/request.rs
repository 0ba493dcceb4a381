//! Tile request payload flowing between stages.

use crate::geometry::TileCoord;
use crate::pixel::Pixel;
use crate::view::ViewHandle;

/// One tile's contribution to one view.
///
/// Produced by the view-loader stage, consumed by a tile-loader worker
/// (which performs the copy) and then by the view counter (which needs the
/// view handle and its request to track completion).
pub struct TileRequest<P: Pixel> {
    /// Tile to load.
    pub tile: TileCoord,
    /// Top-left of the source rectangle within the tile.
    pub src_row: u32,
    /// Left column of the source rectangle within the tile.
    pub src_col: u32,
    /// Top-left of the destination rectangle within the view buffer.
    pub dst_row: u32,
    /// Left column of the destination rectangle within the view buffer.
    pub dst_col: u32,
    /// Rows to copy.
    pub rows: u32,
    /// Columns to copy.
    pub cols: u32,
    /// The view this tile contributes to.
    pub view: ViewHandle<P>,
}
