//! Ghost-region filling.
//!
//! Views whose halo reaches outside the image carry border pixels that no
//! tile can provide. Those are synthesized by edge replication: each ghost
//! column copies the nearest in-image pixel of its row, ghost rows copy the
//! nearest in-image row, and corners take the nearest in-image corner pixel.
//!
//! For a 3x3 tile `abc/def/ghi` with radius 1 on a 1-tile image the filled
//! view reads:
//!
//! ```text
//! a abc c
//! a abc c
//! d def f
//! g ghi i
//! g ghi i
//! ```

use crate::pixel::Pixel;
use crate::view::request::ViewRequest;

/// How the out-of-image border of a view is synthesized.
///
/// Edge replication is the only mode the engine implements; the enum is the
/// extension point for zero/mirror/wrap fills.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum FillKind {
    /// Replicate the nearest in-image pixel (default).
    #[default]
    EdgeReplicate,
}

/// Fill the ghost border of `data` in place.
///
/// `data` is the full view buffer described by `request`; the in-image
/// region must already be populated.
pub fn fill_ghost<P: Pixel>(data: &mut [P], request: &ViewRequest, kind: FillKind) {
    match kind {
        FillKind::EdgeReplicate => edge_replicate(data, request),
    }
}

fn edge_replicate<P: Pixel>(data: &mut [P], request: &ViewRequest) {
    let width = request.view_width as usize;
    let height = request.view_height as usize;
    let top = request.top_fill as usize;
    let bottom = request.bottom_fill as usize;
    let left = request.left_fill as usize;
    let right = request.right_fill as usize;

    if top + bottom + left + right == 0 {
        return;
    }

    // In-image rows: replicate the first/last in-image column sideways.
    for row in top..height - bottom {
        let base = row * width;
        let left_value = data[base + left];
        data[base..base + left].fill(left_value);
        let right_value = data[base + width - right - 1];
        data[base + width - right..base + width].fill(right_value);
    }

    // Top border rows: corner, then a copy of the first in-image row.
    let first_row = top * width;
    for row in 0..top {
        let base = row * width;
        let corner = data[first_row + left];
        data[base..base + left].fill(corner);
        data.copy_within(first_row + left..first_row + width - right, base + left);
        let corner = data[base + width - right - 1];
        data[base + width - right..base + width].fill(corner);
    }

    // Bottom border rows: same with the last in-image row.
    let last_row = (height - bottom - 1) * width;
    for row in height - bottom..height {
        let base = row * width;
        let corner = data[last_row + left];
        data[base..base + left].fill(corner);
        data.copy_within(last_row + left..last_row + width - right, base + left);
        let corner = data[last_row + width - right - 1];
        data[base + width - right..base + width].fill(corner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::LevelGeometry;

    /// 3x3 single-tile image with radius 1; every border pixel is ghost.
    #[test]
    fn test_replication_pattern_around_single_tile() {
        let geom = LevelGeometry::new(3, 3, 3, 3);
        let request = ViewRequest::new(0, 0, 1, 0, &geom);
        assert_eq!(request.view_width, 5);
        assert_eq!(
            (request.top_fill, request.bottom_fill, request.left_fill, request.right_fill),
            (1, 1, 1, 1)
        );

        let mut data = vec![0u8; 25];
        // Interior: a..i at rows 1..4, cols 1..4.
        let tile = [b'a', b'b', b'c', b'd', b'e', b'f', b'g', b'h', b'i'];
        for r in 0..3 {
            for c in 0..3 {
                data[(r + 1) * 5 + (c + 1)] = tile[r * 3 + c];
            }
        }

        fill_ghost(&mut data, &request, FillKind::EdgeReplicate);

        let expect = [
            b'a', b'a', b'b', b'c', b'c',
            b'a', b'a', b'b', b'c', b'c',
            b'd', b'd', b'e', b'f', b'f',
            b'g', b'g', b'h', b'i', b'i',
            b'g', b'g', b'h', b'i', b'i',
        ];
        assert_eq!(data, expect);
    }

    #[test]
    fn test_interior_view_untouched() {
        let geom = LevelGeometry::new(48, 48, 16, 16);
        let request = ViewRequest::new(1, 1, 2, 0, &geom);
        let mut data = vec![9u16; request.view_len()];
        let before = data.clone();
        fill_ghost(&mut data, &request, FillKind::EdgeReplicate);
        assert_eq!(data, before);
    }

    #[test]
    fn test_one_sided_fill() {
        // Top-left tile with radius 2: ghost only above and to the left.
        let geom = LevelGeometry::new(8, 8, 4, 4);
        let request = ViewRequest::new(0, 0, 2, 0, &geom);
        let width = request.view_width as usize;
        let mut data = vec![0u8; request.view_len()];
        // Mark the in-image region with its row number.
        for row in 2..width {
            for col in 2..width {
                data[row * width + col] = row as u8;
            }
        }

        fill_ghost(&mut data, &request, FillKind::EdgeReplicate);

        // Ghost rows replicate row 2; ghost columns replicate column 2.
        assert_eq!(data[0], 2);
        assert_eq!(data[width - 1], 2);
        assert_eq!(data[5 * width], 5);
        assert_eq!(data[5 * width + 1], 5);
    }
}
