//! Mask rasterization.
//!
//! Turns a [`FeatureCollection`] back into a tiled label image. The actual
//! on-disk encoding (tiled TIFF in the reference tooling) stays behind the
//! [`MaskSink`] seam; this module only produces tile buffers.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::features::collection::FeatureCollection;
use crate::pixel::Pixel;

/// Receiver of rasterized mask tiles.
///
/// Tiles are `tile_size * tile_size` buffers handed over row-major across
/// the image; every tile of the grid is delivered exactly once.
pub trait MaskSink<T> {
    /// Accept the tile at grid position `(tile_row, tile_col)`.
    fn write_tile(&mut self, tile_row: u32, tile_col: u32, pixels: &[T]) -> Result<()>;
}

impl<T, F> MaskSink<T> for F
where
    F: FnMut(u32, u32, &[T]) -> Result<()>,
{
    fn write_tile(&mut self, tile_row: u32, tile_col: u32, pixels: &[T]) -> Result<()> {
        self(tile_row, tile_col, pixels)
    }
}

/// Rasterize a labeled mask: each pixel holds `feature_id + 1`, or 0 for
/// background.
///
/// `tile_size` must be a power of two.
pub fn rasterize_labeled(
    collection: &FeatureCollection,
    tile_size: u32,
    sink: &mut impl MaskSink<u32>,
) -> Result<()> {
    rasterize(collection, tile_size, |id| id + 1, sink)
}

/// Rasterize a binary mask: each feature pixel holds 1.
pub fn rasterize_binary(
    collection: &FeatureCollection,
    tile_size: u32,
    sink: &mut impl MaskSink<u8>,
) -> Result<()> {
    rasterize(collection, tile_size, |_| 1, sink)
}

fn rasterize<T: Pixel>(
    collection: &FeatureCollection,
    tile_size: u32,
    value: impl Fn(u32) -> T,
    sink: &mut impl MaskSink<T>,
) -> Result<()> {
    if tile_size == 0 || !tile_size.is_power_of_two() {
        return Err(Error::InvalidArgument(format!(
            "mask tile size must be a power of two, got {tile_size}"
        )));
    }
    let image_height = collection.image_height();
    let image_width = collection.image_width();
    if image_height == 0 || image_width == 0 {
        return Err(Error::InvalidArgument(
            "feature collection has no image dimensions".into(),
        ));
    }

    let tile_len = tile_size as usize * tile_size as usize;
    let mut tiles: HashMap<(u32, u32), Vec<T>> = HashMap::new();

    // Paint each feature into the tiles its bounding box overlaps.
    for feature in collection.features() {
        let bbox = feature.bounding_box();
        if bbox.height() == 0 || bbox.width() == 0 {
            continue;
        }
        let tile_row_min = bbox.ul_row() / tile_size;
        let tile_col_min = bbox.ul_col() / tile_size;
        let tile_row_max = (bbox.br_row() - 1) / tile_size;
        let tile_col_max = (bbox.br_col() - 1) / tile_size;

        for tile_row in tile_row_min..=tile_row_max {
            for tile_col in tile_col_min..=tile_col_max {
                let tile = tiles
                    .entry((tile_row, tile_col))
                    .or_insert_with(|| vec![T::default(); tile_len]);

                let origin_row = tile_row * tile_size;
                let origin_col = tile_col * tile_size;
                let row_from = origin_row.max(bbox.ul_row());
                let col_from = origin_col.max(bbox.ul_col());
                let row_to = bbox.br_row().min(origin_row + tile_size);
                let col_to = bbox.br_col().min(origin_col + tile_size);

                for row in row_from..row_to {
                    for col in col_from..col_to {
                        if feature.is_in_bitmask(row, col) {
                            let index = (row - origin_row) as usize * tile_size as usize
                                + (col - origin_col) as usize;
                            tile[index] = value(feature.id());
                        }
                    }
                }
            }
        }
    }

    // Emit the full grid, blank tiles included.
    let blank = vec![T::default(); tile_len];
    let tile_rows = (image_height - 1) / tile_size;
    let tile_cols = (image_width - 1) / tile_size;
    for tile_row in 0..=tile_rows {
        for tile_col in 0..=tile_cols {
            match tiles.get(&(tile_row, tile_col)) {
                Some(tile) => sink.write_tile(tile_row, tile_col, tile)?,
                None => sink.write_tile(tile_row, tile_col, &blank)?,
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::bounding_box::BoundingBox;

    fn collection() -> FeatureCollection {
        let mut collection = FeatureCollection::new();
        collection.set_image_dimensions(8, 8);
        // 2x2 square at (1, 1) with all four bits set.
        collection
            .add_feature(0, BoundingBox::new(1, 1, 3, 3), &[0xF000_0000])
            .unwrap();
        // Single pixel at (6, 6).
        collection
            .add_feature(3, BoundingBox::new(6, 6, 7, 7), &[0x8000_0000])
            .unwrap();
        collection
    }

    #[test]
    fn test_non_power_of_two_tile_size_fails() {
        let mut sink = |_: u32, _: u32, _: &[u32]| Ok(());
        let err = rasterize_labeled(&collection(), 6, &mut sink).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_labeled_pixels_are_id_plus_one() {
        let mut tiles: Vec<(u32, u32, Vec<u32>)> = Vec::new();
        let mut sink = |row: u32, col: u32, pixels: &[u32]| {
            tiles.push((row, col, pixels.to_vec()));
            Ok(())
        };
        rasterize_labeled(&collection(), 4, &mut sink).unwrap();

        assert_eq!(tiles.len(), 4);
        let tile00 = &tiles.iter().find(|t| (t.0, t.1) == (0, 0)).unwrap().2;
        assert_eq!(tile00[1 * 4 + 1], 1);
        assert_eq!(tile00[2 * 4 + 2], 1);
        assert_eq!(tile00[0], 0);
        let tile11 = &tiles.iter().find(|t| (t.0, t.1) == (1, 1)).unwrap().2;
        assert_eq!(tile11[2 * 4 + 2], 4); // feature id 3 -> pixel 4
    }

    #[test]
    fn test_binary_mask_and_blank_tiles() {
        let mut count = 0;
        let mut ones = 0;
        let mut sink = |_: u32, _: u32, pixels: &[u8]| {
            count += 1;
            ones += pixels.iter().filter(|&&p| p == 1).count();
            Ok(())
        };
        rasterize_binary(&collection(), 4, &mut sink).unwrap();
        assert_eq!(count, 4);
        assert_eq!(ones, 5);
    }
}
