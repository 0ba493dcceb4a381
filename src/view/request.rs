//! View request geometry.

use crate::geometry::LevelGeometry;

/// Precomputed geometry for one requested view.
///
/// A view request names a center tile and a halo radius. Everything the
/// stages need beyond that (which tiles the view overlaps, which pixel
/// range of the image gets copied, how many border pixels fall outside the
/// image on each side) is derived once here.
///
/// Invariants (checked by the unit tests):
/// `top_fill + rows_from_file + bottom_fill == view_height`, symmetric for
/// columns, and `tiles_to_load >= 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewRequest {
    /// Pyramid level the view belongs to.
    pub level: u32,
    /// Center tile row index.
    pub tile_row: u32,
    /// Center tile column index.
    pub tile_col: u32,
    /// Halo radius in pixels.
    pub radius: u32,

    /// Image height at `level`.
    pub image_height: u32,
    /// Image width at `level`.
    pub image_width: u32,
    /// Nominal tile height at `level`.
    pub tile_height: u32,
    /// Nominal tile width at `level`.
    pub tile_width: u32,

    /// View height: `tile_height + 2 * radius`.
    pub view_height: u32,
    /// View width: `tile_width + 2 * radius`.
    pub view_width: u32,

    /// First overlapped tile row.
    pub tile_row_min: u32,
    /// One past the last overlapped tile row.
    pub tile_row_max: u32,
    /// First overlapped tile column.
    pub tile_col_min: u32,
    /// One past the last overlapped tile column.
    pub tile_col_max: u32,

    /// First image row copied into the view.
    pub file_row_min: u32,
    /// One past the last image row copied into the view.
    pub file_row_max: u32,
    /// First image column copied into the view.
    pub file_col_min: u32,
    /// One past the last image column copied into the view.
    pub file_col_max: u32,

    /// Ghost rows above the copied range.
    pub top_fill: u32,
    /// Ghost rows below the copied range.
    pub bottom_fill: u32,
    /// Ghost columns left of the copied range.
    pub left_fill: u32,
    /// Ghost columns right of the copied range.
    pub right_fill: u32,

    /// Number of tiles the view overlaps.
    pub tiles_to_load: u32,
}

impl ViewRequest {
    /// Derive the request geometry for center tile `(tile_row, tile_col)`.
    pub fn new(tile_row: u32, tile_col: u32, radius: u32, level: u32, geom: &LevelGeometry) -> Self {
        let tile_height = geom.tile_height;
        let tile_width = geom.tile_width;
        let view_height = tile_height + 2 * radius;
        let view_width = tile_width + 2 * radius;

        // Top-left pixel of the center tile.
        let center_row_min = tile_row * tile_height;
        let center_col_min = tile_col * tile_width;

        // Overlapped tile index ranges.
        let row_span = radius.div_ceil(tile_height);
        let col_span = radius.div_ceil(tile_width);
        let tile_row_min = tile_row.saturating_sub(row_span);
        let tile_col_min = tile_col.saturating_sub(col_span);
        let tile_row_max = (tile_row + row_span + 1).min(geom.num_tiles_height());
        let tile_col_max = (tile_col + col_span + 1).min(geom.num_tiles_width());

        // Pixel range copied from the image, clipped at the boundary.
        let file_row_min = center_row_min.saturating_sub(radius);
        let file_row_max = ((tile_row + 1) * tile_height + radius).min(geom.image_height);
        let file_col_min = center_col_min.saturating_sub(radius);
        let file_col_max = ((tile_col + 1) * tile_width + radius).min(geom.image_width);

        let rows_from_file = file_row_max - file_row_min;
        let cols_from_file = file_col_max - file_col_min;

        // Out-of-image border pixels on each side.
        let top_fill = radius.saturating_sub(center_row_min);
        let left_fill = radius.saturating_sub(center_col_min);
        let bottom_fill = view_height - (top_fill + rows_from_file);
        let right_fill = view_width - (left_fill + cols_from_file);

        let tiles_to_load = (tile_row_max - tile_row_min) * (tile_col_max - tile_col_min);

        Self {
            level,
            tile_row,
            tile_col,
            radius,
            image_height: geom.image_height,
            image_width: geom.image_width,
            tile_height,
            tile_width,
            view_height,
            view_width,
            tile_row_min,
            tile_row_max,
            tile_col_min,
            tile_col_max,
            file_row_min,
            file_row_max,
            file_col_min,
            file_col_max,
            top_fill,
            bottom_fill,
            left_fill,
            right_fill,
            tiles_to_load,
        }
    }

    /// Effective (edge-clipped) height of the center tile.
    pub fn effective_tile_height(&self) -> u32 {
        (self.image_height - self.tile_row * self.tile_height).min(self.tile_height)
    }

    /// Effective (edge-clipped) width of the center tile.
    pub fn effective_tile_width(&self) -> u32 {
        (self.image_width - self.tile_col * self.tile_width).min(self.tile_width)
    }

    /// Pixel column of the center tile's left edge in the image.
    pub fn global_x_offset(&self) -> u32 {
        self.tile_col * self.tile_width
    }

    /// Pixel row of the center tile's top edge in the image.
    pub fn global_y_offset(&self) -> u32 {
        self.tile_row * self.tile_height
    }

    /// Number of samples in the view buffer.
    pub fn view_len(&self) -> usize {
        self.view_height as usize * self.view_width as usize
    }
}
