//! Tile records produced by the raster tiler.

pub mod planner;

use std::fmt;

use geo::Rect;

use crate::affine::Affine;

/// Grid coordinate of a tile: `row = row_off / tile_size`, `col = col_off / tile_size`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId {
    pub row: usize,
    pub col: usize,
}

impl TileId {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Base file name shared by the tile's GeoTIFF and PNG outputs.
    pub fn file_stem(&self) -> String {
        format!("tile_{}_{}", self.row, self.col)
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Rectangular pixel window into the source raster. End-exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelWindow {
    pub col_off: usize,
    pub row_off: usize,
    pub width: usize,
    pub height: usize,
}

impl PixelWindow {
    pub fn new(col_off: usize, row_off: usize, width: usize, height: usize) -> Self {
        Self {
            col_off,
            row_off,
            width,
            height,
        }
    }

    pub fn row_end(&self) -> usize {
        self.row_off + self.height
    }

    pub fn col_end(&self) -> usize {
        self.col_off + self.width
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// One tile of the grid. Created once by the planner and never modified.
#[derive(Clone, Debug)]
pub struct Tile {
    pub id: TileId,
    pub window: PixelWindow,
    /// Geotransform with its origin at the window's upper-left corner.
    pub transform: Affine,
    /// Bounding box in the raster CRS.
    pub bbox: Rect<f64>,
}

impl Tile {
    /// Finite, non-inverted bounding box. Anything else never satisfies a
    /// spatial predicate.
    pub fn has_usable_bbox(&self) -> bool {
        let (min, max) = (self.bbox.min(), self.bbox.max());
        [min.x, min.y, max.x, max.y].iter().all(|v| v.is_finite()) && min.x <= max.x && min.y <= max.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::coord;

    #[test]
    fn test_file_stem_and_display() {
        let id = TileId::new(3, 14);
        assert_eq!(id.file_stem(), "tile_3_14");
        assert_eq!(id.to_string(), "(3, 14)");
    }

    #[test]
    fn test_ids_order_row_major() {
        let mut ids = vec![TileId::new(1, 0), TileId::new(0, 1), TileId::new(0, 0)];
        ids.sort();
        assert_eq!(ids, vec![TileId::new(0, 0), TileId::new(0, 1), TileId::new(1, 0)]);
    }

    #[test]
    fn test_nan_bbox_is_unusable() {
        let tile = Tile {
            id: TileId::new(0, 0),
            window: PixelWindow::new(0, 0, 1, 1),
            transform: Affine::identity(),
            bbox: Rect::new(coord! { x: f64::NAN, y: 0.0 }, coord! { x: 1.0, y: 1.0 }),
        };
        assert!(!tile.has_usable_bbox());
    }
}
