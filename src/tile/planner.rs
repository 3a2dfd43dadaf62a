//! Tile planner: splits a raster's pixel grid into fixed-size windows.

use crate::affine::Affine;
use crate::error::PlanError;
use crate::tile::{PixelWindow, Tile, TileId};

/// Number of (rows, cols) in the tile grid for a raster `shape` of (rows, cols).
pub fn grid_shape(shape: (usize, usize), tile_size: usize) -> (usize, usize) {
    if tile_size == 0 {
        return (0, 0);
    }
    (shape.0.div_ceil(tile_size), shape.1.div_ceil(tile_size))
}

/// Plan the tiles covering a raster of `shape` (rows, cols).
///
/// Windows start every `tile_size` pixels along both axes; edge windows are
/// clipped to the raster and never padded. Tiles are returned in row-major
/// order, so tile `(row, col)` sits at index `row * grid_cols + col`.
pub fn plan_tiles(
    transform: &Affine,
    shape: (usize, usize),
    tile_size: usize,
) -> Result<Vec<Tile>, PlanError> {
    let (rows, cols) = shape;

    if tile_size == 0 {
        return Err(PlanError::ZeroTileSize);
    }
    if rows == 0 || cols == 0 {
        return Err(PlanError::EmptyRaster { rows, cols });
    }

    let (grid_rows, grid_cols) = grid_shape(shape, tile_size);
    let mut tiles = Vec::with_capacity(grid_rows * grid_cols);

    let mut row0 = 0;
    while row0 < rows {
        let row1 = (row0 + tile_size).min(rows);

        let mut col0 = 0;
        while col0 < cols {
            let col1 = (col0 + tile_size).min(cols);

            let window = PixelWindow::new(col0, row0, col1 - col0, row1 - row0);
            tiles.push(Tile {
                id: TileId::new(row0 / tile_size, col0 / tile_size),
                window,
                transform: transform.window_transform(col0, row0),
                bbox: transform.window_bounds(col0, row0, window.width, window.height),
            });

            col0 = col1;
        }
        row0 = row1;
    }

    Ok(tiles)
}
