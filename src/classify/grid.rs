//! Grid lookup for tile neighbours.
//!
//! Planner tiles form a regular, non-overlapping grid, so two tile bounding
//! boxes touch exactly when their grid coordinates differ by at most one in
//! each direction. That turns the pairwise touch test into a constant-time
//! lookup.

use crate::tile::{Tile, TileId};

const OFFSETS: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Maps grid coordinates to positions in a tile slice.
#[derive(Clone, Debug)]
pub struct GridIndex {
    rows: usize,
    cols: usize,
    slots: Vec<Option<usize>>,
}

impl GridIndex {
    /// Index `tiles` by id. The slice may be in any order and may have holes.
    pub fn from_tiles(tiles: &[Tile]) -> Self {
        let rows = tiles.iter().map(|t| t.id.row + 1).max().unwrap_or(0);
        let cols = tiles.iter().map(|t| t.id.col + 1).max().unwrap_or(0);
        let mut slots = vec![None; rows * cols];
        for (index, tile) in tiles.iter().enumerate() {
            slots[tile.id.row * cols + tile.id.col] = Some(index);
        }
        Self { rows, cols, slots }
    }

    /// Grid shape as (rows, cols).
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Position of tile `id` in the indexed slice.
    pub fn position(&self, id: TileId) -> Option<usize> {
        if id.row >= self.rows || id.col >= self.cols {
            return None;
        }
        self.slots[id.row * self.cols + id.col]
    }

    /// Slice positions of the (up to 8) tiles touching `id`.
    pub fn neighbours(&self, id: TileId) -> impl Iterator<Item = usize> + '_ {
        OFFSETS.iter().filter_map(move |&(dr, dc)| {
            let row = id.row.checked_add_signed(dr)?;
            let col = id.col.checked_add_signed(dc)?;
            self.position(TileId::new(row, col))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::affine::Affine;
    use crate::tile::planner::plan_tiles;

    fn grid(rows: usize, cols: usize) -> (Vec<Tile>, GridIndex) {
        let tiles = plan_tiles(&Affine::identity(), (rows * 10, cols * 10), 10).unwrap();
        let index = GridIndex::from_tiles(&tiles);
        (tiles, index)
    }

    fn neighbour_ids(tiles: &[Tile], index: &GridIndex, id: TileId) -> Vec<TileId> {
        let mut ids: Vec<TileId> = index.neighbours(id).map(|i| tiles[i].id).collect();
        ids.sort();
        ids
    }

    #[test]
    fn test_interior_has_eight_neighbours() {
        let (tiles, index) = grid(3, 3);
        assert_eq!(index.shape(), (3, 3));
        let ids = neighbour_ids(&tiles, &index, TileId::new(1, 1));
        assert_eq!(ids.len(), 8);
        assert!(!ids.contains(&TileId::new(1, 1)));
    }

    #[test]
    fn test_corner_and_edge_neighbours() {
        let (tiles, index) = grid(3, 4);
        assert_eq!(
            neighbour_ids(&tiles, &index, TileId::new(0, 0)),
            vec![TileId::new(0, 1), TileId::new(1, 0), TileId::new(1, 1)]
        );
        assert_eq!(index.neighbours(TileId::new(2, 1)).count(), 5);
    }

    #[test]
    fn test_neighbour_relation_is_symmetric() {
        let (tiles, index) = grid(4, 5);
        for a in &tiles {
            for b in index.neighbours(a.id) {
                let back = neighbour_ids(&tiles, &index, tiles[b].id);
                assert!(back.contains(&a.id), "{} -> {} not symmetric", a.id, tiles[b].id);
            }
        }
    }

    #[test]
    fn test_neighbours_match_touching_bboxes() {
        use geo::Intersects;
        let (tiles, index) = grid(3, 3);
        for a in &tiles {
            let expected: Vec<TileId> = tiles
                .iter()
                .filter(|b| b.id != a.id && b.bbox.intersects(&a.bbox))
                .map(|b| b.id)
                .collect();
            assert_eq!(neighbour_ids(&tiles, &index, a.id), expected);
        }
    }

    #[test]
    fn test_shuffled_and_sparse_input() {
        let (mut tiles, _) = grid(2, 2);
        tiles.reverse();
        tiles.remove(0); // drops (1, 1)
        let index = GridIndex::from_tiles(&tiles);
        assert_eq!(index.position(TileId::new(1, 1)), None);
        assert_eq!(index.position(TileId::new(0, 0)).map(|i| tiles[i].id), Some(TileId::new(0, 0)));
        assert_eq!(index.neighbours(TileId::new(0, 0)).count(), 2);
    }

    #[test]
    fn test_empty() {
        let index = GridIndex::from_tiles(&[]);
        assert_eq!(index.shape(), (0, 0));
        assert_eq!(index.neighbours(TileId::new(0, 0)).count(), 0);
    }
}
