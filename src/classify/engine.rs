//! Two-pass classification over the tile grid.
//!
//! Pass one decides the coastal set tile by tile. Pass two decides adjacency
//! against the completed coastal set. Both passes are parallel maps into
//! per-tile slots; the only synchronization point is between them, so the
//! result never depends on the order tiles are visited in.

use rayon::prelude::*;
use tracing::{debug, info};

use crate::classify::grid::GridIndex;
use crate::classify::{Category, Classification, ContentCheck, TileClass};
use crate::content::ContentVerdict;
use crate::tile::Tile;
use crate::vector::Coastline;

/// Result of pass one for a single tile.
#[derive(Clone, Copy, Debug)]
struct CoastalTest {
    intersects: bool,
    verdict: Option<ContentVerdict>,
}

impl CoastalTest {
    fn is_coastal(&self) -> bool {
        self.intersects && self.verdict.is_some_and(|v| v.is_valid())
    }
}

/// Classify `tiles` against `coastline`, gating the coastal set on `content`.
///
/// Tiles must come from one regular grid (as produced by the planner); ids
/// are expected to be unique.
pub fn classify<C: ContentCheck + ?Sized>(
    tiles: &[Tile],
    coastline: &Coastline,
    content: &C,
) -> Classification {
    // Pass one: coastal set
    let coastal_tests: Vec<CoastalTest> = tiles
        .par_iter()
        .map(|tile| test_coastal(tile, coastline, content))
        .collect();
    let coastal: Vec<bool> = coastal_tests.iter().map(CoastalTest::is_coastal).collect();

    // Pass two: adjacency and landlocked exclusion, against the full coastal set
    let grid = GridIndex::from_tiles(tiles);
    let categories: Vec<Category> = tiles
        .par_iter()
        .enumerate()
        .map(|(index, tile)| {
            if coastal[index] {
                return Category::Intersecting;
            }
            if !tile.has_usable_bbox() {
                return Category::Other;
            }
            let near_coast = grid.neighbours(tile.id).any(|n| coastal[n]);
            if near_coast && !coastline.landmass_contains(&tile.bbox) {
                Category::Adjacent
            } else {
                Category::Other
            }
        })
        .collect();

    let classification = Classification::from_classes(
        tiles
            .iter()
            .zip(coastal_tests)
            .zip(categories)
            .map(|((tile, test), category)| TileClass {
                id: tile.id,
                category,
                intersects: test.intersects,
                verdict: test.verdict,
            }),
    );

    let counts = classification.counts();
    info!(
        tiles = tiles.len(),
        intersecting = counts.intersecting,
        adjacent = counts.adjacent,
        other = counts.other,
        "Classified tiles"
    );
    classification
}

fn test_coastal<C: ContentCheck + ?Sized>(tile: &Tile, coastline: &Coastline, content: &C) -> CoastalTest {
    if !tile.has_usable_bbox() {
        debug!(tile = %tile.id, "Unusable tile bounding box, treating as non-coastal");
        return CoastalTest {
            intersects: false,
            verdict: None,
        };
    }

    let intersects = coastline.boundary_intersects(&tile.bbox);
    if !intersects {
        return CoastalTest {
            intersects,
            verdict: None,
        };
    }

    let verdict = content.check(tile);
    if !verdict.is_valid() {
        debug!(tile = %tile.id, %verdict, "Coastline tile rejected by content check");
    }
    CoastalTest {
        intersects,
        verdict: Some(verdict),
    }
}
