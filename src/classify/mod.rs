//! Tile classifier.
//!
//! Every tile ends up in exactly one [`Category`]:
//! - `Intersecting`: its bounding box meets the coastline boundary and its
//!   pixels pass the content check.
//! - `Adjacent`: not intersecting, 8-connected grid neighbour of an
//!   intersecting tile, and not entirely inside the landmass.
//! - `Other`: everything else.

pub mod engine;
pub mod grid;

pub use engine::classify;
pub use grid::GridIndex;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::content::{ContentValidator, ContentVerdict};
use crate::raster::RasterSource;
use crate::tile::{Tile, TileId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Intersecting,
    Adjacent,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Intersecting => "intersecting",
            Category::Adjacent => "adjacent",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decides whether a geometrically coastal tile carries usable imagery.
///
/// Called concurrently from worker threads, once per tile whose bounding box
/// meets the coastline boundary.
pub trait ContentCheck: Sync {
    fn check(&self, tile: &Tile) -> ContentVerdict;
}

/// Treats every tile as having content. For classification from geometry alone.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAll;

impl ContentCheck for AcceptAll {
    fn check(&self, _tile: &Tile) -> ContentVerdict {
        ContentVerdict::Valid
    }
}

/// Content check backed by the raster the tiles were cut from.
pub struct RasterContent<'a, R: RasterSource + ?Sized> {
    raster: &'a R,
    validator: ContentValidator,
}

impl<'a, R: RasterSource + ?Sized> RasterContent<'a, R> {
    pub fn new(raster: &'a R, validator: ContentValidator) -> Self {
        Self { raster, validator }
    }
}

impl<R: RasterSource + ?Sized> ContentCheck for RasterContent<'_, R> {
    fn check(&self, tile: &Tile) -> ContentVerdict {
        self.validator.inspect(self.raster, tile)
    }
}

/// Classification record of one tile.
#[derive(Clone, Debug, PartialEq)]
pub struct TileClass {
    pub id: TileId,
    pub category: Category,
    /// Bounding box meets the coastline boundary, whatever the content verdict.
    pub intersects: bool,
    /// `None` when content was never inspected (the tile does not intersect).
    pub verdict: Option<ContentVerdict>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    pub intersecting: usize,
    pub adjacent: usize,
    pub other: usize,
}

impl CategoryCounts {
    pub fn total(&self) -> usize {
        self.intersecting + self.adjacent + self.other
    }

    pub fn get(&self, category: Category) -> usize {
        match category {
            Category::Intersecting => self.intersecting,
            Category::Adjacent => self.adjacent,
            Category::Other => self.other,
        }
    }
}

/// Category of every tile, keyed by tile id (iterates row-major).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Classification {
    classes: BTreeMap<TileId, TileClass>,
}

impl Classification {
    pub(crate) fn from_classes(classes: impl IntoIterator<Item = TileClass>) -> Self {
        Self {
            classes: classes.into_iter().map(|c| (c.id, c)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn get(&self, id: TileId) -> Option<&TileClass> {
        self.classes.get(&id)
    }

    pub fn category(&self, id: TileId) -> Option<Category> {
        self.get(id).map(|c| c.category)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TileClass> {
        self.classes.values()
    }

    /// Ids of one category, row-major.
    pub fn ids(&self, category: Category) -> impl Iterator<Item = TileId> + '_ {
        self.iter().filter(move |c| c.category == category).map(|c| c.id)
    }

    pub fn counts(&self) -> CategoryCounts {
        let mut counts = CategoryCounts::default();
        for class in self.iter() {
            match class.category {
                Category::Intersecting => counts.intersecting += 1,
                Category::Adjacent => counts.adjacent += 1,
                Category::Other => counts.other += 1,
            }
        }
        counts
    }
}
