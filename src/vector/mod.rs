//! Coastline normalization.
//!
//! Turns raw coastline features into the two geometries the classifier tests
//! against: the boundary-union (every polygon ring, as lines) and the
//! landmass-union (the filled polygons, unioned).

pub mod shp;

pub use shp::read_shapefile;

use geo::{
    coord, unary_union, BoundingRect, Coord, Geometry, Intersects, Line, LineString,
    MultiLineString, MultiPolygon, Polygon, Rect, Relate, Validation,
};
use rstar::{RTree, RTreeObject, AABB};
use tracing::{debug, info, warn};

use crate::error::VectorError;
use crate::proj::{same_crs, CrsTransform};

/// One straight piece of the coastline boundary, indexed by its envelope.
#[derive(Clone, Copy, Debug)]
struct EdgeSegment(Line<f64>);

impl RTreeObject for EdgeSegment {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        let (s, e) = (self.0.start, self.0.end);
        AABB::from_corners([s.x.min(e.x), s.y.min(e.y)], [s.x.max(e.x), s.y.max(e.y)])
    }
}

/// Canonical coastline geometries, read-only once built.
#[derive(Debug)]
pub struct Coastline {
    boundary: MultiLineString<f64>,
    landmass: MultiPolygon<f64>,
    landmass_bbox: Option<Rect<f64>>,
    edges: RTree<EdgeSegment>,
}

/// How raw features are prepared before the unions are built.
#[derive(Clone, Debug, Default)]
pub struct NormalizeOptions {
    /// CRS of the input features. `None` means they already share the raster CRS.
    pub source_crs: Option<String>,
    /// CRS of the raster the tiles come from.
    pub target_crs: Option<String>,
    /// Drop geometry that cannot touch this extent.
    pub clip_to: Option<Rect<f64>>,
}

impl Coastline {
    /// A coastline with no geometry. Every predicate against it is false.
    pub fn empty() -> Self {
        Self::from_polygons(Vec::new())
    }

    /// Build the unions from already-valid polygons.
    pub fn from_polygons(polygons: Vec<Polygon<f64>>) -> Self {
        let boundary: MultiLineString<f64> = polygons
            .iter()
            .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors()))
            .filter(|ring| ring.0.len() >= 2)
            .cloned()
            .collect();

        let landmass = if polygons.is_empty() {
            MultiPolygon::new(Vec::new())
        } else {
            unary_union(&polygons)
        };
        let landmass_bbox = landmass.bounding_rect();

        let edges = RTree::bulk_load(
            boundary
                .iter()
                .flat_map(|ls| ls.lines())
                .map(EdgeSegment)
                .collect(),
        );

        Self {
            boundary,
            landmass,
            landmass_bbox,
            edges,
        }
    }

    pub fn boundary(&self) -> &MultiLineString<f64> {
        &self.boundary
    }

    pub fn landmass(&self) -> &MultiPolygon<f64> {
        &self.landmass
    }

    pub fn is_empty(&self) -> bool {
        self.boundary.0.is_empty()
    }

    /// Whether `rect` intersects the boundary-union (touching counts).
    pub fn boundary_intersects(&self, rect: &Rect<f64>) -> bool {
        if self.is_empty() {
            return false;
        }
        let (min, max) = (rect.min(), rect.max());
        let envelope = AABB::from_corners([min.x, min.y], [max.x, max.y]);
        let area = rect.to_polygon();
        self.edges
            .locate_in_envelope_intersecting(&envelope)
            .any(|edge| area.intersects(&edge.0))
    }

    /// Boundary segments whose envelope meets `rect`.
    pub fn boundary_segments(&self, rect: &Rect<f64>) -> impl Iterator<Item = Line<f64>> + '_ {
        let (min, max) = (rect.min(), rect.max());
        let envelope = AABB::from_corners([min.x, min.y], [max.x, max.y]);
        self.edges
            .locate_in_envelope_intersecting(&envelope)
            .map(|edge| edge.0)
    }

    /// Whether `rect` lies entirely within the landmass-union.
    pub fn landmass_contains(&self, rect: &Rect<f64>) -> bool {
        let Some(land_bbox) = self.landmass_bbox else {
            return false;
        };
        if !rect_covers(&land_bbox, rect) {
            return false;
        }
        rect.to_polygon().relate(&self.landmass).is_within()
    }
}

fn rect_covers(outer: &Rect<f64>, inner: &Rect<f64>) -> bool {
    outer.min().x <= inner.min().x
        && outer.min().y <= inner.min().y
        && outer.max().x >= inner.max().x
        && outer.max().y >= inner.max().y
}

/// Reproject, filter, optionally clip, and union raw coastline features.
///
/// Null, non-polygonal and invalid features are dropped. A feature that
/// fails to reproject is dropped with a warning; an unknown CRS is fatal.
pub fn normalize(
    features: Vec<Option<Geometry<f64>>>,
    options: &NormalizeOptions,
) -> Result<Coastline, VectorError> {
    let total = features.len();

    let transform = match (&options.source_crs, &options.target_crs) {
        (Some(src), Some(dst)) if !same_crs(src, dst) => {
            info!(from = %src, to = %dst, "Reprojecting coastline");
            Some(CrsTransform::new(src, dst)?)
        }
        (Some(src), None) => {
            warn!(crs = %src, "Raster has no CRS, using coastline coordinates as-is");
            None
        }
        _ => None,
    };

    let mut polygons = Vec::new();
    let mut dropped = 0usize;
    for (index, feature) in features.into_iter().enumerate() {
        let Some(geometry) = feature else {
            dropped += 1;
            continue;
        };

        let geometry = match &transform {
            Some(ct) => match ct.transform_geometry(&geometry) {
                Ok(g) => g,
                Err(e) => {
                    warn!(feature = index, error = %e, "Dropping coastline feature that failed to reproject");
                    dropped += 1;
                    continue;
                }
            },
            None => geometry,
        };

        let feature = match geometry {
            Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
            Geometry::MultiPolygon(mp) => mp,
            Geometry::Rect(r) => MultiPolygon::new(vec![r.to_polygon()]),
            other => {
                debug!(feature = index, kind = geometry_kind(&other), "Skipping non-polygonal feature");
                dropped += 1;
                continue;
            }
        };

        // Validity is per feature: overlapping parts invalidate all of them
        if feature.0.is_empty() || !feature.is_valid() {
            debug!(feature = index, "Dropping null or invalid coastline feature");
            dropped += 1;
            continue;
        }
        polygons.extend(feature.0);
    }

    if let Some(extent) = &options.clip_to {
        let before = polygons.len();
        polygons = clip_polygons(polygons, extent);
        debug!(before, after = polygons.len(), "Clipped coastline to raster extent");
    }

    info!(total, kept = total - dropped, polygons = polygons.len(), "Normalized coastline");
    Ok(Coastline::from_polygons(polygons))
}

/// Drop polygons that cannot meet `extent`.
///
/// Rings and segments are never cut, only discarded as a whole. A tile
/// inside the extent therefore sees the same predicate results as without
/// clipping.
fn clip_polygons(polygons: Vec<Polygon<f64>>, extent: &Rect<f64>) -> Vec<Polygon<f64>> {
    polygons
        .into_iter()
        .filter(|p| p.bounding_rect().is_some_and(|b| b.intersects(extent)))
        .collect()
}

fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

/// Rectangle from two corner coordinates, for callers building extents.
pub fn extent(min: (f64, f64), max: (f64, f64)) -> Rect<f64> {
    Rect::new(coord! { x: min.0, y: min.1 }, coord! { x: max.0, y: max.1 })
}

/// Closed ring through `points`, for callers building coastlines by hand.
pub fn ring(points: &[(f64, f64)]) -> LineString<f64> {
    let mut coords: Vec<Coord<f64>> = points.iter().map(|&(x, y)| coord! { x: x, y: y }).collect();
    if let (Some(first), Some(last)) = (coords.first().copied(), coords.last().copied()) {
        if first != last {
            coords.push(first);
        }
    }
    LineString::new(coords)
}
