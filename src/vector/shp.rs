//! ESRI shapefile input for the coastline layer.

use std::path::Path;

use geo::{Coord, Geometry, LineString, MultiPolygon, Polygon};
use shapefile::{PolygonRing, Shape};
use tracing::{debug, info};

use crate::error::VectorError;

/// Read every shape of a `.shp` file as an optional geometry.
///
/// Null shapes and shapes that are not polygons come back as `None`, so the
/// caller sees one entry per record.
pub fn read_shapefile<P: AsRef<Path>>(path: P) -> Result<Vec<Option<Geometry<f64>>>, VectorError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(VectorError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} does not exist", path.display()),
        )));
    }

    let shapes = shapefile::read_shapes(path)?;
    let features: Vec<Option<Geometry<f64>>> = shapes.into_iter().map(shape_to_geometry).collect();

    let polygonal = features.iter().filter(|f| f.is_some()).count();
    info!(path = %path.display(), records = features.len(), polygonal, "Read coastline shapefile");
    Ok(features)
}

pub(crate) fn shape_to_geometry(shape: Shape) -> Option<Geometry<f64>> {
    let polygons = match shape {
        Shape::Polygon(p) => rings_to_polygons(p.rings(), |pt| (pt.x, pt.y)),
        Shape::PolygonM(p) => rings_to_polygons(p.rings(), |pt| (pt.x, pt.y)),
        Shape::PolygonZ(p) => rings_to_polygons(p.rings(), |pt| (pt.x, pt.y)),
        Shape::NullShape => return None,
        other => {
            debug!(shape = ?other.shapetype(), "Ignoring non-polygon shape");
            return None;
        }
    };

    match polygons.len() {
        0 => None,
        1 => polygons.into_iter().next().map(Geometry::Polygon),
        _ => Some(Geometry::MultiPolygon(MultiPolygon::new(polygons))),
    }
}

/// Outer rings open a new polygon, inner rings become holes of the most
/// recent one. A hole with no preceding outer ring is dropped.
fn rings_to_polygons<P>(rings: &[PolygonRing<P>], xy: impl Fn(&P) -> (f64, f64)) -> Vec<Polygon<f64>> {
    let to_line = |points: &[P]| -> LineString<f64> {
        points
            .iter()
            .map(|p| {
                let (x, y) = xy(p);
                Coord { x, y }
            })
            .collect()
    };

    let mut polygons: Vec<(LineString<f64>, Vec<LineString<f64>>)> = Vec::new();
    for ring in rings {
        match ring {
            PolygonRing::Outer(points) => polygons.push((to_line(points), Vec::new())),
            PolygonRing::Inner(points) => {
                if let Some((_, holes)) = polygons.last_mut() {
                    holes.push(to_line(points));
                }
            }
        }
    }

    polygons
        .into_iter()
        .map(|(exterior, holes)| Polygon::new(exterior, holes))
        .collect()
}
