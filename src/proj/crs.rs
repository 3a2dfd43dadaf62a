use geo::{Coord, Geometry, MapCoords};
use proj4rs::Proj;

use crate::error::ProjError;
use crate::proj::normalize_crs;

/// Thin wrapper around proj4rs that handles radians/degrees conversion transparently.
///
/// proj4rs uses radians for geographic CRS, while shapefiles and GeoTIFF
/// transforms carry degrees. This wrapper converts on the way in and out.
pub struct CrsTransform {
    src: Proj,
    dst: Proj,
    src_is_geo: bool,
    dst_is_geo: bool,
}

impl CrsTransform {
    /// Create a transform from `src_crs` to `dst_crs`.
    ///
    /// Accepts EPSG codes ("EPSG:4326") or PROJ strings ("+proj=utm +zone=33 ...").
    pub fn new(src_crs: &str, dst_crs: &str) -> Result<Self, ProjError> {
        let src = parse(src_crs)?;
        let dst = parse(dst_crs)?;
        let src_is_geo = src.is_latlong();
        let dst_is_geo = dst.is_latlong();
        Ok(Self {
            src,
            dst,
            src_is_geo,
            dst_is_geo,
        })
    }

    /// Transform a single point from source CRS to destination CRS, in CRS
    /// native units (degrees for geographic, metres for projected).
    pub fn transform(&self, x: f64, y: f64) -> Result<(f64, f64), ProjError> {
        let mut point = if self.src_is_geo {
            (x.to_radians(), y.to_radians())
        } else {
            (x, y)
        };

        proj4rs::transform::transform(&self.src, &self.dst, &mut point)
            .map_err(|e| ProjError::TransformFailed(e.to_string()))?;

        let (x, y) = if self.dst_is_geo {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            point
        };
        if !(x.is_finite() && y.is_finite()) {
            return Err(ProjError::TransformFailed(format!(
                "non-finite result for ({x}, {y})"
            )));
        }
        Ok((x, y))
    }

    /// Transform every vertex of a geometry. Fails as a whole if any vertex fails.
    pub fn transform_geometry(&self, geometry: &Geometry<f64>) -> Result<Geometry<f64>, ProjError> {
        geometry.try_map_coords(|c: Coord<f64>| {
            let (x, y) = self.transform(c.x, c.y)?;
            Ok(Coord { x, y })
        })
    }
}

fn parse(crs: &str) -> Result<Proj, ProjError> {
    let normalized = normalize_crs(crs);
    Proj::from_user_string(&normalized).map_err(|e| ProjError::UnknownCrs(format!("{crs}: {e}")))
}
