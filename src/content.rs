//! Content validator: does a tile carry real imagery?
//!
//! A tile is rejected when every sample is exactly zero, when every sample is
//! NaN, or when its validity mask (0..=255) averages below a coverage
//! threshold. Rejected tiles never count as coastal, which keeps nodata
//! padding at the raster edge from being classified just because its bounding
//! box touches the coastline.

use std::fmt;

use ndarray::{ArrayView2, ArrayView3};
use tracing::warn;

use crate::raster::RasterSource;
use crate::tile::Tile;

/// Default minimum mask mean, on the 0..=255 mask scale (~4% valid coverage).
pub const DEFAULT_MIN_MASK_MEAN: f64 = 10.0;

/// Bands inspected for content: the three display bands.
pub const CONTENT_BANDS: [usize; 3] = [0, 1, 2];

/// Outcome of inspecting one tile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ContentVerdict {
    Valid,
    AllZero,
    AllNan,
    LowCoverage { mask_mean: f64 },
    /// The pixel window or mask could not be read.
    Unreadable,
}

impl ContentVerdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, ContentVerdict::Valid)
    }
}

impl fmt::Display for ContentVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentVerdict::Valid => write!(f, "valid"),
            ContentVerdict::AllZero => write!(f, "all zero"),
            ContentVerdict::AllNan => write!(f, "all NaN"),
            ContentVerdict::LowCoverage { mask_mean } => write!(f, "mask mean {mask_mean:.2}"),
            ContentVerdict::Unreadable => write!(f, "unreadable"),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ContentValidator {
    min_mask_mean: f64,
}

impl Default for ContentValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_MASK_MEAN)
    }
}

impl ContentValidator {
    pub fn new(min_mask_mean: f64) -> Self {
        Self { min_mask_mean }
    }

    /// Judge already-read pixels (bands, rows, cols) and mask (rows, cols).
    ///
    /// An empty pixel array counts as all zero. An empty mask has no
    /// coverage.
    pub fn evaluate(&self, pixels: &ArrayView3<'_, f64>, mask: &ArrayView2<'_, u8>) -> ContentVerdict {
        if pixels.iter().all(|&v| v == 0.0) {
            return ContentVerdict::AllZero;
        }
        if pixels.iter().all(|v| v.is_nan()) {
            return ContentVerdict::AllNan;
        }

        let mask_mean = if mask.is_empty() {
            0.0
        } else {
            mask.iter().map(|&m| f64::from(m)).sum::<f64>() / mask.len() as f64
        };
        if mask_mean < self.min_mask_mean {
            return ContentVerdict::LowCoverage { mask_mean };
        }

        ContentVerdict::Valid
    }

    /// Read a tile's display bands and mask from `raster` and judge them.
    /// Read failures are logged and reported as [`ContentVerdict::Unreadable`].
    pub fn inspect<R: RasterSource + ?Sized>(&self, raster: &R, tile: &Tile) -> ContentVerdict {
        let pixels = match raster.read_window(&tile.window, &CONTENT_BANDS) {
            Ok(p) => p,
            Err(e) => {
                warn!(tile = %tile.id, error = %e, "Cannot read tile pixels");
                return ContentVerdict::Unreadable;
            }
        };
        let mask = match raster.read_mask(&tile.window) {
            Ok(m) => m,
            Err(e) => {
                warn!(tile = %tile.id, error = %e, "Cannot read tile mask");
                return ContentVerdict::Unreadable;
            }
        };
        self.evaluate(&pixels.view(), &mask.view())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::affine::Affine;
    use crate::raster::InMemoryRaster;
    use crate::tile::planner::plan_tiles;
    use ndarray::{array, Array2, Array3};

    fn full_mask(rows: usize, cols: usize) -> Array2<u8> {
        Array2::from_elem((rows, cols), 255)
    }

    #[test]
    fn test_valid_imagery() {
        let pixels = Array3::from_elem((3, 4, 4), 87.0);
        let verdict = ContentValidator::default().evaluate(&pixels.view(), &full_mask(4, 4).view());
        assert_eq!(verdict, ContentVerdict::Valid);
        assert!(verdict.is_valid());
    }

    #[test]
    fn test_all_zero_rejected() {
        let pixels = Array3::zeros((3, 4, 4));
        let verdict = ContentValidator::default().evaluate(&pixels.view(), &full_mask(4, 4).view());
        assert_eq!(verdict, ContentVerdict::AllZero);
    }

    #[test]
    fn test_all_nan_rejected() {
        let pixels = Array3::from_elem((3, 2, 2), f64::NAN);
        let verdict = ContentValidator::default().evaluate(&pixels.view(), &full_mask(2, 2).view());
        assert_eq!(verdict, ContentVerdict::AllNan);
    }

    #[test]
    fn test_mixed_zero_and_nan_is_not_rejected_by_value() {
        let pixels = array![[[0.0, f64::NAN]]];
        let verdict = ContentValidator::default().evaluate(&pixels.view(), &full_mask(1, 2).view());
        assert_eq!(verdict, ContentVerdict::Valid);
    }

    #[test]
    fn test_low_mask_coverage_rejected() {
        // 3 valid pixels out of 100 -> mean 7.65
        let pixels = Array3::from_elem((3, 10, 10), 120.0);
        let mut mask = Array2::zeros((10, 10));
        for c in 0..3 {
            mask[(0, c)] = 255;
        }
        let verdict = ContentValidator::default().evaluate(&pixels.view(), &mask.view());
        match verdict {
            ContentVerdict::LowCoverage { mask_mean } => assert!((mask_mean - 7.65).abs() < 1e-9),
            other => panic!("unexpected verdict {other:?}"),
        }
    }

    #[test]
    fn test_threshold_is_strict_less_than() {
        // Mean exactly 10 passes
        let pixels = Array3::from_elem((1, 1, 2), 1.0);
        let mask = array![[0u8, 20]];
        assert!(ContentValidator::new(10.0).evaluate(&pixels.view(), &mask.view()).is_valid());
        assert!(!ContentValidator::new(10.5).evaluate(&pixels.view(), &mask.view()).is_valid());
    }

    #[test]
    fn test_empty_tile_is_all_zero() {
        let pixels = Array3::<f64>::zeros((3, 0, 0));
        let mask = Array2::<u8>::zeros((0, 0));
        assert_eq!(
            ContentValidator::default().evaluate(&pixels.view(), &mask.view()),
            ContentVerdict::AllZero
        );
    }

    #[test]
    fn test_inspect_reads_from_raster() {
        let mut data = Array3::zeros((3, 4, 8));
        data.slice_mut(ndarray::s![.., .., 4..]).fill(200.0);
        let raster = InMemoryRaster::new(data, Affine::identity()).unwrap();
        let tiles = plan_tiles(&Affine::identity(), (4, 8), 4).unwrap();
        let validator = ContentValidator::default();

        assert_eq!(validator.inspect(&raster, &tiles[0]), ContentVerdict::AllZero);
        assert_eq!(validator.inspect(&raster, &tiles[1]), ContentVerdict::Valid);
    }

    #[test]
    fn test_dark_nir_band_does_not_reject_imagery() {
        let mut data = Array3::from_elem((4, 4, 4), 90.0);
        data.slice_mut(ndarray::s![3, .., ..]).fill(5.0);
        let raster = InMemoryRaster::new(data, Affine::identity()).unwrap();
        let tiles = plan_tiles(&Affine::identity(), (4, 4), 4).unwrap();
        assert_eq!(ContentValidator::default().inspect(&raster, &tiles[0]), ContentVerdict::Valid);
    }

    #[test]
    fn test_nodata_rejects_despite_opaque_alpha() {
        let mut data = Array3::from_elem((4, 4, 4), 0.0);
        data.slice_mut(ndarray::s![1..3, .., ..]).fill(60.0);
        data.slice_mut(ndarray::s![3, .., ..]).fill(255.0);
        let raster = InMemoryRaster::new(data, Affine::identity())
            .unwrap()
            .with_nodata(Some(0.0))
            .with_alpha_band(3)
            .unwrap();
        let tiles = plan_tiles(&Affine::identity(), (4, 4), 4).unwrap();
        assert_eq!(
            ContentValidator::default().inspect(&raster, &tiles[0]),
            ContentVerdict::LowCoverage { mask_mean: 0.0 }
        );
    }

    #[test]
    fn test_inspect_unreadable_window() {
        let raster = InMemoryRaster::new(Array3::from_elem((3, 4, 4), 1.0), Affine::identity()).unwrap();
        // Planned against a larger raster than the one read
        let tiles = plan_tiles(&Affine::identity(), (8, 8), 8).unwrap();
        assert_eq!(
            ContentValidator::default().inspect(&raster, &tiles[0]),
            ContentVerdict::Unreadable
        );
    }
}
