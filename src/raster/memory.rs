//! Raster held entirely in memory as a (bands, rows, cols) array.

use ndarray::{s, Array2, Array3, Axis};

use crate::affine::Affine;
use crate::error::RasterError;
use crate::raster::{band_mask, present_bands, RasterSource, SampleType};
use crate::tile::PixelWindow;

/// In-memory raster.
///
/// The validity mask follows the GDAL convention used by rasterio's
/// `read_masks`: an explicit mask wins, then the nodata value of band 1,
/// then a band flagged as alpha. Without any of these every pixel is valid.
#[derive(Clone, Debug)]
pub struct InMemoryRaster {
    data: Array3<f64>,
    transform: Affine,
    crs: Option<String>,
    nodata: Option<f64>,
    alpha_band: Option<usize>,
    sample_type: SampleType,
    mask: Option<Array2<u8>>,
}

impl InMemoryRaster {
    /// Wrap a (bands, rows, cols) array.
    pub fn new(data: Array3<f64>, transform: Affine) -> Result<Self, RasterError> {
        let (bands, rows, cols) = data.dim();
        if rows == 0 || cols == 0 {
            return Err(RasterError::Empty {
                width: cols,
                height: rows,
            });
        }
        if bands == 0 {
            return Err(RasterError::Layout("raster has no bands".into()));
        }
        Ok(Self {
            data,
            transform,
            crs: None,
            nodata: None,
            alpha_band: None,
            sample_type: SampleType::F64,
            mask: None,
        })
    }

    pub fn with_crs(mut self, crs: impl Into<String>) -> Self {
        self.crs = Some(crs.into());
        self
    }

    pub fn with_nodata(mut self, nodata: Option<f64>) -> Self {
        self.nodata = nodata;
        self
    }

    /// Flag a band as alpha. Only a flagged band ever feeds the mask.
    pub fn with_alpha_band(mut self, band: usize) -> Result<Self, RasterError> {
        if band >= self.band_count() {
            return Err(RasterError::Layout(format!(
                "alpha band {band} does not exist in a {}-band raster",
                self.band_count()
            )));
        }
        self.alpha_band = Some(band);
        Ok(self)
    }

    /// Storage type the samples came from, carried to written tiles.
    pub fn with_sample_type(mut self, sample_type: SampleType) -> Self {
        self.sample_type = sample_type;
        self
    }

    /// Attach an explicit (rows, cols) validity mask.
    pub fn with_mask(mut self, mask: Array2<u8>) -> Result<Self, RasterError> {
        let (_, rows, cols) = self.data.dim();
        if mask.dim() != (rows, cols) {
            return Err(RasterError::Layout(format!(
                "mask shape {:?} does not match raster shape {:?}",
                mask.dim(),
                (rows, cols)
            )));
        }
        self.mask = Some(mask);
        Ok(self)
    }
}

impl RasterSource for InMemoryRaster {
    fn width(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    fn height(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    fn band_count(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    fn transform(&self) -> Affine {
        self.transform
    }

    fn crs(&self) -> Option<&str> {
        self.crs.as_deref()
    }

    fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    fn alpha_band(&self) -> Option<usize> {
        self.alpha_band
    }

    fn sample_type(&self) -> SampleType {
        self.sample_type
    }

    fn read_window(&self, window: &PixelWindow, bands: &[usize]) -> Result<Array3<f64>, RasterError> {
        self.check_window(window)?;

        let present = present_bands(bands, self.band_count())?;

        let rows = window.row_off..window.row_end();
        let cols = window.col_off..window.col_end();
        Ok(self
            .data
            .select(Axis(0), &present)
            .slice(s![.., rows, cols])
            .to_owned())
    }

    fn read_mask(&self, window: &PixelWindow) -> Result<Array2<u8>, RasterError> {
        self.check_window(window)?;
        match &self.mask {
            Some(mask) => Ok(mask
                .slice(s![window.row_off..window.row_end(), window.col_off..window.col_end()])
                .to_owned()),
            None => band_mask(self, window),
        }
    }
}
