//! Raster access for the tiler and the content validator.
//!
//! The classifier only needs three things from a raster: a pixel window, the
//! validity mask over the same window, and the geotransform.

pub mod geotiff;
pub mod memory;

pub use geotiff::{open_geotiff, GeoTiffSource};
pub use memory::InMemoryRaster;

use geo::Rect;
use ndarray::{Array2, Array3, ArrayView2, Axis};

use crate::affine::Affine;
use crate::error::RasterError;
use crate::tile::PixelWindow;

/// Mask value for a pixel that carries data.
pub const MASK_VALID: u8 = 255;
/// Mask value for a void pixel.
pub const MASK_VOID: u8 = 0;

/// Storage type of a raster's samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl SampleType {
    /// Map a TIFF SampleFormat (1 uint, 2 int, 3 float) and bit depth.
    pub fn from_tiff(format: u16, bits: u16) -> Option<Self> {
        let sample = match (format, bits) {
            (1, 8) => SampleType::U8,
            (1, 16) => SampleType::U16,
            (1, 32) => SampleType::U32,
            (1, 64) => SampleType::U64,
            (2, 8) => SampleType::I8,
            (2, 16) => SampleType::I16,
            (2, 32) => SampleType::I32,
            (2, 64) => SampleType::I64,
            (3, 32) => SampleType::F32,
            (3, 64) => SampleType::F64,
            _ => return None,
        };
        Some(sample)
    }

    pub fn bits(&self) -> u16 {
        match self {
            SampleType::U8 | SampleType::I8 => 8,
            SampleType::U16 | SampleType::I16 => 16,
            SampleType::U32 | SampleType::I32 | SampleType::F32 => 32,
            SampleType::U64 | SampleType::I64 | SampleType::F64 => 64,
        }
    }

    pub fn byte_len(&self) -> usize {
        usize::from(self.bits() / 8)
    }

    /// TIFF SampleFormat code.
    pub fn tiff_format(&self) -> u16 {
        match self {
            SampleType::U8 | SampleType::U16 | SampleType::U32 | SampleType::U64 => 1,
            SampleType::I8 | SampleType::I16 | SampleType::I32 | SampleType::I64 => 2,
            SampleType::F32 | SampleType::F64 => 3,
        }
    }
}

/// Storage properties a tile inherits from its source raster.
#[derive(Clone, Debug, PartialEq)]
pub struct Profile {
    pub crs: Option<String>,
    pub nodata: Option<f64>,
    pub sample_type: SampleType,
    pub alpha_band: Option<usize>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            crs: None,
            nodata: None,
            sample_type: SampleType::F64,
            alpha_band: None,
        }
    }
}

/// A georeferenced raster that can be read window by window.
pub trait RasterSource: Send + Sync {
    fn width(&self) -> usize;

    fn height(&self) -> usize;

    fn band_count(&self) -> usize;

    fn transform(&self) -> Affine;

    /// CRS identifier understood by proj4rs (e.g. "EPSG:32610"), if known.
    fn crs(&self) -> Option<&str>;

    /// Nodata value shared by all bands.
    fn nodata(&self) -> Option<f64> {
        None
    }

    /// 0-based index of a band flagged as alpha by the source format.
    fn alpha_band(&self) -> Option<usize> {
        None
    }

    fn sample_type(&self) -> SampleType {
        SampleType::F64
    }

    fn profile(&self) -> Profile {
        Profile {
            crs: self.crs().map(str::to_string),
            nodata: self.nodata(),
            sample_type: self.sample_type(),
            alpha_band: self.alpha_band(),
        }
    }

    fn bounds(&self) -> Rect<f64> {
        self.transform()
            .window_bounds(0, 0, self.width(), self.height())
    }

    /// Read `bands` (0-based) over `window` as a (bands, rows, cols) array.
    /// Band indices past the last band are skipped.
    fn read_window(&self, window: &PixelWindow, bands: &[usize]) -> Result<Array3<f64>, RasterError>;

    /// Read the per-pixel validity mask (0 = void, 255 = valid) over `window`.
    fn read_mask(&self, window: &PixelWindow) -> Result<Array2<u8>, RasterError> {
        band_mask(self, window)
    }

    fn check_window(&self, window: &PixelWindow) -> Result<(), RasterError> {
        if window.col_end() > self.width() || window.row_end() > self.height() {
            return Err(RasterError::WindowOutOfBounds {
                col_off: window.col_off,
                row_off: window.row_off,
                width: window.width,
                height: window.height,
                raster_width: self.width(),
                raster_height: self.height(),
            });
        }
        Ok(())
    }
}

/// Validity mask of band 1 the way GDAL derives it without an explicit mask:
/// nodata first, then a flagged alpha band, otherwise every pixel is valid.
pub(crate) fn band_mask<S: RasterSource + ?Sized>(
    source: &S,
    window: &PixelWindow,
) -> Result<Array2<u8>, RasterError> {
    source.check_window(window)?;
    if let Some(nodata) = source.nodata() {
        let band = source.read_window(window, &[0])?;
        return Ok(nodata_mask(band.index_axis(Axis(0), 0), nodata));
    }
    if let Some(alpha) = source.alpha_band() {
        let band = source.read_window(window, &[alpha])?;
        return Ok(alpha_mask(band.index_axis(Axis(0), 0), source.sample_type()));
    }
    Ok(Array2::from_elem((window.height, window.width), MASK_VALID))
}

pub(crate) fn nodata_mask(band: ArrayView2<'_, f64>, nodata: f64) -> Array2<u8> {
    band.mapv(|v| {
        let is_void = if nodata.is_nan() { v.is_nan() } else { v == nodata };
        if is_void {
            MASK_VOID
        } else {
            MASK_VALID
        }
    })
}

/// 16-bit alpha is rescaled to 0..=255.
pub(crate) fn alpha_mask(band: ArrayView2<'_, f64>, sample: SampleType) -> Array2<u8> {
    let divisor = if sample == SampleType::U16 { 257.0 } else { 1.0 };
    band.mapv(|v| {
        if v.is_nan() {
            MASK_VOID
        } else {
            (v / divisor).clamp(0.0, 255.0) as u8
        }
    })
}

/// The requested bands that exist, in request order.
pub(crate) fn present_bands(bands: &[usize], band_count: usize) -> Result<Vec<usize>, RasterError> {
    let present: Vec<usize> = bands.iter().copied().filter(|&b| b < band_count).collect();
    if present.is_empty() {
        return Err(RasterError::Layout(format!(
            "none of bands {bands:?} exist in a {band_count}-band raster"
        )));
    }
    Ok(present)
}
