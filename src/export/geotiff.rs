//! Per-tile GeoTIFF writer.
//!
//! Tiles keep the source profile: every band, the source sample type and the
//! nodata value. Samples are written pixel-interleaved in uncompressed strips
//! with ModelPixelScale/ModelTiepoint georeferencing and a GeoKeyDirectory
//! carrying the EPSG code when known.

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use ndarray::{s, ArrayView3};
use num_traits::{NumCast, Zero};
use tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKind};
use tiff::tags::{PhotometricInterpretation, PlanarConfiguration, Tag};
use tiff::TiffError;

use crate::affine::Affine;
use crate::error::ExportError;
use crate::proj::normalize_crs;
use crate::raster::geotiff::{
    GEOGRAPHIC_TYPE_GEO_KEY, GT_MODEL_TYPE_GEO_KEY, GT_RASTER_TYPE_GEO_KEY, PROJECTED_CS_TYPE_GEO_KEY,
    RASTER_PIXEL_IS_AREA, UNASSOCIATED_ALPHA,
};
use crate::raster::{Profile, SampleType};

// GeoKey values
const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;

const EXTRA_SAMPLE_UNSPECIFIED: u16 = 0;

/// Target strip size in bytes.
const STRIP_BYTES: usize = 1 << 20;

/// Write a (bands, rows, cols) array to a GeoTIFF file.
pub fn write_geotiff<P: AsRef<Path>>(
    path: P,
    data: &ArrayView3<'_, f64>,
    transform: &Affine,
    profile: &Profile,
) -> Result<(), ExportError> {
    let file = File::create(path)?;
    write_geotiff_to(BufWriter::new(file), data, transform, profile)
}

/// Write a (bands, rows, cols) array as GeoTIFF to any seekable writer.
pub fn write_geotiff_to<W: Write + Seek>(
    mut writer: W,
    data: &ArrayView3<'_, f64>,
    transform: &Affine,
    profile: &Profile,
) -> Result<(), ExportError> {
    let (bands, height, width) = data.dim();
    if bands == 0 || width == 0 || height == 0 {
        return Err(ExportError::InvalidData(format!(
            "cannot write a {bands}-band {width}x{height} tile"
        )));
    }

    {
        let mut encoder = TiffEncoder::new(&mut writer)?;
        let mut dir = encoder.new_directory()?;
        write_directory(&mut dir, data, transform, profile)?;
        dir.finish()?;
    }
    writer.flush()?;
    Ok(())
}

fn write_directory<W: Write + Seek, K: TiffKind>(
    dir: &mut DirectoryEncoder<'_, W, K>,
    data: &ArrayView3<'_, f64>,
    transform: &Affine,
    profile: &Profile,
) -> Result<(), ExportError> {
    let (bands, height, width) = data.dim();
    let sample = profile.sample_type;

    let row_bytes = width * bands * sample.byte_len();
    let rows_per_strip = (STRIP_BYTES / row_bytes).clamp(1, height);
    let mut offsets = Vec::new();
    let mut byte_counts = Vec::new();
    for row0 in (0..height).step_by(rows_per_strip) {
        let rows = row0..(row0 + rows_per_strip).min(height);
        // Pixel-interleaved: (row, col, band)
        let strip = data.slice(s![.., rows, ..]);
        let strip = strip.permuted_axes([1, 2, 0]);
        let offset = write_strip(dir, strip.iter().copied(), sample)?;
        offsets.push(u32::try_from(offset).map_err(TiffError::from)?);
        byte_counts.push(u32::try_from(strip.len() * sample.byte_len()).map_err(TiffError::from)?);
    }

    let (photometric, base_samples) = if sample == SampleType::U8 && (bands == 3 || bands == 4) {
        (PhotometricInterpretation::RGB, 3)
    } else {
        (PhotometricInterpretation::BlackIsZero, 1)
    };

    dir.write_tag(Tag::ImageWidth, u32::try_from(width).map_err(TiffError::from)?)?;
    dir.write_tag(Tag::ImageLength, u32::try_from(height).map_err(TiffError::from)?)?;
    dir.write_tag(Tag::BitsPerSample, &vec![sample.bits(); bands][..])?;
    dir.write_tag(Tag::Compression, 1u16)?;
    dir.write_tag(Tag::PhotometricInterpretation, photometric.to_u16())?;
    dir.write_tag(Tag::StripOffsets, &offsets[..])?;
    dir.write_tag(Tag::SamplesPerPixel, u16::try_from(bands).map_err(TiffError::from)?)?;
    dir.write_tag(Tag::RowsPerStrip, u32::try_from(rows_per_strip).map_err(TiffError::from)?)?;
    dir.write_tag(Tag::StripByteCounts, &byte_counts[..])?;
    dir.write_tag(Tag::PlanarConfiguration, PlanarConfiguration::Chunky.to_u16())?;
    if bands > base_samples {
        let extra: Vec<u16> = (base_samples..bands)
            .map(|band| {
                if profile.alpha_band == Some(band) {
                    UNASSOCIATED_ALPHA
                } else {
                    EXTRA_SAMPLE_UNSPECIFIED
                }
            })
            .collect();
        dir.write_tag(Tag::ExtraSamples, &extra[..])?;
    }
    dir.write_tag(Tag::SampleFormat, &vec![sample.tiff_format(); bands][..])?;
    if let Some(nodata) = profile.nodata {
        dir.write_tag(Tag::GdalNodata, format_nodata(nodata).as_str())?;
    }

    GeoTags::new(transform, profile.crs.as_deref()).write(dir)?;
    Ok(())
}

/// Append one strip in the target sample type, returning its file offset.
fn write_strip<W: Write + Seek, K: TiffKind>(
    dir: &mut DirectoryEncoder<'_, W, K>,
    samples: impl Iterator<Item = f64>,
    sample: SampleType,
) -> Result<u64, TiffError> {
    match sample {
        SampleType::U8 => dir.write_data(cast_all::<u8>(samples).as_slice()),
        SampleType::U16 => dir.write_data(cast_all::<u16>(samples).as_slice()),
        SampleType::U32 => dir.write_data(cast_all::<u32>(samples).as_slice()),
        SampleType::U64 => dir.write_data(cast_all::<u64>(samples).as_slice()),
        SampleType::I8 => dir.write_data(cast_all::<i8>(samples).as_slice()),
        SampleType::I16 => dir.write_data(cast_all::<i16>(samples).as_slice()),
        SampleType::I32 => dir.write_data(cast_all::<i32>(samples).as_slice()),
        SampleType::I64 => dir.write_data(cast_all::<i64>(samples).as_slice()),
        SampleType::F32 => dir.write_data(cast_all::<f32>(samples).as_slice()),
        SampleType::F64 => dir.write_data(cast_all::<f64>(samples).as_slice()),
    }
}

/// Samples read from the same type always fit; anything else becomes zero.
fn cast_all<T: NumCast + Zero>(samples: impl Iterator<Item = f64>) -> Vec<T> {
    samples.map(|v| T::from(v).unwrap_or_else(T::zero)).collect()
}

/// GDAL_NODATA is ASCII; GDAL spells NaN as "nan".
fn format_nodata(nodata: f64) -> String {
    if nodata.is_nan() {
        "nan".to_string()
    } else {
        nodata.to_string()
    }
}

struct GeoTags {
    transform: Affine,
    epsg: Option<u16>,
    geographic: bool,
}

impl GeoTags {
    fn new(transform: &Affine, crs: Option<&str>) -> Self {
        let crs = crs.map(normalize_crs);
        let epsg = crs.as_deref().and_then(parse_epsg_code);
        let geographic = crs
            .as_deref()
            .and_then(|c| proj4rs::Proj::from_user_string(c).ok())
            .map(|p| p.is_latlong())
            .unwrap_or(false);
        Self {
            transform: *transform,
            epsg,
            geographic,
        }
    }

    fn write<W: Write + Seek, K: TiffKind>(
        &self,
        dir: &mut DirectoryEncoder<'_, W, K>,
    ) -> Result<(), ExportError> {
        let t = &self.transform;
        if t.is_rotated() {
            // ModelTransformation: 4x4 row-major matrix
            let matrix = [
                t.a, t.b, 0.0, t.c, t.d, t.e, 0.0, t.f, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0,
            ];
            dir.write_tag(Tag::ModelTransformationTag, matrix.as_slice())?;
        } else {
            let pixel_scale = [t.a, -t.e, 0.0];
            dir.write_tag(Tag::ModelPixelScaleTag, pixel_scale.as_slice())?;

            // Ties pixel (0, 0) to the window origin
            let tiepoint = [0.0, 0.0, 0.0, t.c, t.f, 0.0];
            dir.write_tag(Tag::ModelTiepointTag, tiepoint.as_slice())?;
        }

        let geokeys = self.geokey_directory();
        dir.write_tag(Tag::GeoKeyDirectoryTag, geokeys.as_slice())?;
        Ok(())
    }

    fn geokey_directory(&self) -> Vec<u16> {
        let model = if self.geographic {
            MODEL_TYPE_GEOGRAPHIC
        } else {
            MODEL_TYPE_PROJECTED
        };

        let mut entries = vec![
            [GT_MODEL_TYPE_GEO_KEY, 0, 1, model],
            [GT_RASTER_TYPE_GEO_KEY, 0, 1, RASTER_PIXEL_IS_AREA],
        ];
        if let Some(code) = self.epsg {
            let key = if self.geographic {
                GEOGRAPHIC_TYPE_GEO_KEY
            } else {
                PROJECTED_CS_TYPE_GEO_KEY
            };
            entries.push([key, 0, 1, code]);
        }

        let mut keys = vec![1, 1, 0, entries.len() as u16];
        keys.extend(entries.into_iter().flatten());
        keys
    }
}

fn parse_epsg_code(crs: &str) -> Option<u16> {
    crs.strip_prefix("EPSG:")?.parse().ok()
}
