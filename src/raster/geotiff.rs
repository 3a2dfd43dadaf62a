//! Windowed GeoTIFF reading.
//!
//! Pure Rust, no GDAL: georeferencing is rebuilt from the GeoTIFF tags and
//! pixels are decoded one strip or tile at a time, so a window read touches
//! only the chunks that cover it.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use ndarray::Array3;
use tiff::decoder::{ChunkType, Decoder, DecodingResult, Limits};
use tiff::tags::{PlanarConfiguration, Tag};
use tracing::{debug, warn};

use crate::affine::Affine;
use crate::error::RasterError;
use crate::raster::{present_bands, RasterSource, SampleType};
use crate::tile::PixelWindow;

// GeoKey IDs
pub(crate) const GT_MODEL_TYPE_GEO_KEY: u16 = 1024;
pub(crate) const GT_RASTER_TYPE_GEO_KEY: u16 = 1025;
pub(crate) const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
pub(crate) const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;

/// GTRasterTypeGeoKey values.
pub(crate) const RASTER_PIXEL_IS_AREA: u16 = 1;
const RASTER_PIXEL_IS_POINT: u16 = 2;

/// GeoKey value meaning "user-defined", i.e. no EPSG code.
const USER_DEFINED: u16 = 32767;

/// ExtraSamples values marking an alpha channel.
const ASSOCIATED_ALPHA: u16 = 1;
pub(crate) const UNASSOCIATED_ALPHA: u16 = 2;

const COMPRESSION_NONE: u16 = 1;

/// Open a GeoTIFF file for windowed reads.
pub fn open_geotiff<P: AsRef<Path>>(path: P) -> Result<GeoTiffSource<BufReader<File>>, RasterError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let source = GeoTiffSource::new(BufReader::new(file))?;
    debug!(
        path = %path.display(),
        chunk_width = source.layout.chunk_width,
        chunk_height = source.layout.chunk_height,
        direct = source.layout.direct,
        "Opened GeoTIFF"
    );
    Ok(source)
}

/// A GeoTIFF read chunk by chunk through a shared decoder.
pub struct GeoTiffSource<R: Read + Seek> {
    decoder: Mutex<Decoder<R>>,
    layout: ChunkLayout,
    transform: Affine,
    crs: Option<String>,
    nodata: Option<f64>,
    alpha_band: Option<usize>,
}

/// How the first image's samples are laid out on disk.
#[derive(Clone, Debug)]
struct ChunkLayout {
    width: usize,
    height: usize,
    samples: usize,
    planar: bool,
    chunk_width: usize,
    chunk_height: usize,
    sample_type: SampleType,
    /// The tiff decoder can expand these chunks itself. Otherwise the chunks
    /// are uncompressed and read sample by sample.
    direct: bool,
    /// Chunk byte offsets, needed only when not `direct`.
    offsets: Vec<u64>,
}

impl ChunkLayout {
    fn read<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Self, RasterError> {
        let (width, height) = decoder.dimensions()?;
        let (width, height) = (width as usize, height as usize);
        if width == 0 || height == 0 {
            return Err(RasterError::Empty { width, height });
        }

        let samples = usize::from(decoder.find_tag_unsigned::<u16>(Tag::SamplesPerPixel)?.unwrap_or(1));
        let planar = decoder
            .find_tag_unsigned::<u16>(Tag::PlanarConfiguration)?
            .and_then(PlanarConfiguration::from_u16)
            == Some(PlanarConfiguration::Planar);
        let bits = first_or(decoder.find_tag_unsigned_vec::<u16>(Tag::BitsPerSample)?, 1);
        let format = first_or(decoder.find_tag_unsigned_vec::<u16>(Tag::SampleFormat)?, 1);
        let sample_type = SampleType::from_tiff(format, bits).ok_or_else(|| {
            RasterError::Layout(format!("unsupported sample format {format} with {bits} bits"))
        })?;

        let tiled = decoder.get_chunk_type() == ChunkType::Tile;
        let (chunk_width, chunk_height) = decoder.chunk_dimensions();

        // tiff 0.9 expands only gray, RGB(A), CMYK and YCbCr chunks, and
        // miscounts padding on planar tiles past the first plane
        let direct = decoder.colortype().is_ok() && !(planar && tiled);
        let offsets = if direct {
            Vec::new()
        } else {
            let compression = decoder.find_tag_unsigned::<u16>(Tag::Compression)?.unwrap_or(COMPRESSION_NONE);
            if compression != COMPRESSION_NONE {
                return Err(RasterError::Layout(format!(
                    "compressed {samples}-sample GeoTIFF (compression {compression}) is not supported"
                )));
            }
            let tag = if tiled { Tag::TileOffsets } else { Tag::StripOffsets };
            decoder.get_tag_u64_vec(tag)?
        };

        Ok(Self {
            width,
            height,
            samples,
            planar,
            chunk_width: chunk_width as usize,
            chunk_height: chunk_height as usize,
            sample_type,
            direct,
            offsets,
        })
    }

    fn chunks_across(&self) -> usize {
        self.width.div_ceil(self.chunk_width)
    }

    fn chunks_down(&self) -> usize {
        self.height.div_ceil(self.chunk_height)
    }

    /// Chunk index of grid cell (cx, cy) in `plane` (always 0 when chunky).
    fn chunk_index(&self, plane: usize, cx: usize, cy: usize) -> usize {
        plane * self.chunks_across() * self.chunks_down() + cy * self.chunks_across() + cx
    }

    /// Samples per pixel inside one chunk.
    fn chunk_samples(&self) -> usize {
        if self.planar {
            1
        } else {
            self.samples
        }
    }
}

/// Decoded samples of one chunk, row-major with `stride` pixels per row.
struct Chunk {
    values: Vec<f64>,
    stride: usize,
}

impl Chunk {
    /// Copy the part of this chunk that overlaps `window` into `out`.
    /// `picks` pairs an output band with a sample offset within a pixel.
    fn copy_into(
        &self,
        origin: (usize, usize),
        samples: usize,
        window: &PixelWindow,
        picks: &[(usize, usize)],
        out: &mut Array3<f64>,
    ) {
        let (row0, col0) = origin;
        let rows = self.values.len() / (self.stride * samples).max(1);
        let col_end = window.col_end().min(col0 + self.stride);
        for row in window.row_off.max(row0)..window.row_end().min(row0 + rows) {
            for col in window.col_off.max(col0)..col_end {
                let base = ((row - row0) * self.stride + (col - col0)) * samples;
                for &(band, offset) in picks {
                    out[(band, row - window.row_off, col - window.col_off)] = self.values[base + offset];
                }
            }
        }
    }
}

impl<R: Read + Seek> GeoTiffSource<R> {
    /// Read the first image's tags from any seekable reader.
    pub fn new(reader: R) -> Result<Self, RasterError> {
        let mut decoder = Decoder::new(reader)?.with_limits(Limits::unlimited());

        let layout = ChunkLayout::read(&mut decoder)?;
        let geokeys = read_geokeys(&mut decoder)?;
        let mut transform = read_transform(&mut decoder)?;
        if geokeys.as_deref().and_then(|k| geokey(k, GT_RASTER_TYPE_GEO_KEY)) == Some(RASTER_PIXEL_IS_POINT) {
            // Tiepoints name pixel centres: move the origin to the corner
            transform = transform.shifted(-0.5, -0.5);
        }
        let crs = geokeys
            .as_deref()
            .and_then(epsg_from_geokeys)
            .map(|code| format!("EPSG:{code}"));
        let nodata = read_nodata(&mut decoder)?;
        let alpha_band = read_alpha_band(&mut decoder, layout.samples)?;

        Ok(Self {
            decoder: Mutex::new(decoder),
            layout,
            transform,
            crs,
            nodata,
            alpha_band,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Decoder<R>>, RasterError> {
        self.decoder.lock().map_err(|_| RasterError::Poisoned)
    }

    fn read_chunk(&self, decoder: &mut Decoder<R>, index: usize, cell: (usize, usize)) -> Result<Chunk, RasterError> {
        let layout = &self.layout;
        let index_u32 = u32::try_from(index).map_err(|_| RasterError::Layout(format!("chunk {index} out of range")))?;
        if layout.direct {
            let stride = decoder.chunk_data_dimensions(index_u32).0 as usize;
            let values = to_f64_samples(decoder.read_chunk(index_u32)?)?;
            return Ok(Chunk { values, stride });
        }

        let offset = layout
            .offsets
            .get(index)
            .copied()
            .ok_or_else(|| RasterError::Layout(format!("chunk {index} has no offset")))?;
        let row0 = cell.1 * layout.chunk_height;
        let rows = layout.chunk_height.min(layout.height - row0);
        let count = rows * layout.chunk_width * layout.chunk_samples();

        decoder.goto_offset_u64(offset)?;
        let values = (0..count)
            .map(|_| read_sample(decoder, layout.sample_type))
            .collect::<io::Result<Vec<f64>>>()?;
        Ok(Chunk {
            values,
            stride: layout.chunk_width,
        })
    }
}

impl<R: Read + Seek + Send> RasterSource for GeoTiffSource<R> {
    fn width(&self) -> usize {
        self.layout.width
    }

    fn height(&self) -> usize {
        self.layout.height
    }

    fn band_count(&self) -> usize {
        self.layout.samples
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
        self.layout.sample_type
    }

    fn read_window(&self, window: &PixelWindow, bands: &[usize]) -> Result<Array3<f64>, RasterError> {
        self.check_window(window)?;
        let present = present_bands(bands, self.band_count())?;
        let mut out = Array3::zeros((present.len(), window.height, window.width));
        if window.width == 0 || window.height == 0 {
            return Ok(out);
        }

        let layout = &self.layout;
        let samples = layout.chunk_samples();
        let chunky_picks: Vec<(usize, usize)> = present.iter().copied().enumerate().collect();

        let mut decoder = self.lock()?;
        for cy in window.row_off / layout.chunk_height..=(window.row_end() - 1) / layout.chunk_height {
            for cx in window.col_off / layout.chunk_width..=(window.col_end() - 1) / layout.chunk_width {
                let origin = (cy * layout.chunk_height, cx * layout.chunk_width);
                if layout.planar {
                    for (i, &band) in present.iter().enumerate() {
                        let chunk = self.read_chunk(&mut decoder, layout.chunk_index(band, cx, cy), (cx, cy))?;
                        chunk.copy_into(origin, samples, window, &[(i, 0)], &mut out);
                    }
                } else {
                    let chunk = self.read_chunk(&mut decoder, layout.chunk_index(0, cx, cy), (cx, cy))?;
                    chunk.copy_into(origin, samples, window, &chunky_picks, &mut out);
                }
            }
        }
        Ok(out)
    }
}

fn first_or(values: Option<Vec<u16>>, default: u16) -> u16 {
    values.and_then(|v| v.first().copied()).unwrap_or(default)
}

fn read_sample<R: Read + Seek>(decoder: &mut Decoder<R>, sample: SampleType) -> io::Result<f64> {
    let value = match sample {
        SampleType::U8 => f64::from(decoder.read_byte()?),
        SampleType::I8 => f64::from(decoder.read_byte()? as i8),
        SampleType::U16 => f64::from(decoder.read_short()?),
        SampleType::I16 => f64::from(decoder.read_sshort()?),
        SampleType::U32 => f64::from(decoder.read_long()?),
        SampleType::I32 => f64::from(decoder.read_slong()?),
        SampleType::U64 => decoder.read_long8()? as f64,
        SampleType::I64 => decoder.read_slong8()? as f64,
        SampleType::F32 => f64::from(decoder.read_float()?),
        SampleType::F64 => decoder.read_double()?,
    };
    Ok(value)
}

fn to_f64_samples(result: DecodingResult) -> Result<Vec<f64>, RasterError> {
    #[allow(unreachable_patterns)]
    let samples = match result {
        DecodingResult::U8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::F32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::F64(v) => v,
        _ => return Err(RasterError::Layout("unsupported sample format".into())),
    };
    Ok(samples)
}

/// Build the geotransform from ModelTransformation, or from
/// ModelPixelScale + ModelTiepoint.
fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Affine, RasterError> {
    if let Some(value) = decoder.find_tag(Tag::ModelTransformationTag)? {
        let m = value.into_f64_vec()?;
        if m.len() >= 8 {
            return Ok(Affine::new(m[0], m[1], m[3], m[4], m[5], m[7]));
        }
    }

    let scale = decoder
        .find_tag(Tag::ModelPixelScaleTag)?
        .map(|v| v.into_f64_vec())
        .transpose()?;
    let tie = decoder
        .find_tag(Tag::ModelTiepointTag)?
        .map(|v| v.into_f64_vec())
        .transpose()?;

    match (scale, tie) {
        (Some(scale), Some(tie)) if scale.len() >= 2 && tie.len() >= 6 => {
            // Tiepoint (i, j, k, x, y, z) maps pixel (i, j) to world (x, y)
            let (sx, sy) = (scale[0], scale[1]);
            Ok(Affine::new(sx, 0.0, tie[3] - tie[0] * sx, 0.0, -sy, tie[4] + tie[1] * sy))
        }
        _ => {
            warn!("GeoTIFF has no georeferencing tags, using pixel coordinates");
            Ok(Affine::identity())
        }
    }
}

fn read_geokeys<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Option<Vec<u16>>, RasterError> {
    Ok(decoder
        .find_tag(Tag::GeoKeyDirectoryTag)?
        .map(|v| v.into_u16_vec())
        .transpose()?)
}

/// Inline value of `key` in a GeoKeyDirectory.
///
/// Layout: [version, revision, minor, count, (key, location, count, value)*].
/// Keys stored in other tags (location != 0) are not resolved.
pub(crate) fn geokey(keys: &[u16], key: u16) -> Option<u16> {
    let declared = usize::from(*keys.get(3)?);
    keys.get(4..)?
        .chunks_exact(4)
        .take(declared)
        .find(|entry| entry[0] == key && entry[1] == 0)
        .map(|entry| entry[3])
}

/// Projected or geographic EPSG code of a GeoKeyDirectory. A projected code
/// takes precedence over its geographic base.
pub(crate) fn epsg_from_geokeys(keys: &[u16]) -> Option<u16> {
    let usable = |code: u16| code != 0 && code != USER_DEFINED;
    geokey(keys, PROJECTED_CS_TYPE_GEO_KEY)
        .filter(|&c| usable(c))
        .or_else(|| geokey(keys, GEOGRAPHIC_TYPE_GEO_KEY).filter(|&c| usable(c)))
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Option<f64>, RasterError> {
    let Some(value) = decoder.find_tag(Tag::GdalNodata)? else {
        return Ok(None);
    };
    let text = value.into_string()?;
    let text = text.trim_matches(char::from(0)).trim();
    match text.parse::<f64>() {
        Ok(v) => Ok(Some(v)),
        Err(_) if text.eq_ignore_ascii_case("nan") => Ok(Some(f64::NAN)),
        Err(_) => {
            warn!(nodata = text, "Ignoring unparseable GDAL_NODATA tag");
            Ok(None)
        }
    }
}

/// First extra sample flagged as associated or unassociated alpha.
fn read_alpha_band<R: Read + Seek>(decoder: &mut Decoder<R>, samples: usize) -> Result<Option<usize>, RasterError> {
    let Some(extra) = decoder.find_tag_unsigned_vec::<u16>(Tag::ExtraSamples)? else {
        return Ok(None);
    };
    let first_extra = samples.saturating_sub(extra.len());
    Ok(extra
        .iter()
        .position(|&e| e == ASSOCIATED_ALPHA || e == UNASSOCIATED_ALPHA)
        .map(|i| first_extra + i))
}
