use thiserror::Error;

#[derive(Error, Debug)]
pub enum RasterError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TIFF decoding error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("Raster has zero extent ({width}x{height})")]
    Empty { width: usize, height: usize },

    #[error("Unsupported raster layout: {0}")]
    Layout(String),

    #[error("GeoTIFF reader lock poisoned by a panicking reader")]
    Poisoned,

    #[error("Window {col_off},{row_off} {width}x{height} is outside the {raster_width}x{raster_height} raster")]
    WindowOutOfBounds {
        col_off: usize,
        row_off: usize,
        width: usize,
        height: usize,
        raster_width: usize,
        raster_height: usize,
    },
}

#[derive(Error, Debug)]
pub enum ProjError {
    #[error("Unknown CRS: {0}")]
    UnknownCrs(String),

    #[error("Transform failed: {0}")]
    TransformFailed(String),
}

#[derive(Error, Debug)]
pub enum VectorError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Shapefile error: {0}")]
    Shapefile(String),

    #[error("Projection error: {0}")]
    Projection(#[from] ProjError),
}

impl From<shapefile::Error> for VectorError {
    fn from(e: shapefile::Error) -> Self {
        VectorError::Shapefile(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Tile size must be > 0")]
    ZeroTileSize,

    #[error("Cannot tile an empty raster ({rows} rows x {cols} cols)")]
    EmptyRaster { rows: usize, cols: usize },
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TIFF encoding error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error(transparent)]
    Raster(#[from] RasterError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("tile_size must be a positive number of pixels")]
    ZeroTileSize,

    #[error("min_mask_mean must be a finite value in 0..=255, got {0}")]
    InvalidThreshold(f64),

    #[error("plot_size must be > 0")]
    ZeroPlotSize,

    #[error("Cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Top-level failure of a pipeline run. Every variant aborts the run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Raster error: {0}")]
    Raster(#[from] RasterError),

    #[error("Coastline error: {0}")]
    Vector(#[from] VectorError),

    #[error("Tiling error: {0}")]
    Plan(#[from] PlanError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),
}
