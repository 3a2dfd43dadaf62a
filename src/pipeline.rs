//! End-to-end run: load, tile, classify, export.
//!
//! Every fatal error surfaces before the first output file is written.
//! Classification finishes completely before export starts.

use std::collections::BTreeMap;
use std::fs;

use geo::Geometry;
use image::RgbImage;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::classify::{classify, Category, CategoryCounts, Classification, RasterContent};
use crate::config::Config;
use crate::content::{ContentValidator, CONTENT_BANDS};
use crate::error::{ExportError, PipelineError, PlanError};
use crate::export::{self, OutputPaths, PlotScene};
use crate::raster::{open_geotiff, RasterSource};
use crate::tile::planner::plan_tiles;
use crate::tile::{Tile, TileId};
use crate::vector::{normalize, read_shapefile, Coastline, NormalizeOptions};

/// What a run produced.
#[derive(Clone, Debug)]
pub struct RunSummary {
    pub tiles: usize,
    pub counts: CategoryCounts,
    pub outputs: OutputPaths,
    pub tiffs_written: usize,
    pub pngs_written: usize,
    pub plot_written: bool,
}

/// Run the whole pipeline described by `config`.
pub fn run(config: &Config) -> Result<RunSummary, PipelineError> {
    config.validate()?;

    let raster = open_geotiff(&config.raster)?;
    info!(
        path = %config.raster.display(),
        width = raster.width(),
        height = raster.height(),
        bands = raster.band_count(),
        crs = raster.crs().unwrap_or("unknown"),
        nodata = ?raster.nodata(),
        "Opened raster"
    );
    let features = read_shapefile(&config.coastline)?;

    run_with_features(&raster, features, config)
}

/// Run the pipeline on an already-open raster and already-read coastline features.
pub fn run_with_features<R: RasterSource + ?Sized>(
    raster: &R,
    features: Vec<Option<Geometry<f64>>>,
    config: &Config,
) -> Result<RunSummary, PipelineError> {
    config.validate()?;

    let coastline = load_coastline(raster, features, config)?;
    let validator = ContentValidator::new(config.min_mask_mean);
    let (tiles, classification) = classify_raster(raster, &coastline, config.tile_size, validator)?;

    let summary = export_outputs(raster, &tiles, &classification, &coastline, config)?;
    info!(
        tiles = summary.tiles,
        intersecting = summary.counts.intersecting,
        adjacent = summary.counts.adjacent,
        other = summary.counts.other,
        output = %summary.outputs.root().display(),
        "Run complete"
    );
    Ok(summary)
}

/// Normalize coastline features into the raster's CRS and extent.
pub fn load_coastline<R: RasterSource + ?Sized>(
    raster: &R,
    features: Vec<Option<Geometry<f64>>>,
    config: &Config,
) -> Result<Coastline, PipelineError> {
    let options = NormalizeOptions {
        source_crs: config.coastline_crs.clone(),
        target_crs: raster.crs().map(str::to_string),
        clip_to: config.clip_to_raster.then(|| raster.bounds()),
    };
    Ok(normalize(features, &options)?)
}

/// Tile `raster` and classify every tile against `coastline`, with content
/// read from the raster itself. Performs no output I/O.
pub fn classify_raster<R: RasterSource + ?Sized>(
    raster: &R,
    coastline: &Coastline,
    tile_size: usize,
    validator: ContentValidator,
) -> Result<(Vec<Tile>, Classification), PlanError> {
    let tiles = plan_tiles(&raster.transform(), (raster.height(), raster.width()), tile_size)?;
    debug!(tiles = tiles.len(), tile_size, "Planned tiles");

    let content = RasterContent::new(raster, validator);
    let classification = classify(&tiles, coastline, &content);
    Ok((tiles, classification))
}

fn export_outputs<R: RasterSource + ?Sized>(
    raster: &R,
    tiles: &[Tile],
    classification: &Classification,
    coastline: &Coastline,
    config: &Config,
) -> Result<RunSummary, ExportError> {
    let outputs = config.outputs();
    fs::create_dir_all(outputs.root())?;

    let rows = export::write_table(outputs.table(), tiles, classification)?;
    debug!(rows, path = %outputs.table().display(), "Wrote tile table");

    let tiffs_written = if config.write_tiles {
        write_tile_tiffs(raster, tiles, &outputs)?
    } else {
        0
    };

    let coastal: Vec<&Tile> = tiles
        .iter()
        .filter(|t| {
            matches!(
                classification.category(t.id),
                Some(Category::Intersecting | Category::Adjacent)
            )
        })
        .collect();

    let mut pngs_written = 0;
    let mut images = BTreeMap::new();
    if config.write_pngs || config.write_plot {
        if config.write_pngs {
            fs::create_dir_all(outputs.pngs_dir())?;
        }
        let rendered: Vec<(TileId, RgbImage)> = coastal
            .par_iter()
            .map(|tile| render_tile(raster, tile, &outputs, config.write_pngs))
            .collect::<Result<_, ExportError>>()?;
        if config.write_pngs {
            pngs_written = rendered.len();
        }
        if config.write_plot {
            images.extend(rendered);
        }
    }

    if config.write_plot {
        let scene = PlotScene {
            extent: raster.bounds(),
            tiles,
            classification,
            coastline,
            images: &images,
        };
        export::write_plot(outputs.plot(), &scene, config.plot_size)?;
        debug!(path = %outputs.plot().display(), "Wrote diagnostic plot");
    }

    Ok(RunSummary {
        tiles: tiles.len(),
        counts: classification.counts(),
        outputs,
        tiffs_written,
        pngs_written,
        plot_written: config.write_plot,
    })
}

fn write_tile_tiffs<R: RasterSource + ?Sized>(
    raster: &R,
    tiles: &[Tile],
    outputs: &OutputPaths,
) -> Result<usize, ExportError> {
    fs::create_dir_all(outputs.tiles_dir())?;
    let bands: Vec<usize> = (0..raster.band_count()).collect();
    let profile = raster.profile();
    tiles.par_iter().try_for_each(|tile| {
        let pixels = raster.read_window(&tile.window, &bands)?;
        export::write_geotiff(outputs.tile_tiff(tile.id), &pixels.view(), &tile.transform, &profile)
    })?;
    debug!(count = tiles.len(), dir = %outputs.tiles_dir().display(), "Wrote tile GeoTIFFs");
    Ok(tiles.len())
}

fn render_tile<R: RasterSource + ?Sized>(
    raster: &R,
    tile: &Tile,
    outputs: &OutputPaths,
    save: bool,
) -> Result<(TileId, RgbImage), ExportError> {
    let pixels = raster.read_window(&tile.window, &CONTENT_BANDS)?;
    let image = if save {
        export::write_png(outputs.tile_png(tile.id), &pixels.view())?
    } else {
        export::to_rgb(&pixels.view())?
    };
    Ok((tile.id, image))
}
