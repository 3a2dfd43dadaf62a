use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use coastal_tiles::{pipeline, Config};

/// Tile a GeoTIFF and classify tiles against a coastline shapefile.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Source GeoTIFF
    #[arg(long)]
    raster: Option<PathBuf>,

    /// Coastline polygon shapefile (.shp)
    #[arg(long)]
    coastline: Option<PathBuf>,

    /// CRS of the coastline layer, e.g. EPSG:4326 (default: the raster CRS)
    #[arg(long)]
    coastline_crs: Option<String>,

    /// Output directory
    #[arg(long)]
    output: Option<PathBuf>,

    /// Tile edge in pixels
    #[arg(long)]
    tile_size: Option<usize>,

    /// Minimum validity-mask mean (0-255) for a tile to count as having imagery
    #[arg(long)]
    min_mask_mean: Option<f64>,

    /// Keep coastline geometry outside the raster extent
    #[arg(long)]
    no_clip: bool,

    /// Skip per-tile GeoTIFFs
    #[arg(long)]
    no_tiles: bool,

    /// Skip per-tile PNGs
    #[arg(long)]
    no_pngs: bool,

    /// Skip the diagnostic plot
    #[arg(long)]
    no_plot: bool,

    /// Longest side of the diagnostic plot in pixels
    #[arg(long)]
    plot_size: Option<u32>,

    /// JSON config file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_json_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => Config::default(),
        };

        if let Some(raster) = self.raster {
            config.raster = raster;
        }
        if let Some(coastline) = self.coastline {
            config.coastline = coastline;
        }
        if self.coastline_crs.is_some() {
            config.coastline_crs = self.coastline_crs;
        }
        if let Some(output) = self.output {
            config.output_dir = output;
        }
        if let Some(tile_size) = self.tile_size {
            config.tile_size = tile_size;
        }
        if let Some(min_mask_mean) = self.min_mask_mean {
            config.min_mask_mean = min_mask_mean;
        }
        if let Some(plot_size) = self.plot_size {
            config.plot_size = plot_size;
        }
        config.clip_to_raster &= !self.no_clip;
        config.write_tiles &= !self.no_tiles;
        config.write_pngs &= !self.no_pngs;
        config.write_plot &= !self.no_plot;

        ensure!(!config.raster.as_os_str().is_empty(), "no raster given (--raster or config file)");
        ensure!(
            !config.coastline.as_os_str().is_empty(),
            "no coastline given (--coastline or config file)"
        );
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let config = cli.into_config()?;
    let summary = pipeline::run(&config).context("coastline tile run failed")?;

    info!(
        "{} tiles: {} intersecting, {} adjacent, {} other -> {}",
        summary.tiles,
        summary.counts.intersecting,
        summary.counts.adjacent,
        summary.counts.other,
        summary.outputs.root().display()
    );
    Ok(())
}
