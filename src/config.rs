//! Run configuration.
//!
//! Built once (from a JSON file, CLI flags, or both) and handed to each stage
//! explicitly.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::content::DEFAULT_MIN_MASK_MEAN;
use crate::error::ConfigError;
use crate::export::OutputPaths;

pub const DEFAULT_TILE_SIZE: usize = 512;
pub const DEFAULT_PLOT_SIZE: u32 = 2048;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Source GeoTIFF.
    pub raster: PathBuf,
    /// Coastline polygon shapefile.
    pub coastline: PathBuf,
    /// CRS of the coastline layer. `None` means it is already in the raster CRS.
    pub coastline_crs: Option<String>,
    pub output_dir: PathBuf,
    /// Tile edge in pixels.
    pub tile_size: usize,
    /// Minimum mean of the 0..=255 validity mask for a tile to count as having imagery.
    pub min_mask_mean: f64,
    /// Drop coastline geometry that cannot reach the raster extent before the unions.
    pub clip_to_raster: bool,
    pub write_tiles: bool,
    pub write_pngs: bool,
    pub write_plot: bool,
    /// Longest side of the diagnostic plot, in pixels.
    pub plot_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            raster: PathBuf::new(),
            coastline: PathBuf::new(),
            coastline_crs: None,
            output_dir: PathBuf::from("output"),
            tile_size: DEFAULT_TILE_SIZE,
            min_mask_mean: DEFAULT_MIN_MASK_MEAN,
            clip_to_raster: true,
            write_tiles: true,
            write_pngs: true,
            write_plot: true,
            plot_size: DEFAULT_PLOT_SIZE,
        }
    }
}

impl Config {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(raster: P, coastline: Q) -> Self {
        Self {
            raster: raster.into(),
            coastline: coastline.into(),
            ..Default::default()
        }
    }

    /// Load a JSON config. Missing fields take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tile_size == 0 {
            return Err(ConfigError::ZeroTileSize);
        }
        if !self.min_mask_mean.is_finite() || !(0.0..=255.0).contains(&self.min_mask_mean) {
            return Err(ConfigError::InvalidThreshold(self.min_mask_mean));
        }
        if self.write_plot && self.plot_size == 0 {
            return Err(ConfigError::ZeroPlotSize);
        }
        Ok(())
    }

    pub fn outputs(&self) -> OutputPaths {
        OutputPaths::new(&self.output_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::new("scene.tif", "coast.shp");
        assert_eq!(config.tile_size, 512);
        assert_eq!(config.min_mask_mean, 10.0);
        assert!(config.clip_to_raster && config.write_tiles && config.write_pngs && config.write_plot);
        assert_eq!(config.outputs().table(), Path::new("output/tiles.csv"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.tile_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroTileSize)));

        let mut config = Config::default();
        config.min_mask_mean = 300.0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidThreshold(_))));
        config.min_mask_mean = f64::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidThreshold(_))));

        let mut config = Config::default();
        config.plot_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroPlotSize)));
        config.write_plot = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        fs::write(
            &path,
            r#"{ "raster": "a.tif", "coastline": "b.shp", "tile_size": 256, "coastline_crs": "EPSG:4326" }"#,
        )
        .unwrap();

        let config = Config::from_json_file(&path).unwrap();
        assert_eq!(config.raster, PathBuf::from("a.tif"));
        assert_eq!(config.tile_size, 256);
        assert_eq!(config.coastline_crs.as_deref(), Some("EPSG:4326"));
        assert_eq!(config.plot_size, DEFAULT_PLOT_SIZE);
    }

    #[test]
    fn test_malformed_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ tile_size: ").unwrap();
        assert!(matches!(Config::from_json_file(&path), Err(ConfigError::Parse(_))));
        assert!(matches!(
            Config::from_json_file(dir.path().join("missing.json")),
            Err(ConfigError::Io(_))
        ));
    }
}
