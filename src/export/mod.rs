//! Output files of a run.

pub mod geotiff;
pub mod plot;
pub mod png;
pub mod table;

use std::path::{Path, PathBuf};

use crate::tile::TileId;

pub use geotiff::write_geotiff;
pub use plot::{render_plot, write_plot, PlotScene};
pub use png::{to_rgb, write_png};
pub use table::write_table;

/// File layout under the output directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputPaths {
    root: PathBuf,
}

impl OutputPaths {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tiles_dir(&self) -> PathBuf {
        self.root.join("tiles")
    }

    pub fn pngs_dir(&self) -> PathBuf {
        self.root.join("pngs")
    }

    pub fn table(&self) -> PathBuf {
        self.root.join("tiles.csv")
    }

    pub fn plot(&self) -> PathBuf {
        self.root.join("coastline_tiles_plot.png")
    }

    pub fn tile_tiff(&self, id: TileId) -> PathBuf {
        self.tiles_dir().join(format!("{}.tif", id.file_stem()))
    }

    pub fn tile_png(&self, id: TileId) -> PathBuf {
        self.pngs_dir().join(format!("{}.png", id.file_stem()))
    }
}
