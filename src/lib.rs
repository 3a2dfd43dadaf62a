//! Coastline tile classification.
//!
//! Cuts a georeferenced raster into a regular grid of tiles and sorts each
//! tile into `intersecting`, `adjacent` or `other` with respect to a
//! coastline polygon layer. See [`pipeline::run`] for the full run and
//! [`classify::classify`] for the core algorithm.

pub mod error;
pub mod affine;
pub mod tile;
pub mod raster;
pub mod proj;
pub mod vector;
pub mod content;
pub mod classify;
pub mod export;
pub mod config;
pub mod pipeline;

pub use classify::{Category, Classification};
pub use config::Config;
pub use pipeline::{run, RunSummary};
