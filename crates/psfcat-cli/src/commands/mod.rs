pub mod config;
pub mod diagnose;
pub mod matching;
pub mod refine;
pub mod run;
pub mod stats;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use psfcat_core::pipeline::config::{RefineConfig, RunConfig};

/// Refinement options shared by `run` and `refine`. Each one overrides the
/// config file when given.
#[derive(Args, Clone, Debug, Default)]
pub struct RefineOpts {
    /// Remove stars this many magnitudes fainter than the brightest stars
    #[arg(long)]
    pub mag_cut: Option<f64>,

    /// Number of brightest stars whose median anchors --mag-cut
    #[arg(long)]
    pub nbright_stars: Option<usize>,

    /// Remove stars fainter than this magnitude
    #[arg(long)]
    pub max_mag: Option<f64>,

    /// Avoid stars in or near tape bumps
    #[arg(long)]
    pub use_tapebumps: bool,

    /// Tape bump region file
    #[arg(long)]
    pub tapebump_file: Option<PathBuf>,

    /// Extra margin around tape bumps, in units of FWHM
    #[arg(long)]
    pub tapebump_extra: Option<f64>,

    /// Fraction of stars to hold out of PSF fitting
    #[arg(long)]
    pub reserve: Option<f64>,

    /// Seed for the reservation split
    #[arg(long)]
    pub seed: Option<u64>,
}

impl RefineOpts {
    pub fn apply(&self, refine: &mut RefineConfig) {
        if let Some(v) = self.mag_cut {
            refine.mag_cut = v;
        }
        if let Some(v) = self.nbright_stars {
            refine.nbright_stars = v;
        }
        if let Some(v) = self.max_mag {
            refine.max_mag = v;
        }
        if self.use_tapebumps {
            refine.use_tapebumps = true;
        }
        if let Some(ref v) = self.tapebump_file {
            refine.tapebump_file = Some(v.clone());
        }
        if let Some(v) = self.tapebump_extra {
            refine.tapebump_extra = v;
        }
        if let Some(v) = self.reserve {
            refine.reserve = v;
        }
        if self.seed.is_some() {
            refine.seed = self.seed;
        }
    }
}

/// Load a run config from TOML, or the defaults when no file is given.
pub fn load_config(path: Option<&Path>) -> Result<RunConfig> {
    match path {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            RunConfig::from_toml(&contents).context("Invalid run config")
        }
        None => Ok(RunConfig::default()),
    }
}
