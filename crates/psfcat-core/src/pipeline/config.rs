use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::blacklist::{blacklist_path, RetryPolicy};
use crate::consts::{
    DEFAULT_BLACKLIST_RETRY_MS, DEFAULT_FEW_STARS, DEFAULT_FWHM_HEADER_RATIO, DEFAULT_HEADER_FWHM,
    DEFAULT_HIGH_FWHM, DEFAULT_MANY_STARS_FRAC, DEFAULT_MATCH_TOLERANCE, DEFAULT_NBRIGHT_STARS,
    DEFAULT_SIZE_SPREAD_RATIO, DEFAULT_TAPEBUMP_EXTRA, DEFAULT_ZEROPOINT,
};
use crate::error::{PsfcatError, Result};

/// Everything a batch run needs, normally loaded from TOML.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunConfig {
    /// Directory for intermediate and output catalogs.
    #[serde(default = "default_work")]
    pub work: PathBuf,
    /// Version tag appended to the blacklist file name.
    #[serde(default)]
    pub tag: Option<String>,
    /// Select candidates from star-finder output before refinement.
    #[serde(default = "default_true")]
    pub use_findstars: bool,
    /// Process only the first unit of each exposure.
    #[serde(default)]
    pub single_ccd: bool,
    #[serde(default)]
    pub refine: RefineConfig,
    #[serde(default)]
    pub thresholds: QualityThresholds,
    #[serde(default)]
    pub blacklist: BlacklistConfig,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
    pub psf_fitter: Option<ExternalToolConfig>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            work: default_work(),
            tag: None,
            use_findstars: true,
            single_ccd: false,
            refine: RefineConfig::default(),
            thresholds: QualityThresholds::default(),
            blacklist: BlacklistConfig::default(),
            diagnostics: DiagnosticsConfig::default(),
            psf_fitter: None,
        }
    }
}

impl RunConfig {
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.refine.validate()?;
        if self.thresholds.many_stars_frac <= 0.0 {
            return Err(PsfcatError::Config(
                "thresholds.many_stars_frac must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Blacklist file for this run, including the tag.
    pub fn blacklist_file(&self) -> PathBuf {
        blacklist_path(&self.blacklist.base, self.tag.as_deref())
    }
}

/// Candidate refinement stages. Cuts with a non-positive threshold are off.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RefineConfig {
    /// Drop stars brighter than the median of the brightest `nbright_stars`
    /// plus this many magnitudes.
    #[serde(default = "default_disabled")]
    pub mag_cut: f64,
    #[serde(default = "default_nbright_stars")]
    pub nbright_stars: usize,
    /// Drop stars fainter than this magnitude.
    #[serde(default = "default_disabled")]
    pub max_mag: f64,
    /// Avoid stars in or near tape bumps.
    #[serde(default)]
    pub use_tapebumps: bool,
    /// Extra room around tape bumps, in units of FWHM.
    #[serde(default = "default_tapebump_extra")]
    pub tapebump_extra: f64,
    /// Region file: `unit, row_min, col_min, row_max, col_max` per line.
    #[serde(default)]
    pub tapebump_file: Option<PathBuf>,
    /// Fraction of the surviving stars held out of PSF fitting.
    #[serde(default)]
    pub reserve: f64,
    /// Seed for the reservation split. Unseeded runs draw from the OS.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            mag_cut: -1.0,
            nbright_stars: DEFAULT_NBRIGHT_STARS,
            max_mag: -1.0,
            use_tapebumps: false,
            tapebump_extra: DEFAULT_TAPEBUMP_EXTRA,
            tapebump_file: None,
            reserve: 0.0,
            seed: None,
        }
    }
}

impl RefineConfig {
    /// Whether any stage beyond the quality filter is enabled.
    pub fn any_enabled(&self) -> bool {
        self.mag_cut > 0.0 || self.max_mag > 0.0 || self.use_tapebumps || self.reserve > 0.0
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.reserve) {
            return Err(PsfcatError::Config(format!(
                "refine.reserve must be in [0, 1], got {}",
                self.reserve
            )));
        }
        if self.use_tapebumps && self.tapebump_file.is_none() {
            return Err(PsfcatError::Config(
                "refine.use_tapebumps requires refine.tapebump_file".into(),
            ));
        }
        if self.tapebump_extra < 0.0 {
            return Err(PsfcatError::Config(
                "refine.tapebump_extra must not be negative".into(),
            ));
        }
        Ok(())
    }
}

/// Limits that turn star counts and sizes into quality flags.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    pub few_stars: usize,
    pub many_stars_frac: f64,
    /// Median star FWHM (pixels) considered too high.
    pub high_fwhm: f64,
    /// Largest allowed ratio of star FWHM to header FWHM.
    pub fwhm_header_ratio: f64,
    /// Header FWHM assumed when a unit does not provide one.
    pub default_header_fwhm: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            few_stars: DEFAULT_FEW_STARS,
            many_stars_frac: DEFAULT_MANY_STARS_FRAC,
            high_fwhm: DEFAULT_HIGH_FWHM,
            fwhm_header_ratio: DEFAULT_FWHM_HEADER_RATIO,
            default_header_fwhm: DEFAULT_HEADER_FWHM,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlacklistConfig {
    pub enabled: bool,
    /// File name stem; the tag and `.txt` are appended.
    pub base: PathBuf,
    pub retry_interval_ms: u64,
    /// Give up after this many failed appends. Unset retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for BlacklistConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base: PathBuf::from("blacklists/psfex"),
            retry_interval_ms: DEFAULT_BLACKLIST_RETRY_MS,
            max_attempts: None,
        }
    }
}

impl BlacklistConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            interval: Duration::from_millis(self.retry_interval_ms),
            max_attempts: self.max_attempts,
        }
    }
}

/// Star-selection diagnostics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Magnitude zeropoint added to catalog magnitudes.
    pub zeropoint: f64,
    /// Per-axis pixel tolerance for cross-matching catalogs.
    pub match_tolerance: f64,
    /// Candidate size std / mean above which star finding is flagged.
    pub size_spread_ratio: f64,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            zeropoint: DEFAULT_ZEROPOINT,
            match_tolerance: DEFAULT_MATCH_TOLERANCE,
            size_spread_ratio: DEFAULT_SIZE_SPREAD_RATIO,
        }
    }
}

/// An external program invoked for each unit.
///
/// `{catalog}`, `{root}` and `{work}` in `args` and `output` are replaced
/// per unit. The run counts as successful when `output` exists afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExternalToolConfig {
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    pub output: String,
}

impl ExternalToolConfig {
    pub fn expand(template: &str, catalog: &Path, root: &str, work: &Path) -> String {
        template
            .replace("{catalog}", &catalog.display().to_string())
            .replace("{root}", root)
            .replace("{work}", &work.display().to_string())
    }
}

impl fmt::Display for ExternalToolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

fn default_work() -> PathBuf {
    PathBuf::from("./")
}
fn default_true() -> bool {
    true
}
fn default_disabled() -> f64 {
    -1.0
}
fn default_nbright_stars() -> usize {
    DEFAULT_NBRIGHT_STARS
}
fn default_tapebump_extra() -> f64 {
    DEFAULT_TAPEBUMP_EXTRA
}
