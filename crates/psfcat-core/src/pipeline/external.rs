use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info, warn};

use crate::catalog::io::read_table;
use crate::catalog::{Catalog, FindStarsRow};
use crate::error::{PsfcatError, Result};

use super::config::{ExternalToolConfig, RunConfig};
use super::unit::UnitSpec;

/// Coarse star/galaxy separation over a unit's detection catalog.
pub trait StarFinder: Send + Sync {
    /// One row per detection in `catalog`, in catalog order, or `None` when
    /// the finder produced no output for this unit.
    fn find_stars(
        &self,
        spec: &UnitSpec,
        root: &str,
        catalog: &Catalog,
    ) -> Result<Option<Vec<FindStarsRow>>>;
}

/// PSF model fitting over a refined star catalog.
pub trait PsfFitter: Send + Sync {
    /// Returns `Ok(false)` when the fitter ran but produced no model.
    fn fit(&self, spec: &UnitSpec, root: &str, catalog: &Path, work: &Path) -> Result<bool>;
}

/// Reads star-finder output that was produced ahead of time.
///
/// Uses the unit's `star_file` when given, otherwise
/// `{root}_findstars.csv` next to the detection catalog.
#[derive(Clone, Copy, Debug, Default)]
pub struct StarFileFinder;

impl StarFileFinder {
    pub fn star_file(spec: &UnitSpec, root: &str) -> PathBuf {
        match &spec.star_file {
            Some(path) => path.clone(),
            None => {
                let dir = spec.catalog.parent().unwrap_or_else(|| Path::new(""));
                dir.join(format!("{root}_findstars.csv"))
            }
        }
    }
}

impl StarFinder for StarFileFinder {
    fn find_stars(
        &self,
        spec: &UnitSpec,
        root: &str,
        catalog: &Catalog,
    ) -> Result<Option<Vec<FindStarsRow>>> {
        let path = Self::star_file(spec, root);
        if !path.exists() {
            warn!(path = %path.display(), "Star finder output not found");
            return Ok(None);
        }
        let rows: Vec<FindStarsRow> = read_table(&path)?;
        if rows.len() != catalog.len() {
            return Err(PsfcatError::SchemaMismatch {
                artifact: path.display().to_string(),
                detail: format!(
                    "{} star-finder rows for {} detections",
                    rows.len(),
                    catalog.len()
                ),
            });
        }
        debug!(path = %path.display(), rows = rows.len(), "Read star finder output");
        Ok(Some(rows))
    }
}

/// Runs a configured program once per unit.
#[derive(Clone, Debug)]
pub struct CommandPsfFitter {
    tool: ExternalToolConfig,
}

impl CommandPsfFitter {
    pub fn new(tool: ExternalToolConfig) -> Self {
        Self { tool }
    }
}

impl PsfFitter for CommandPsfFitter {
    fn fit(&self, _spec: &UnitSpec, root: &str, catalog: &Path, work: &Path) -> Result<bool> {
        let args: Vec<String> = self
            .tool
            .args
            .iter()
            .map(|a| ExternalToolConfig::expand(a, catalog, root, work))
            .collect();
        let output = PathBuf::from(ExternalToolConfig::expand(
            &self.tool.output,
            catalog,
            root,
            work,
        ));

        // A model left by an earlier run must not count as this run's output.
        match std::fs::remove_file(&output) {
            Ok(()) => debug!(output = %output.display(), "Removed previous PSF model"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        info!(program = %self.tool.program.display(), ?args, "Running PSF fitter");
        let status = Command::new(&self.tool.program)
            .args(&args)
            .status()
            .map_err(|e| {
                PsfcatError::ExternalTool(format!("{}: {e}", self.tool.program.display()))
            })?;
        if !status.success() {
            warn!(%status, "PSF fitter exited unsuccessfully");
        }

        let produced = output.exists();
        if !produced {
            warn!(output = %output.display(), "PSF fitter produced no model");
        }
        Ok(produced)
    }
}

/// External collaborators of unit processing. Absent ones are skipped.
#[derive(Default)]
pub struct Collaborators {
    pub star_finder: Option<Box<dyn StarFinder>>,
    pub psf_fitter: Option<Box<dyn PsfFitter>>,
}

impl Collaborators {
    /// File-backed star finder when star finding is enabled, and a
    /// process-backed PSF fitter when one is configured.
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            star_finder: config
                .use_findstars
                .then(|| Box::new(StarFileFinder) as Box<dyn StarFinder>),
            psf_fitter: config
                .psf_fitter
                .clone()
                .map(|tool| Box::new(CommandPsfFitter::new(tool)) as Box<dyn PsfFitter>),
        }
    }
}
