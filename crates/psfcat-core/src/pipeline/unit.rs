use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::catalog::io::write_table;
use crate::catalog::{parse_unit_file_name, reserve_file_name, ArtifactName, Catalog, ReservedStar};
use crate::consts::CATALOG_INFIX;
use crate::error::{PsfcatError, Result};
use crate::flags::{Anomaly, FlagAccumulator, QualityFlags};
use crate::mask::RegionTable;
use crate::stats::{fwhm_summary, Summary};

use super::config::{QualityThresholds, RunConfig};
use super::external::{Collaborators, StarFinder};
use super::helpers::{check_fwhm, check_star_count, make_rng};
use super::refine::{refine_candidates, RefineContext};
use super::types::StageOutcome;

/// One detector unit of one exposure, as listed in a batch manifest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitSpec {
    pub run: String,
    pub exposure: String,
    /// Detector unit id. Derived from the image or catalog name when absent.
    #[serde(default)]
    pub ccdnum: Option<u32>,
    /// Exposure image the catalog was measured on (`*_NN.fits[.fz]`).
    #[serde(default)]
    pub image: Option<PathBuf>,
    /// Detection catalog.
    pub catalog: PathBuf,
    #[serde(default)]
    pub star_file: Option<PathBuf>,
    /// Stars the PSF fitter reports as used, for diagnostics.
    #[serde(default)]
    pub used_file: Option<PathBuf>,
    /// Header FWHM of the exposure, in pixels.
    #[serde(default)]
    pub fwhm: Option<f64>,
}

impl UnitSpec {
    /// Root name and detector unit id of this unit.
    ///
    /// The image name wins when present; otherwise the catalog stem is used
    /// with any `_psfcat` suffix removed. An explicit `ccdnum` overrides the
    /// number in the name.
    pub fn identify(&self) -> Result<(String, u32)> {
        if let Some(image) = &self.image {
            let (root, ccdnum) = parse_unit_file_name(image)?;
            return Ok((root, self.ccdnum.unwrap_or(ccdnum)));
        }

        let invalid = || PsfcatError::InvalidFileName(self.catalog.display().to_string());
        let stem = self
            .catalog
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(invalid)?;
        let suffix = format!("_{CATALOG_INFIX}");
        let root = stem.strip_suffix(suffix.as_str()).unwrap_or(stem);
        let ccdnum = match self.ccdnum {
            Some(n) => n,
            None => root
                .rsplit('_')
                .next()
                .and_then(|n| n.parse().ok())
                .ok_or_else(invalid)?,
        };
        Ok((root.to_string(), ccdnum))
    }
}

/// A batch of units, loaded from a TOML manifest of `[[unit]]` tables.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BatchManifest {
    #[serde(rename = "unit", default)]
    pub units: Vec<UnitSpec>,
}

impl BatchManifest {
    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }
}

/// Files and measurements produced for one unit.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UnitArtifacts {
    /// Stars in the final catalog.
    pub nstars: usize,
    /// Final catalog handed to the PSF fitter.
    pub catalog: Option<PathBuf>,
    pub reserve: Option<PathBuf>,
    /// FWHM statistics of the final catalog.
    pub star_fwhm: Option<Summary>,
}

/// Outcome of one unit within a batch.
#[derive(Clone, Debug, PartialEq)]
pub struct UnitReport {
    pub run: String,
    pub exposure: String,
    pub root: String,
    pub ccdnum: u32,
    pub flags: QualityFlags,
    pub artifacts: UnitArtifacts,
    /// Error that ended processing, if any.
    pub error: Option<String>,
}

/// Process one detector unit: optional star-finding pass, refinement,
/// FWHM checks and PSF fitting.
///
/// Anomalies are raised on `flags` as they are found; a fatal one ends
/// processing early with `Ok`. `Err` means processing failed outright and
/// `flags` holds whatever was raised before the failure.
pub fn process_unit(
    spec: &UnitSpec,
    root: &str,
    ccdnum: u32,
    config: &RunConfig,
    regions: &RegionTable,
    collaborators: &Collaborators,
    flags: &mut FlagAccumulator,
) -> Result<UnitArtifacts> {
    let detections = Catalog::load(&spec.catalog)?;
    let ntot = detections.len();
    let header_fwhm = spec.fwhm.unwrap_or(config.thresholds.default_header_fwhm);
    info!(root, ccdnum, detections = ntot, header_fwhm, "Processing unit");

    let mut artifacts = UnitArtifacts {
        nstars: ntot,
        catalog: Some(spec.catalog.clone()),
        ..Default::default()
    };
    let mut artifact = ArtifactName::new(root);
    let mut current = detections;
    let mut total_detections = None;

    if let Some(finder) = &collaborators.star_finder {
        let outcome = find_candidates(
            finder.as_ref(),
            spec,
            root,
            &current,
            &config.thresholds,
            flags,
        )?;
        let StageOutcome::Continue(candidates) = outcome else {
            return Ok(artifacts);
        };
        artifact = artifact.with_token("findstars");
        let path = artifact.path_in(&config.work);
        candidates.save(&path)?;
        artifacts.catalog = Some(path);
        artifacts.nstars = candidates.len();
        current = candidates;
        total_detections = Some(ntot);
    }

    if config.refine.any_enabled() {
        let ctx = RefineContext {
            regions: regions.regions_for(ccdnum),
            fwhm: header_fwhm,
            total_detections,
        };
        let mut rng = make_rng(config.refine.seed);
        let outcome = refine_candidates(
            &current,
            &artifact,
            &ctx,
            &config.refine,
            &config.thresholds,
            flags,
            &mut rng,
        );
        let StageOutcome::Continue(refined) = outcome else {
            artifacts.nstars = 0;
            return Ok(artifacts);
        };

        let path = refined.artifact.path_in(&config.work);
        refined.training.save(&path)?;
        artifacts.catalog = Some(path);
        if let Some(reserved) = &refined.reserved {
            let path = config.work.join(reserve_file_name(root));
            let rows: Vec<ReservedStar> = reserved.iter().map(ReservedStar::from).collect();
            write_table(&path, &rows)?;
            artifacts.reserve = Some(path);
        }
        artifacts.nstars = refined.training.len();
        current = refined.training;

        if current.len() <= 1 {
            info!(nstars = current.len(), "Not enough stars left after refinement");
            flags.raise(Anomaly::NoStars);
            return Ok(artifacts);
        }
    }

    if current.is_empty() {
        flags.raise(Anomaly::NoStars);
        return Ok(artifacts);
    }
    let star_fwhm = fwhm_summary(&current)?;
    info!(
        median = star_fwhm.median,
        mean = star_fwhm.mean,
        header_fwhm,
        "FWHM of stars"
    );
    check_fwhm(star_fwhm.median, header_fwhm, &config.thresholds, flags);
    artifacts.star_fwhm = Some(star_fwhm);

    if let (Some(fitter), Some(catalog)) = (&collaborators.psf_fitter, &artifacts.catalog) {
        if !fitter.fit(spec, root, catalog, &config.work)? {
            flags.raise(Anomaly::PsfFitFailure);
        }
    }

    Ok(artifacts)
}

/// Select the star-finder candidates out of `catalog`.
///
/// Missing output is a star-finding failure; no candidates at all ends the
/// unit. Otherwise the candidate count is checked against `catalog`'s size.
/// Output that is not aligned row for row with `catalog` is an error.
pub fn find_candidates(
    finder: &dyn StarFinder,
    spec: &UnitSpec,
    root: &str,
    catalog: &Catalog,
    thresholds: &QualityThresholds,
    flags: &mut FlagAccumulator,
) -> Result<StageOutcome<Catalog>> {
    let Some(rows) = finder.find_stars(spec, root, catalog)? else {
        warn!(root, "Star finding failed");
        flags.raise(Anomaly::FindStarsFailure);
        flags.raise(Anomaly::NoStars);
        return Ok(StageOutcome::Abort(Anomaly::FindStarsFailure));
    };
    if rows.len() != catalog.len() {
        return Err(PsfcatError::SchemaMismatch {
            artifact: format!("{root} star finder output"),
            detail: format!(
                "{} star-finder rows for {} detections",
                rows.len(),
                catalog.len()
            ),
        });
    }

    let candidates: Catalog = catalog
        .iter()
        .zip(&rows)
        .filter(|(_, row)| row.is_candidate())
        .map(|(d, _)| d.clone())
        .collect();
    info!(nstars = candidates.len(), total = catalog.len(), "Found stars");

    if candidates.is_empty() {
        flags.raise(Anomaly::NoStars);
        return Ok(StageOutcome::Abort(Anomaly::NoStars));
    }
    check_star_count(candidates.len(), Some(catalog.len()), thresholds, flags);
    Ok(StageOutcome::Continue(candidates))
}
