//! Star-selection diagnostics: how star-finder candidates relate to the stars
//! the PSF fitter actually used, and whether the candidate sizes are
//! consistent enough to trust the star finder.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, Detection, FindStarsRow, TableSchema, UsedStar};
use crate::consts::{
    MODEST_BRIGHT_MAG, MODEST_CLASS_STAR_MIN, MODEST_FAINT_AUTO_MAG, MODEST_FAINT_PSF_MAG,
    MODEST_LOCUS_MAX,
};
use crate::crossmatch::{cross_match, resolve_each, Resolution};
use crate::error::{PsfcatError, Result};
use crate::flags::{Anomaly, QualityFlags};
use crate::pipeline::config::DiagnosticsConfig;
use crate::stats::{size_summary, Summary};

/// Role of one star-finder row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StarClass {
    Detected,
    Candidate,
    PsfStar,
    BadMeasurement,
}

impl StarClass {
    /// Numeric code written to classification tables.
    pub fn code(self) -> u8 {
        match self {
            Self::Detected => 0,
            Self::Candidate => 1,
            Self::PsfStar => 2,
            Self::BadMeasurement => 4,
        }
    }
}

/// Star-finder rows classified against the PSF fitter's used-star list.
#[derive(Clone, Debug, PartialEq)]
pub struct Classification {
    pub classes: Vec<StarClass>,
    /// `2 sigma0^2` per row.
    pub sizes: Vec<f64>,
    /// Rows the star finder flagged as candidates, bad measurements included.
    pub candidates: Vec<usize>,
    /// Rows matched uniquely by a used star.
    pub used: Vec<usize>,
    /// Used stars with more than one row within tolerance.
    pub ambiguous_used: usize,
    /// Used stars with no row within tolerance.
    pub unmatched_used: usize,
}

/// Classify star-finder rows: candidates are `star_flag == 1`, unreliable
/// size measurements become [`StarClass::BadMeasurement`], and rows a used
/// star resolves to uniquely become [`StarClass::PsfStar`].
///
/// Used stars that match several rows are counted as ambiguous and left out.
pub fn classify_stars(rows: &[FindStarsRow], used: &[UsedStar], tolerance: f64) -> Classification {
    let mut classes: Vec<StarClass> = rows
        .iter()
        .map(|r| {
            if r.is_candidate() {
                StarClass::Candidate
            } else {
                StarClass::Detected
            }
        })
        .collect();
    let candidates: Vec<usize> = (0..rows.len()).filter(|&i| rows[i].is_candidate()).collect();

    for (class, row) in classes.iter_mut().zip(rows) {
        if row.size_flags > 0 {
            *class = StarClass::BadMeasurement;
        }
    }

    let mut used_rows = Vec::with_capacity(used.len());
    let mut ambiguous_used = 0;
    let mut unmatched_used = 0;
    for resolution in resolve_each(used, rows, tolerance) {
        match resolution {
            Resolution::Unique(i) => used_rows.push(i),
            Resolution::Ambiguous(n) => {
                debug!(candidates = n, "Ambiguous used star");
                ambiguous_used += 1;
            }
            Resolution::Unmatched => unmatched_used += 1,
        }
    }
    used_rows.sort_unstable();
    used_rows.dedup();
    for &i in &used_rows {
        classes[i] = StarClass::PsfStar;
    }

    if ambiguous_used > 0 || unmatched_used > 0 {
        warn!(
            ambiguous = ambiguous_used,
            unmatched = unmatched_used,
            "Some used stars could not be located in the star-finder output"
        );
    }

    Classification {
        classes,
        sizes: rows.iter().map(FindStarsRow::size).collect(),
        candidates,
        used: used_rows,
        ambiguous_used,
        unmatched_used,
    }
}

/// Modest star/galaxy test on one detection, with magnitude limits shifted by
/// `zeropoint`. Missing measurements fail the test they feed.
pub fn is_modest(d: &Detection, zeropoint: f64) -> bool {
    let bright = d.class_star.is_some_and(|c| c > MODEST_CLASS_STAR_MIN)
        && d.mag_auto < MODEST_BRIGHT_MAG - zeropoint;
    let locus = match (d.spread_model, d.spreaderr_model) {
        (Some(spread), Some(err)) => spread + 3.0 * err < MODEST_LOCUS_MAX,
        _ => false,
    };
    let faint_psf = d.mag_psf.is_some_and(|m| m > MODEST_FAINT_PSF_MAG - zeropoint)
        && d.mag_auto < MODEST_FAINT_AUTO_MAG - zeropoint;
    (bright || locus) && !faint_psf
}

/// Per star-finder row, whether the uniquely matching detection in
/// `measurements` is a modest star. Rows without a unique match are not.
pub fn modest_flags(
    measurements: &Catalog,
    rows: &[FindStarsRow],
    tolerance: f64,
    zeropoint: f64,
) -> Vec<bool> {
    let mut modest = vec![false; rows.len()];
    let pairs = cross_match(measurements.rows(), rows, tolerance);
    debug!(matched = pairs.len(), rows = rows.len(), "Matched measurements to star-finder rows");
    for pair in pairs {
        modest[pair.b] = is_modest(&measurements.rows()[pair.a], zeropoint);
    }
    modest
}

/// One row of the classification table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedRow {
    pub size: f64,
    pub mag: f64,
    pub flag: u8,
}

impl TableSchema for ClassifiedRow {
    const HEADER: &'static [&'static str] = &["size", "mag", "flag"];
    const REQUIRED: &'static [&'static str] = Self::HEADER;
}

/// Size, magnitude and class per row. `detections` must be the catalog the
/// star finder ran on.
pub fn classification_table(
    classification: &Classification,
    detections: &Catalog,
) -> Result<Vec<ClassifiedRow>> {
    if detections.len() != classification.classes.len() {
        return Err(PsfcatError::SchemaMismatch {
            artifact: "classification".into(),
            detail: format!(
                "{} detections for {} star-finder rows",
                detections.len(),
                classification.classes.len()
            ),
        });
    }
    Ok(classification
        .classes
        .iter()
        .zip(&classification.sizes)
        .zip(detections.iter())
        .map(|((class, &size), d)| ClassifiedRow {
            size,
            mag: d.mag_auto,
            flag: class.code(),
        })
        .collect())
}

/// Size statistics of candidates and used stars for one unit.
#[derive(Clone, Debug, PartialEq)]
pub struct SizeStats {
    pub ncand: usize,
    pub nused: usize,
    pub nused_modest: usize,
    pub nused_not_modest: usize,
    pub cand: Summary,
    pub used: Summary,
}

pub fn size_stats(classification: &Classification, modest: &[bool]) -> Result<SizeStats> {
    let pick = |idx: &[usize]| -> Vec<f64> { idx.iter().map(|&i| classification.sizes[i]).collect() };
    let cand = size_summary(&pick(&classification.candidates))?;
    let used = size_summary(&pick(&classification.used))?;

    let nused_modest = classification
        .used
        .iter()
        .filter(|&&i| modest.get(i).copied().unwrap_or(false))
        .count();
    let nused_not_modest = classification.used.len() - nused_modest;

    Ok(SizeStats {
        ncand: classification.candidates.len(),
        nused: classification.used.len(),
        nused_modest,
        nused_not_modest,
        cand,
        used,
    })
}

/// Whether the candidate sizes scatter more than `ratio` of their mean.
pub fn size_spread_exceeded(cand: &Summary, ratio: f64) -> bool {
    cand.std > ratio * cand.mean
}

/// One row of the per-unit size statistics table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitSizeStats {
    pub run: String,
    pub exposure: String,
    pub ccdnum: u32,
    pub ncand: usize,
    pub nused: usize,
    pub nused_modest: usize,
    pub nused_not_modest: usize,
    pub min_cand: f64,
    pub max_cand: f64,
    pub mean_cand: f64,
    pub std_cand: f64,
    pub median_cand: f64,
    pub min_used: f64,
    pub max_used: f64,
    pub mean_used: f64,
    pub std_used: f64,
    pub median_used: f64,
}

impl UnitSizeStats {
    pub fn new(run: &str, exposure: &str, ccdnum: u32, stats: &SizeStats) -> Self {
        Self {
            run: run.to_string(),
            exposure: exposure.to_string(),
            ccdnum,
            ncand: stats.ncand,
            nused: stats.nused,
            nused_modest: stats.nused_modest,
            nused_not_modest: stats.nused_not_modest,
            min_cand: stats.cand.min,
            max_cand: stats.cand.max,
            mean_cand: stats.cand.mean,
            std_cand: stats.cand.std,
            median_cand: stats.cand.median,
            min_used: stats.used.min,
            max_used: stats.used.max,
            mean_used: stats.used.mean,
            std_used: stats.used.std,
            median_used: stats.used.median,
        }
    }
}

impl TableSchema for UnitSizeStats {
    const HEADER: &'static [&'static str] = &[
        "run",
        "exposure",
        "ccdnum",
        "ncand",
        "nused",
        "nused_modest",
        "nused_not_modest",
        "min_cand",
        "max_cand",
        "mean_cand",
        "std_cand",
        "median_cand",
        "min_used",
        "max_used",
        "mean_used",
        "std_used",
        "median_used",
    ];
    const REQUIRED: &'static [&'static str] = Self::HEADER;
}

/// Everything the diagnostics produce for one unit.
#[derive(Clone, Debug)]
pub struct UnitDiagnostics {
    pub classification: Classification,
    pub modest: Vec<bool>,
    pub stats: SizeStats,
    pub spread_exceeded: bool,
}

impl UnitDiagnostics {
    /// Flags to blacklist the unit with; empty when the sizes look fine.
    pub fn flags(&self) -> QualityFlags {
        if self.spread_exceeded {
            Anomaly::FindStarsFailure.flag()
        } else {
            QualityFlags::empty()
        }
    }
}

/// Classify, cross-match and summarize one unit.
///
/// `measurements` may be any catalog of the same exposure that carries the
/// modest-classification columns.
pub fn diagnose_unit(
    rows: &[FindStarsRow],
    used: &[UsedStar],
    measurements: &Catalog,
    config: &DiagnosticsConfig,
) -> Result<UnitDiagnostics> {
    let classification = classify_stars(rows, used, config.match_tolerance);
    let modest = modest_flags(measurements, rows, config.match_tolerance, config.zeropoint);
    let stats = size_stats(&classification, &modest)?;
    let spread_exceeded = size_spread_exceeded(&stats.cand, config.size_spread_ratio);

    info!(
        ntot = rows.len(),
        ncand = stats.ncand,
        nused = stats.nused,
        nused_modest = stats.nused_modest,
        mean_cand = stats.cand.mean,
        std_cand = stats.cand.std,
        "Star-finder diagnostics"
    );
    if spread_exceeded {
        warn!(
            std_cand = stats.cand.std,
            mean_cand = stats.cand.mean,
            ratio = config.size_spread_ratio,
            "Candidate sizes scatter too much"
        );
    }

    Ok(UnitDiagnostics {
        classification,
        modest,
        stats,
        spread_exceeded,
    })
}
