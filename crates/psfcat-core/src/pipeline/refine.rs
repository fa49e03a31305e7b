use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info};

use crate::catalog::{ArtifactName, Catalog};
use crate::flags::{Anomaly, FlagAccumulator};
use crate::mask::Region;
use crate::stats::median;
use crate::tapebump::{exclude_tapebumps, tapebump_margin};

use super::config::{QualityThresholds, RefineConfig};
use super::helpers::check_star_count;
use super::types::{RefineStage, StageOutcome};

/// Per-unit inputs to refinement that do not come from configuration.
#[derive(Clone, Copy, Debug)]
pub struct RefineContext<'a> {
    /// Defect regions of this unit.
    pub regions: &'a [Region],
    /// Blur width used to scale the tapebump margin.
    pub fwhm: f64,
    /// Detections the candidates were selected from, when a star-finding
    /// pass ran. Enables the too-many-stars check.
    pub total_detections: Option<usize>,
}

/// Output of a completed refinement.
#[derive(Clone, Debug)]
pub struct RefinedCandidates {
    /// Stars that go on to PSF fitting.
    pub training: Catalog,
    /// Stars held out for validation, when reservation ran.
    pub reserved: Option<Catalog>,
    /// Name of the training catalog, recording every filter applied.
    pub artifact: ArtifactName,
    /// Stages that ran, in order.
    pub stages: Vec<RefineStage>,
}

/// Random partition of a catalog.
#[derive(Clone, Debug)]
pub struct ReservationSplit {
    pub reserved: Catalog,
    pub training: Catalog,
}

/// Run the refinement stages over `catalog` in their fixed order:
/// quality filter, bright-end cut, faint-end cut, tapebump exclusion,
/// reservation split.
///
/// A catalog with no clean detections aborts with [`Anomaly::NoStars`]
/// before any other stage runs. Advisory anomalies are raised on `flags`.
pub fn refine_candidates<R: Rng + ?Sized>(
    catalog: &Catalog,
    artifact: &ArtifactName,
    ctx: &RefineContext<'_>,
    config: &RefineConfig,
    thresholds: &QualityThresholds,
    flags: &mut FlagAccumulator,
    rng: &mut R,
) -> StageOutcome<RefinedCandidates> {
    let mut stages = vec![RefineStage::QualityFilter];
    let mut artifact = artifact.clone();

    let mut data = match quality_filter(catalog) {
        StageOutcome::Continue(data) => data,
        StageOutcome::Abort(anomaly) => {
            flags.raise(anomaly);
            return StageOutcome::Abort(anomaly);
        }
    };

    if config.mag_cut > 0.0 {
        data = bright_cut(&data, config.mag_cut, config.nbright_stars);
        artifact = artifact.with_token(format!("magcut_{:.1}", config.mag_cut));
        stages.push(RefineStage::BrightCut);
    }

    if config.max_mag > 0.0 {
        data = faint_cut(&data, config.max_mag);
        artifact = artifact.with_token(format!("maxmag_{:.1}", config.max_mag));
        stages.push(RefineStage::FaintCut);
    }

    if config.use_tapebumps {
        let margin = tapebump_margin(config.tapebump_extra, ctx.fwhm);
        data = exclude_tapebumps(ctx.regions, &data, margin);
        info!(remaining = data.len(), "After excluding tape bumps");
        artifact = artifact.with_token("tb");
        stages.push(RefineStage::Tapebump);
    }

    let mut reserved = None;
    if config.reserve > 0.0 {
        let split = reserve_split(&data, config.reserve, rng);
        info!(
            reserve = config.reserve,
            reserved = split.reserved.len(),
            remaining = split.training.len(),
            "After reserving stars"
        );
        data = split.training;
        reserved = Some(split.reserved);
        artifact = artifact.with_token(format!("reserve_{:.2}", config.reserve));
        stages.push(RefineStage::Reservation);
    }

    check_star_count(data.len(), ctx.total_detections, thresholds, flags);

    StageOutcome::Continue(RefinedCandidates {
        training: data,
        reserved,
        artifact,
        stages,
    })
}

/// Keep clean detections (`FLAGS == 0`). Aborts when none remain.
pub fn quality_filter(catalog: &Catalog) -> StageOutcome<Catalog> {
    let clean = catalog.filter(|d| d.flags == 0);
    info!(clean = clean.len(), total = catalog.len(), "Stars with FLAGS == 0");
    if clean.is_empty() {
        StageOutcome::Abort(Anomaly::NoStars)
    } else {
        StageOutcome::Continue(clean)
    }
}

/// Drop stars brighter than the median magnitude of the `nbright` brightest
/// plus `mag_cut`. Saturated and nonlinear stars live at the bright end.
pub fn bright_cut(catalog: &Catalog, mag_cut: f64, nbright: usize) -> Catalog {
    let mut mags: Vec<f64> = catalog.iter().map(|d| d.mag_auto).collect();
    mags.sort_unstable_by(|a, b| a.total_cmp(b));
    let brightest = &mags[..nbright.min(mags.len())];
    let Some(min_star) = median(brightest) else {
        return catalog.clone();
    };

    let limit = min_star + mag_cut;
    let kept = catalog.filter(|d| d.mag_auto > limit);
    info!(
        min_mag = mags[0],
        median_brightest = min_star,
        nbright,
        limit,
        remaining = kept.len(),
        "After excluding bright stars"
    );
    kept
}

/// Drop stars fainter than `max_mag`.
pub fn faint_cut(catalog: &Catalog, max_mag: f64) -> Catalog {
    let kept = catalog.filter(|d| d.mag_auto < max_mag);
    info!(max_mag, remaining = kept.len(), "After excluding faint stars");
    kept
}

/// Partition `catalog` by a uniform random permutation: the first
/// `floor(fraction * n)` permuted rows are reserved, the rest are training.
///
/// `fraction` is clamped to `[0, 1]`.
pub fn reserve_split<R: Rng + ?Sized>(
    catalog: &Catalog,
    fraction: f64,
    rng: &mut R,
) -> ReservationSplit {
    let n = catalog.len();
    let n_reserved = ((fraction.clamp(0.0, 1.0) * n as f64).floor() as usize).min(n);

    let mut perm: Vec<usize> = (0..n).collect();
    perm.shuffle(rng);

    let reserved = catalog.select(&perm[..n_reserved]);
    let training = catalog.select(&perm[n_reserved..]);
    debug!(
        reserved_ids = ?reserved.iter().map(|d| d.number).collect::<Vec<_>>(),
        "Reserved star ids"
    );
    ReservationSplit { reserved, training }
}
