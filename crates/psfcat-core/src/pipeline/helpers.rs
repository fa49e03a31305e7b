use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use crate::flags::{Anomaly, FlagAccumulator};

use super::config::QualityThresholds;

/// Raise `TooFewStars` when `nstars` is below the minimum, and `TooManyStars`
/// when more than `many_stars_frac` of `total` detections were kept.
/// The second check only runs when the total is known.
pub(super) fn check_star_count(
    nstars: usize,
    total: Option<usize>,
    thresholds: &QualityThresholds,
    flags: &mut FlagAccumulator,
) {
    if nstars < thresholds.few_stars {
        info!(nstars, min = thresholds.few_stars, "Too few stars");
        flags.raise(Anomaly::TooFewStars);
    }
    if let Some(total) = total {
        let limit = thresholds.many_stars_frac * total as f64;
        if nstars as f64 > limit {
            info!(nstars, total, limit, "Too many stars");
            flags.raise(Anomaly::TooManyStars);
        }
    }
}

/// Raise `TooHighFwhm` when the median star FWHM exceeds the absolute limit
/// or the allowed multiple of the header FWHM.
pub(super) fn check_fwhm(
    star_fwhm: f64,
    header_fwhm: f64,
    thresholds: &QualityThresholds,
    flags: &mut FlagAccumulator,
) {
    if star_fwhm > thresholds.high_fwhm {
        info!(star_fwhm, limit = thresholds.high_fwhm, "Mean FWHM too high");
        flags.raise(Anomaly::TooHighFwhm);
    }
    let relative = thresholds.fwhm_header_ratio * header_fwhm;
    if star_fwhm > relative {
        info!(
            star_fwhm,
            header_fwhm,
            ratio = thresholds.fwhm_header_ratio,
            "Mean FWHM too high relative to header FWHM"
        );
        flags.raise(Anomaly::TooHighFwhm);
    }
}

/// Seeded generator for reproducible runs, OS entropy otherwise.
pub fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}
