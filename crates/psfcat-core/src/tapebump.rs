use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::consts::TAPEBUMP_EDGE_CORRECTION;
use crate::mask::Region;

/// Exclusion margin in pixels for a given blur width.
pub fn tapebump_margin(tapebump_extra: f64, fwhm: f64) -> f64 {
    tapebump_extra * fwhm
}

/// Drop every row that lies within `margin` pixels of any of `regions`.
///
/// The half-pixel edge correction is added to `margin` here, so callers pass
/// the FWHM-scaled margin only. Surviving rows keep their order and content.
pub fn exclude_tapebumps(regions: &[Region], catalog: &Catalog, margin: f64) -> Catalog {
    let extra = margin + TAPEBUMP_EDGE_CORRECTION;
    let kept = catalog.filter(|d| !regions.iter().any(|r| r.contains(d.x, d.y, extra)));

    let masked = catalog.len() - kept.len();
    if masked > 0 {
        info!(masked, margin = extra, "Masking stars in or near a tape bump");
        debug!(tapebumps = ?regions, "Tape bumps for this unit");
    }
    kept
}
