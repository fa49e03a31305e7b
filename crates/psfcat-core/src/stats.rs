use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, Detection};
use crate::error::{PsfcatError, Result};

/// Summary statistics of one numeric column.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    /// Population standard deviation.
    pub std: f64,
}

/// Compute min, max, mean, median and standard deviation of `values`.
///
/// Returns [`PsfcatError::EmptyInput`] instead of NaNs for an empty column.
pub fn summarize(values: ArrayView1<f64>) -> Result<Summary> {
    let mean = values
        .mean()
        .ok_or(PsfcatError::EmptyInput("statistics over an empty column"))?;
    let std = values.std(0.0);

    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(|a, b| a.total_cmp(b));
    let median = median_sorted(&sorted);

    Ok(Summary {
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        mean,
        median,
        std,
    })
}

/// Median of unsorted values, or `None` when empty.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(|a, b| a.total_cmp(b));
    Some(median_sorted(&sorted))
}

/// Blur-width statistics of a catalog, using `2 * FLUX_RADIUS` per row as the
/// FWHM estimate.
pub fn fwhm_summary(catalog: &Catalog) -> Result<Summary> {
    let fwhm = catalog.column(Detection::fwhm_estimate);
    summarize(fwhm.view())
}

/// Statistics of star-finder sizes (`2 sigma0^2`).
pub fn size_summary(sizes: &[f64]) -> Result<Summary> {
    summarize(ArrayView1::from(sizes))
}

fn median_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}
