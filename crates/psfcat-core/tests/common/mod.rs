use std::path::{Path, PathBuf};

use psfcat_core::catalog::io::write_table;
use psfcat_core::catalog::{Catalog, Detection, FindStarsRow, UsedStar};
use psfcat_core::pipeline::config::RunConfig;
use psfcat_core::pipeline::UnitSpec;

/// A clean detection with a plausible star size (FWHM 3.0 px).
pub fn star(number: u64, x: f64, y: f64, mag: f64) -> Detection {
    let mut d = Detection::at(number, x, y, mag);
    d.flux_radius = 1.5;
    d
}

/// `n` clean stars on a diagonal, well apart, with magnitudes spread evenly
/// from 15 to 24.
pub fn clean_catalog(n: usize) -> Catalog {
    (0..n)
        .map(|i| {
            let t = if n > 1 { i as f64 / (n - 1) as f64 } else { 0.0 };
            star(i as u64 + 1, 100.0 + 40.0 * i as f64, 200.0 + 40.0 * i as f64, 15.0 + 9.0 * t)
        })
        .collect()
}

/// Star-finder rows aligned with `catalog`, marking the first `ncand` rows as
/// candidates.
pub fn star_rows(catalog: &Catalog, ncand: usize, sigma0: f64) -> Vec<FindStarsRow> {
    catalog
        .iter()
        .enumerate()
        .map(|(i, d)| FindStarsRow {
            x: d.x,
            y: d.y,
            sigma0,
            star_flag: u32::from(i < ncand),
            size_flags: 0,
        })
        .collect()
}

pub fn used_at(points: &[(f64, f64)]) -> Vec<UsedStar> {
    points.iter().map(|&(x, y)| UsedStar { x, y }).collect()
}

/// Write `catalog` as `{root}_psfcat.csv` in `dir`.
pub fn write_catalog(dir: &Path, root: &str, catalog: &Catalog) -> PathBuf {
    let path = dir.join(format!("{root}_psfcat.csv"));
    catalog.save(&path).unwrap();
    path
}

pub fn write_star_rows(dir: &Path, root: &str, rows: &[FindStarsRow]) -> PathBuf {
    let path = dir.join(format!("{root}_findstars.csv"));
    write_table(&path, rows).unwrap();
    path
}

pub fn unit(run: &str, exposure: &str, catalog: PathBuf) -> UnitSpec {
    UnitSpec {
        run: run.to_string(),
        exposure: exposure.to_string(),
        ccdnum: None,
        image: None,
        catalog,
        star_file: None,
        used_file: None,
        fwhm: None,
    }
}

/// Config writing into `dir`, with its blacklist in `dir` too and no
/// refinement beyond the quality filter.
pub fn config_in(dir: &Path) -> RunConfig {
    let mut config = RunConfig::default();
    config.work = dir.join("work");
    config.blacklist.base = dir.join("blacklist");
    config.refine.seed = Some(7);
    config
}

pub fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}
