use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use psfcat_core::catalog::Catalog;
use psfcat_core::stats::fwhm_summary;

#[derive(Args)]
pub struct StatsArgs {
    /// Detection catalogs (CSV)
    #[arg(required = true)]
    pub catalogs: Vec<PathBuf>,

    /// Only count clean detections (FLAGS == 0)
    #[arg(long)]
    pub clean: bool,
}

/// Print FWHM statistics (2 * FLUX_RADIUS) of each catalog.
pub fn run(args: &StatsArgs) -> Result<()> {
    println!(
        "{:<40} {:>7} {:>8} {:>8} {:>8} {:>8} {:>8}",
        "Catalog", "N", "Min", "Max", "Mean", "Median", "Std"
    );
    println!("{}", "-".repeat(93));

    for path in &args.catalogs {
        let mut catalog = Catalog::load(path)
            .with_context(|| format!("Failed to read catalog {}", path.display()))?;
        if args.clean {
            catalog = catalog.filter(|d| d.flags == 0);
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match fwhm_summary(&catalog) {
            Ok(s) => println!(
                "{:<40} {:>7} {:>8.3} {:>8.3} {:>8.3} {:>8.3} {:>8.3}",
                name,
                catalog.len(),
                s.min,
                s.max,
                s.mean,
                s.median,
                s.std
            ),
            Err(e) => println!("{:<40} {:>7} {}", name, catalog.len(), e),
        }
    }
    Ok(())
}
