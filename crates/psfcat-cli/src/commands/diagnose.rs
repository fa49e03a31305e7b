use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use psfcat_core::blacklist::{BlacklistEntry, BlacklistLedger};
use psfcat_core::catalog::io::{read_table, write_table};
use psfcat_core::catalog::{Catalog, FindStarsRow, UsedStar};
use psfcat_core::diagnostics::{classification_table, diagnose_unit, UnitSizeStats};
use psfcat_core::flags::QualityFlags;
use psfcat_core::pipeline::config::RunConfig;
use psfcat_core::pipeline::{BatchManifest, StarFileFinder, UnitSpec};
use tracing::warn;

use super::load_config;

#[derive(Args)]
pub struct DiagnoseArgs {
    /// Unit manifest (TOML, one [[unit]] table per detector unit)
    pub manifest: PathBuf,

    /// Run config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory for per-unit classification tables
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,

    /// Write the per-unit size statistics table here
    #[arg(long)]
    pub stats: Option<PathBuf>,

    /// Blacklist units whose candidate sizes scatter too much
    #[arg(long)]
    pub blacklist: bool,
}

pub fn run(args: &DiagnoseArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let manifest = BatchManifest::load(&args.manifest)
        .with_context(|| format!("Failed to read manifest {}", args.manifest.display()))?;
    std::fs::create_dir_all(&args.output)?;

    let ledger = if args.blacklist {
        let path = config.blacklist_file();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Some(BlacklistLedger::open(path, config.blacklist.retry_policy()))
    } else {
        None
    };

    let mut table = Vec::new();
    for spec in &manifest.units {
        match diagnose(spec, &config, &args.output) {
            Ok((ccdnum, row, flags)) => {
                if let (Some(ledger), false) = (&ledger, flags.is_empty()) {
                    ledger.record_or_log(&BlacklistEntry {
                        run: spec.run.clone(),
                        exposure: spec.exposure.clone(),
                        ccdnum,
                        flags,
                    });
                }
                table.push(row);
            }
            Err(e) => warn!(catalog = %spec.catalog.display(), error = %e, "Skipping unit"),
        }
    }

    println!(
        "{:<12} {:>4} {:>6} {:>6} {:>7} {:>9} {:>9} {:>9}",
        "Exposure", "CCD", "ncand", "nused", "modest", "mean_T", "std_T", "median_T"
    );
    println!("{}", "-".repeat(70));
    for row in &table {
        println!(
            "{:<12} {:>4} {:>6} {:>6} {:>7} {:>9.3} {:>9.3} {:>9.3}",
            row.exposure,
            row.ccdnum,
            row.ncand,
            row.nused,
            row.nused_modest,
            row.mean_cand,
            row.std_cand,
            row.median_cand
        );
    }

    if let Some(ref path) = args.stats {
        write_table(path, &table)
            .with_context(|| format!("Failed to write stats to {}", path.display()))?;
        println!("\nStats saved to {}", path.display());
    }
    Ok(())
}

fn diagnose(
    spec: &UnitSpec,
    config: &RunConfig,
    output: &Path,
) -> Result<(u32, UnitSizeStats, QualityFlags)> {
    let (root, ccdnum) = spec.identify()?;
    let detections = Catalog::load(&spec.catalog)?;
    let rows: Vec<FindStarsRow> = read_table(&StarFileFinder::star_file(spec, &root))?;
    let used_file = spec
        .used_file
        .clone()
        .unwrap_or_else(|| config.work.join(format!("{root}_psfcat.used.csv")));
    let used: Vec<UsedStar> = read_table(&used_file)?;

    let diagnostics = diagnose_unit(&rows, &used, &detections, &config.diagnostics)?;
    let classified = classification_table(&diagnostics.classification, &detections)?;
    write_table(&output.join(format!("{root}_classified.csv")), &classified)?;

    Ok((
        ccdnum,
        UnitSizeStats::new(&spec.run, &spec.exposure, ccdnum, &diagnostics.stats),
        diagnostics.flags(),
    ))
}
