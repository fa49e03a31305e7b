use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use psfcat_core::catalog::io::write_table;
use psfcat_core::catalog::{reserve_file_name, ArtifactName, Catalog, ReservedStar};
use psfcat_core::flags::FlagAccumulator;
use psfcat_core::mask::RegionTable;
use psfcat_core::pipeline::{make_rng, refine_candidates, RefineContext, StageOutcome, UnitSpec};

use super::{load_config, RefineOpts};

#[derive(Args)]
pub struct RefineArgs {
    /// Detection catalog (CSV)
    pub catalog: PathBuf,

    /// Run config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Detector unit id, if the catalog name does not end in _NN
    #[arg(long)]
    pub ccdnum: Option<u32>,

    /// Header FWHM in pixels
    #[arg(long)]
    pub fwhm: Option<f64>,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,

    #[command(flatten)]
    pub refine: RefineOpts,
}

/// Refine a single catalog without star finding, fitting or blacklisting.
pub fn run(args: &RefineArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    args.refine.apply(&mut config.refine);
    config.refine.validate().context("Invalid refine options")?;

    let spec = UnitSpec {
        run: String::new(),
        exposure: String::new(),
        ccdnum: args.ccdnum,
        image: None,
        catalog: args.catalog.clone(),
        star_file: None,
        used_file: None,
        fwhm: args.fwhm,
    };
    let (root, ccdnum) = spec.identify()?;

    let catalog = Catalog::load(&args.catalog)
        .with_context(|| format!("Failed to read catalog {}", args.catalog.display()))?;
    let regions = match (&config.refine.tapebump_file, config.refine.use_tapebumps) {
        (Some(path), true) => RegionTable::load(path)?,
        _ => RegionTable::default(),
    };
    let ctx = RefineContext {
        regions: regions.regions_for(ccdnum),
        fwhm: args.fwhm.unwrap_or(config.thresholds.default_header_fwhm),
        total_detections: None,
    };

    let mut flags = FlagAccumulator::new();
    let mut rng = make_rng(config.refine.seed);
    let outcome = refine_candidates(
        &catalog,
        &ArtifactName::new(&root),
        &ctx,
        &config.refine,
        &config.thresholds,
        &mut flags,
        &mut rng,
    );

    println!("Refining {} ({} detections)", root, catalog.len());
    match outcome {
        StageOutcome::Continue(refined) => {
            std::fs::create_dir_all(&args.output)?;
            for stage in &refined.stages {
                println!("  {stage}");
            }
            let path = refined.artifact.path_in(&args.output);
            refined.training.save(&path)?;
            println!(
                "\n{} stars written to {}",
                refined.training.len(),
                path.display()
            );
            if let Some(reserved) = refined.reserved {
                let path = args.output.join(reserve_file_name(&root));
                let rows: Vec<ReservedStar> = reserved.iter().map(ReservedStar::from).collect();
                write_table(&path, &rows)?;
                println!("{} reserved stars written to {}", rows.len(), path.display());
            }
        }
        StageOutcome::Abort(anomaly) => println!("\nAborted: {anomaly}"),
    }

    if !flags.is_clean() {
        let names: Vec<String> = flags.anomalies().iter().map(|a| a.to_string()).collect();
        println!("Flags: {} ({})", flags.flags().bits(), names.join(", "));
    }
    Ok(())
}
