use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use psfcat_core::pipeline::{run_batch_reported, BatchManifest, Collaborators, ProgressReporter};

use super::{load_config, RefineOpts};
use crate::progress::BarReporter;
use crate::summary::{print_batch_report, print_run_summary};

#[derive(Args)]
pub struct RunArgs {
    /// Unit manifest (TOML, one [[unit]] table per detector unit)
    pub manifest: PathBuf,

    /// Run config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Work directory for output catalogs
    #[arg(long)]
    pub work: Option<PathBuf>,

    /// Version tag for the blacklist file name
    #[arg(long)]
    pub tag: Option<String>,

    /// Skip the star-finding pass
    #[arg(long)]
    pub no_findstars: bool,

    /// Only process the first unit of each exposure
    #[arg(long)]
    pub single_ccd: bool,

    /// Do not write flagged units to the blacklist
    #[arg(long)]
    pub no_blacklist: bool,

    #[command(flatten)]
    pub refine: RefineOpts,
}

pub fn run(args: &RunArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(ref work) = args.work {
        config.work = work.clone();
    }
    if args.tag.is_some() {
        config.tag = args.tag.clone();
    }
    if args.no_findstars {
        config.use_findstars = false;
    }
    if args.single_ccd {
        config.single_ccd = true;
    }
    if args.no_blacklist {
        config.blacklist.enabled = false;
    }
    args.refine.apply(&mut config.refine);
    config.validate().context("Invalid run config")?;

    let manifest = BatchManifest::load(&args.manifest)
        .with_context(|| format!("Failed to read manifest {}", args.manifest.display()))?;

    print_run_summary(&config, manifest.units.len());

    let collaborators = Collaborators::from_config(&config);
    let bar = Arc::new(BarReporter::new()?);
    let reporter: Arc<dyn ProgressReporter> = bar.clone();
    let summary = run_batch_reported(&manifest.units, &config, &collaborators, reporter)?;
    bar.finish();

    print_batch_report(&summary);
    Ok(())
}
