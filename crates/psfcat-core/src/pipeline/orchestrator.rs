use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::blacklist::{BlacklistEntry, BlacklistLedger};
use crate::error::Result;
use crate::flags::{Anomaly, FlagAccumulator};
use crate::mask::RegionTable;

use super::config::RunConfig;
use super::external::Collaborators;
use super::types::{NoOpReporter, PipelineStage, ProgressReporter};
use super::unit::{process_unit, UnitReport, UnitSpec};

/// Everything a batch run produced.
#[derive(Clone, Debug, Default)]
pub struct BatchSummary {
    /// One report per processed unit, in manifest order.
    pub reports: Vec<UnitReport>,
    /// Catalogs whose unit could not be identified.
    pub skipped: Vec<PathBuf>,
    /// Blacklist file, when blacklisting is enabled.
    pub blacklist: Option<PathBuf>,
    /// Entries appended to the blacklist.
    pub blacklisted: usize,
}

impl BatchSummary {
    pub fn flagged(&self) -> impl Iterator<Item = &UnitReport> {
        self.reports.iter().filter(|r| !r.flags.is_empty())
    }
}

/// Run a batch without progress reporting.
pub fn run_batch(
    units: &[UnitSpec],
    config: &RunConfig,
    collaborators: &Collaborators,
) -> Result<BatchSummary> {
    run_batch_reported(units, config, collaborators, Arc::new(NoOpReporter))
}

/// Process `units` one after another.
///
/// A failing unit never stops the batch: its error becomes an
/// `UNCLASSIFIED_ERROR` flag on top of anything already raised. Units with
/// nonzero flags are appended to the blacklist when it is enabled.
pub fn run_batch_reported(
    units: &[UnitSpec],
    config: &RunConfig,
    collaborators: &Collaborators,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<BatchSummary> {
    config.validate()?;

    reporter.begin_stage(PipelineStage::ReadingRegions, None);
    let regions = match (&config.refine.tapebump_file, config.refine.use_tapebumps) {
        (Some(path), true) => RegionTable::load(path)?,
        _ => RegionTable::default(),
    };
    reporter.finish_stage();

    std::fs::create_dir_all(&config.work)?;

    let ledger = if config.blacklist.enabled {
        let path = config.blacklist_file();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        info!(path = %path.display(), "Blacklisting flagged units");
        Some(BlacklistLedger::open(path, config.blacklist.retry_policy()))
    } else {
        None
    };

    let mut summary = BatchSummary {
        blacklist: ledger.as_ref().map(|l| l.location().to_path_buf()),
        ..Default::default()
    };
    let mut seen_exposures: HashSet<(&str, &str)> = HashSet::new();

    reporter.begin_stage(PipelineStage::ProcessingUnits, Some(units.len()));
    for (i, spec) in units.iter().enumerate() {
        reporter.advance(i);

        let exposure_key = (spec.run.as_str(), spec.exposure.as_str());
        if config.single_ccd && seen_exposures.contains(&exposure_key) {
            debug!(run = %spec.run, exposure = %spec.exposure, "Single unit per exposure, skipping");
            continue;
        }

        let (root, ccdnum) = match spec.identify() {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, catalog = %spec.catalog.display(), "Unable to identify unit, skipping");
                summary.skipped.push(spec.catalog.clone());
                continue;
            }
        };
        seen_exposures.insert(exposure_key);

        let mut flags = FlagAccumulator::new();
        let (artifacts, failure) =
            match process_unit(spec, &root, ccdnum, config, &regions, collaborators, &mut flags) {
                Ok(artifacts) => (artifacts, None),
                Err(e) => {
                    error!(root = %root, error = %e, "Unit failed");
                    flags.raise(Anomaly::UnclassifiedError);
                    (Default::default(), Some(e.to_string()))
                }
            };

        let report = UnitReport {
            run: spec.run.clone(),
            exposure: spec.exposure.clone(),
            root,
            ccdnum,
            flags: flags.flags(),
            artifacts,
            error: failure,
        };

        if let (Some(ledger), false) = (&ledger, report.flags.is_empty()) {
            let entry = BlacklistEntry {
                run: report.run.clone(),
                exposure: report.exposure.clone(),
                ccdnum,
                flags: report.flags,
            };
            if ledger.record_or_log(&entry) {
                summary.blacklisted += 1;
            }
        }

        summary.reports.push(report);
    }
    reporter.advance(units.len());
    reporter.finish_stage();

    info!(
        units = summary.reports.len(),
        flagged = summary.flagged().count(),
        skipped = summary.skipped.len(),
        "Finished processing all units"
    );
    Ok(summary)
}
