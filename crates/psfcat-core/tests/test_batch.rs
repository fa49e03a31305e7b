#[allow(dead_code)]
mod common;

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use psfcat_core::catalog::io::read_table;
use psfcat_core::catalog::{Catalog, FindStarsRow, ReservedStar};
use psfcat_core::error::Result;
use psfcat_core::flags::QualityFlags;
use psfcat_core::pipeline::config::ExternalToolConfig;
use psfcat_core::pipeline::{
    run_batch, run_batch_reported, Collaborators, CommandPsfFitter, PipelineStage,
    ProgressReporter, PsfFitter, StarFileFinder, StarFinder, UnitSpec,
};

use common::{clean_catalog, config_in, read_lines, star_rows, unit, write_catalog, write_star_rows};

fn file_finder() -> Collaborators {
    Collaborators {
        star_finder: Some(Box::new(StarFileFinder)),
        psf_fitter: None,
    }
}

fn no_collaborators() -> Collaborators {
    Collaborators::default()
}

struct FixedFitter(bool);

impl PsfFitter for FixedFitter {
    fn fit(&self, _spec: &UnitSpec, _root: &str, catalog: &Path, _work: &Path) -> Result<bool> {
        assert!(catalog.exists());
        Ok(self.0)
    }
}

/// Star finder that only reports on the first half of the catalog.
struct HalfFinder;

impl StarFinder for HalfFinder {
    fn find_stars(
        &self,
        _spec: &UnitSpec,
        _root: &str,
        catalog: &Catalog,
    ) -> Result<Option<Vec<FindStarsRow>>> {
        let rows = star_rows(catalog, catalog.len(), 1.2);
        Ok(Some(rows[..catalog.len() / 2].to_vec()))
    }
}

fn fitter_tool(program: &str, args: &[&str]) -> ExternalToolConfig {
    ExternalToolConfig {
        program: program.into(),
        args: args.iter().map(|a| a.to_string()).collect(),
        output: "{work}/{root}_psfcat.psf".into(),
    }
}

// ---------------------------------------------------------------------------
// Star-finding pass
// ---------------------------------------------------------------------------

#[test]
fn test_star_counts_flag_and_blacklist() {
    let dir = tempfile::tempdir().unwrap();
    let few = clean_catalog(25);
    let many = clean_catalog(30);
    write_star_rows(dir.path(), "D1_01", &star_rows(&few, 10, 1.2));
    write_star_rows(dir.path(), "D1_02", &star_rows(&many, 22, 1.2));
    let units = vec![
        unit("r1", "e1", write_catalog(dir.path(), "D1_01", &few)),
        unit("r1", "e1", write_catalog(dir.path(), "D1_02", &many)),
    ];
    let config = config_in(dir.path());

    let summary = run_batch(&units, &config, &file_finder()).unwrap();

    assert_eq!(summary.reports.len(), 2);
    assert_eq!(summary.reports[0].flags, QualityFlags::TOO_FEW_STARS);
    assert_eq!(summary.reports[0].artifacts.nstars, 10);
    assert_eq!(summary.reports[1].flags, QualityFlags::TOO_MANY_STARS);

    let candidates_path = config.work.join("D1_01_psfcat_findstars.csv");
    assert_eq!(
        summary.reports[0].artifacts.catalog.as_deref(),
        Some(candidates_path.as_path())
    );
    let candidates = Catalog::load(&candidates_path).unwrap();
    let ids: Vec<u64> = candidates.iter().map(|d| d.number).collect();
    assert_eq!(ids, (1..=10).collect::<Vec<u64>>());

    assert_eq!(summary.blacklisted, 2);
    assert_eq!(
        read_lines(&dir.path().join("blacklist.txt")),
        vec!["r1 e1 1 2", "r1 e1 2 4"]
    );
}

#[test]
fn test_missing_star_finder_output_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let units = vec![unit("r1", "e2", write_catalog(dir.path(), "D2_05", &clean_catalog(25)))];

    let summary = run_batch(&units, &config_in(dir.path()), &file_finder()).unwrap();

    assert_eq!(
        summary.reports[0].flags,
        QualityFlags::FINDSTARS_FAILURE | QualityFlags::NO_STARS
    );
    assert_eq!(
        read_lines(&dir.path().join("blacklist.txt")),
        vec!["r1 e2 5 17"]
    );
}

#[test]
fn test_no_candidates_is_no_stars() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = clean_catalog(25);
    write_star_rows(dir.path(), "D3_07", &star_rows(&catalog, 0, 1.2));
    let units = vec![unit("r", "e", write_catalog(dir.path(), "D3_07", &catalog))];

    let summary = run_batch(&units, &config_in(dir.path()), &file_finder()).unwrap();

    assert_eq!(summary.reports[0].flags, QualityFlags::NO_STARS);
}

#[test]
fn test_misaligned_star_finder_output_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let units = vec![unit("r", "e", write_catalog(dir.path(), "D3_08", &clean_catalog(40)))];
    let finder = Collaborators {
        star_finder: Some(Box::new(HalfFinder)),
        psf_fitter: None,
    };

    let summary = run_batch(&units, &config_in(dir.path()), &finder).unwrap();

    let report = &summary.reports[0];
    assert_eq!(report.flags, QualityFlags::UNCLASSIFIED_ERROR);
    assert!(report
        .error
        .as_deref()
        .unwrap()
        .contains("20 star-finder rows for 40 detections"));
    assert!(!dir.path().join("work/D3_08_psfcat_findstars.csv").exists());
}

// ---------------------------------------------------------------------------
// Refinement and checks
// ---------------------------------------------------------------------------

#[test]
fn test_clean_unit_is_not_blacklisted() {
    let dir = tempfile::tempdir().unwrap();
    let units = vec![unit("r", "e", write_catalog(dir.path(), "D4_10", &clean_catalog(25)))];
    let mut config = config_in(dir.path());
    config.use_findstars = false;

    let summary = run_batch(&units, &config, &no_collaborators()).unwrap();

    assert!(summary.reports[0].flags.is_empty());
    assert_eq!(summary.blacklisted, 0);
    assert!(!dir.path().join("blacklist.txt").exists());
    let fwhm = summary.reports[0].artifacts.star_fwhm.unwrap();
    assert_eq!(fwhm.median, 3.0);
}

#[test]
fn test_refinement_writes_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let units = vec![unit("r", "e", write_catalog(dir.path(), "D5_11", &clean_catalog(40)))];
    let mut config = config_in(dir.path());
    config.use_findstars = false;
    config.refine.max_mag = 23.0;
    config.refine.reserve = 0.25;

    let summary = run_batch(&units, &config, &no_collaborators()).unwrap();
    let artifacts = &summary.reports[0].artifacts;

    let training_path = config.work.join("D5_11_psfcat_maxmag_23.0_reserve_0.25.csv");
    assert_eq!(artifacts.catalog.as_deref(), Some(training_path.as_path()));
    let training = Catalog::load(&training_path).unwrap();
    let reserved: Vec<ReservedStar> =
        read_table(&config.work.join("D5_11_reserve.csv")).unwrap();

    assert!(training.iter().all(|d| d.mag_auto < 23.0));
    assert_eq!(training.len() + reserved.len(), 35);
    assert_eq!(reserved.len(), 8);
    assert_eq!(artifacts.nstars, training.len());
}

#[test]
fn test_single_survivor_after_refinement_is_no_stars() {
    let dir = tempfile::tempdir().unwrap();
    let units = vec![unit("r", "e", write_catalog(dir.path(), "D6_12", &clean_catalog(25)))];
    let mut config = config_in(dir.path());
    config.use_findstars = false;
    config.refine.max_mag = 15.1;

    let summary = run_batch(&units, &config, &no_collaborators()).unwrap();

    assert_eq!(
        summary.reports[0].flags,
        QualityFlags::TOO_FEW_STARS | QualityFlags::NO_STARS
    );
}

#[test]
fn test_wide_stars_flag_high_fwhm() {
    let dir = tempfile::tempdir().unwrap();
    let catalog: Catalog = clean_catalog(25)
        .iter()
        .cloned()
        .map(|mut d| {
            d.flux_radius = 4.0;
            d
        })
        .collect();
    let mut spec = unit("r", "e", write_catalog(dir.path(), "D7_13", &catalog));
    spec.fwhm = Some(4.5);
    let mut config = config_in(dir.path());
    config.use_findstars = false;

    let summary = run_batch(&[spec], &config, &no_collaborators()).unwrap();

    // FWHM 8 is below the absolute limit but above 1.5 x header.
    assert_eq!(summary.reports[0].flags, QualityFlags::TOO_HIGH_FWHM);
}

#[test]
fn test_psf_fit_failure_is_advisory() {
    let dir = tempfile::tempdir().unwrap();
    let units = vec![unit("r", "e", write_catalog(dir.path(), "D8_14", &clean_catalog(25)))];
    let mut config = config_in(dir.path());
    config.use_findstars = false;

    let failing = Collaborators {
        star_finder: None,
        psf_fitter: Some(Box::new(FixedFitter(false))),
    };
    let summary = run_batch(&units, &config, &failing).unwrap();
    assert_eq!(summary.reports[0].flags, QualityFlags::PSF_FIT_FAILURE);

    let passing = Collaborators {
        star_finder: None,
        psf_fitter: Some(Box::new(FixedFitter(true))),
    };
    let summary = run_batch(&units, &config, &passing).unwrap();
    assert!(summary.reports[0].flags.is_empty());
}

#[cfg(unix)]
#[test]
fn test_previous_psf_model_does_not_mask_fit_failure() {
    let dir = tempfile::tempdir().unwrap();
    let work = dir.path().join("work");
    std::fs::create_dir_all(&work).unwrap();
    let catalog = write_catalog(dir.path(), "D1_01", &clean_catalog(25));
    let spec = unit("r", "e", catalog.clone());
    let stale = work.join("D1_01_psfcat.psf");

    std::fs::write(&stale, "old model").unwrap();
    let failing = CommandPsfFitter::new(fitter_tool("false", &[]));
    assert!(!failing.fit(&spec, "D1_01", &catalog, &work).unwrap());
    assert!(!stale.exists());

    std::fs::write(&stale, "old model").unwrap();
    let writing = CommandPsfFitter::new(fitter_tool(
        "sh",
        &["-c", "echo new > {work}/{root}_psfcat.psf"],
    ));
    assert!(writing.fit(&spec, "D1_01", &catalog, &work).unwrap());
    assert_eq!(std::fs::read_to_string(&stale).unwrap().trim(), "new");
}

#[cfg(unix)]
#[test]
fn test_configured_fitter_failure_is_flagged_on_rerun() {
    let dir = tempfile::tempdir().unwrap();
    let units = vec![unit("r", "e", write_catalog(dir.path(), "D8_15", &clean_catalog(25)))];
    let mut config = config_in(dir.path());
    config.use_findstars = false;
    config.psf_fitter = Some(fitter_tool("false", &["{catalog}"]));
    std::fs::create_dir_all(&config.work).unwrap();
    std::fs::write(config.work.join("D8_15_psfcat.psf"), "old model").unwrap();

    let summary = run_batch(&units, &config, &Collaborators::from_config(&config)).unwrap();

    assert_eq!(summary.reports[0].flags, QualityFlags::PSF_FIT_FAILURE);
    assert_eq!(read_lines(&dir.path().join("blacklist.txt")), vec!["r e 15 32"]);
}

// ---------------------------------------------------------------------------
// Batch behavior
// ---------------------------------------------------------------------------

#[test]
fn test_unit_error_becomes_unclassified_and_batch_continues() {
    let dir = tempfile::tempdir().unwrap();
    let broken = dir.path().join("D9_20_psfcat.csv");
    std::fs::write(&broken, "NUMBER,X_IMAGE\n1,2.0\n").unwrap();
    let units = vec![
        unit("r", "e", broken),
        unit("r", "e", write_catalog(dir.path(), "D9_21", &clean_catalog(25))),
    ];
    let mut config = config_in(dir.path());
    config.use_findstars = false;

    let summary = run_batch(&units, &config, &no_collaborators()).unwrap();

    assert_eq!(summary.reports.len(), 2);
    assert_eq!(summary.reports[0].flags, QualityFlags::UNCLASSIFIED_ERROR);
    assert!(summary.reports[0].error.is_some());
    assert!(summary.reports[1].flags.is_empty());
    assert_eq!(read_lines(&dir.path().join("blacklist.txt")), vec!["r e 20 64"]);
}

#[test]
fn test_unidentifiable_unit_is_skipped_without_blacklisting() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.csv");
    clean_catalog(3).save(&path).unwrap();
    let units = vec![unit("r", "e", path.clone())];

    let summary = run_batch(&units, &config_in(dir.path()), &no_collaborators()).unwrap();

    assert!(summary.reports.is_empty());
    assert_eq!(summary.skipped, vec![path]);
    assert!(!dir.path().join("blacklist.txt").exists());
}

#[test]
fn test_single_ccd_processes_first_unit_per_exposure() {
    let dir = tempfile::tempdir().unwrap();
    let units = vec![
        unit("r", "e1", write_catalog(dir.path(), "E1_01", &clean_catalog(25))),
        unit("r", "e1", write_catalog(dir.path(), "E1_02", &clean_catalog(25))),
        unit("r", "e2", write_catalog(dir.path(), "E2_01", &clean_catalog(25))),
    ];
    let mut config = config_in(dir.path());
    config.use_findstars = false;
    config.single_ccd = true;

    let summary = run_batch(&units, &config, &no_collaborators()).unwrap();

    let roots: Vec<&str> = summary.reports.iter().map(|r| r.root.as_str()).collect();
    assert_eq!(roots, vec!["E1_01", "E2_01"]);
}

#[test]
fn test_disabled_blacklist_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let units = vec![unit("r", "e", write_catalog(dir.path(), "F1_01", &clean_catalog(5)))];
    let mut config = config_in(dir.path());
    config.blacklist.enabled = false;

    let summary = run_batch(&units, &config, &file_finder()).unwrap();

    assert!(!summary.reports[0].flags.is_empty());
    assert!(summary.blacklist.is_none());
    assert!(!dir.path().join("blacklist.txt").exists());
}

#[test]
fn test_tapebump_file_is_applied_per_unit() {
    let dir = tempfile::tempdir().unwrap();
    let tapebumps = dir.path().join("tapebumps.csv");
    // Unit 3 loses its first 10 stars; unit 4 has no bumps.
    std::fs::write(&tapebumps, "3, 200, 100, 560, 460\n").unwrap();
    let units = vec![
        unit("r", "e", write_catalog(dir.path(), "G_03", &clean_catalog(25))),
        unit("r", "f", write_catalog(dir.path(), "G_04", &clean_catalog(25))),
    ];
    let mut config = config_in(dir.path());
    config.use_findstars = false;
    config.refine.use_tapebumps = true;
    config.refine.tapebump_extra = 0.5;
    config.refine.tapebump_file = Some(tapebumps);

    let summary = run_batch(&units, &config, &no_collaborators()).unwrap();

    assert_eq!(summary.reports[0].artifacts.nstars, 15);
    assert_eq!(summary.reports[0].flags, QualityFlags::TOO_FEW_STARS);
    assert_eq!(summary.reports[1].artifacts.nstars, 25);
    assert!(summary.reports[1].flags.is_empty());
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

#[derive(Default)]
struct CountingReporter {
    stages: AtomicUsize,
    last: AtomicUsize,
}

impl ProgressReporter for CountingReporter {
    fn begin_stage(&self, _stage: PipelineStage, _total_items: Option<usize>) {
        self.stages.fetch_add(1, Ordering::SeqCst);
    }

    fn advance(&self, items_done: usize) {
        self.last.store(items_done, Ordering::SeqCst);
    }
}

#[test]
fn test_reporter_sees_every_unit() {
    let dir = tempfile::tempdir().unwrap();
    let units = vec![
        unit("r", "e", write_catalog(dir.path(), "H_01", &clean_catalog(25))),
        unit("r", "e", write_catalog(dir.path(), "H_02", &clean_catalog(25))),
    ];
    let mut config = config_in(dir.path());
    config.use_findstars = false;
    let reporter = Arc::new(CountingReporter::default());

    run_batch_reported(&units, &config, &no_collaborators(), reporter.clone()).unwrap();

    assert_eq!(reporter.stages.load(Ordering::SeqCst), 2);
    assert_eq!(reporter.last.load(Ordering::SeqCst), 2);
}
