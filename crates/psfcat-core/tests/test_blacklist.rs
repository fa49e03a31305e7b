#[allow(dead_code)]
mod common;

use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::time::Duration;

use psfcat_core::blacklist::{
    blacklist_path, BlacklistEntry, BlacklistLedger, LineSink, RetryPolicy,
};
use psfcat_core::error::PsfcatError;
use psfcat_core::flags::QualityFlags;

use common::read_lines;

/// Sink that fails a fixed number of times before accepting lines.
struct FlakySink {
    failures_left: Cell<u32>,
    attempts: Cell<u32>,
    lines: RefCell<Vec<String>>,
    path: PathBuf,
}

impl FlakySink {
    fn new(failures: u32) -> Self {
        Self {
            failures_left: Cell::new(failures),
            attempts: Cell::new(0),
            lines: RefCell::new(Vec::new()),
            path: PathBuf::from("flaky"),
        }
    }
}

impl LineSink for FlakySink {
    fn append_line(&self, line: &str) -> std::io::Result<()> {
        self.attempts.set(self.attempts.get() + 1);
        if self.failures_left.get() > 0 {
            self.failures_left.set(self.failures_left.get() - 1);
            return Err(std::io::Error::new(
                std::io::ErrorKind::WouldBlock,
                "locked",
            ));
        }
        self.lines.borrow_mut().push(line.to_string());
        Ok(())
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

fn fast_retry(max_attempts: Option<u32>) -> RetryPolicy {
    RetryPolicy {
        interval: Duration::from_millis(1),
        max_attempts,
    }
}

fn entry(ccdnum: u32, flags: QualityFlags) -> BlacklistEntry {
    BlacklistEntry {
        run: "20130808000021_20121124".into(),
        exposure: "DECam_00231245".into(),
        ccdnum,
        flags,
    }
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

#[test]
fn test_entry_line_format() {
    let e = entry(25, QualityFlags::TOO_FEW_STARS | QualityFlags::TOO_HIGH_FWHM);
    assert_eq!(e.to_string(), "20130808000021_20121124 DECam_00231245 25 10");
}

#[test]
fn test_entry_parses_back() {
    let e = entry(3, QualityFlags::NO_STARS | QualityFlags::FINDSTARS_FAILURE);
    let parsed: BlacklistEntry = e.to_string().parse().unwrap();
    assert_eq!(parsed, e);
}

#[test]
fn test_malformed_entry_is_rejected() {
    assert!("run exp 3".parse::<BlacklistEntry>().is_err());
    assert!("run exp three 1".parse::<BlacklistEntry>().is_err());
}

#[test]
fn test_blacklist_path_with_and_without_tag() {
    assert_eq!(
        blacklist_path(Path::new("lists/psfex"), Some("y1a1-v02")),
        PathBuf::from("lists/psfex-y1a1-v02.txt")
    );
    assert_eq!(
        blacklist_path(Path::new("lists/psfex"), None),
        PathBuf::from("lists/psfex.txt")
    );
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

#[test]
fn test_failed_append_is_retried_once_and_written_once() {
    let ledger = BlacklistLedger::with_sink(FlakySink::new(1), fast_retry(None));

    ledger.record(&entry(25, QualityFlags::NO_STARS)).unwrap();

    let sink = ledger_sink(&ledger);
    assert_eq!(sink.attempts.get(), 2);
    assert_eq!(
        *sink.lines.borrow(),
        vec!["20130808000021_20121124 DECam_00231245 25 1\n".to_string()]
    );
}

#[test]
fn test_bounded_retry_gives_up() {
    let ledger = BlacklistLedger::with_sink(FlakySink::new(10), fast_retry(Some(3)));

    let err = ledger.record(&entry(1, QualityFlags::NO_STARS)).unwrap_err();

    assert!(matches!(err, PsfcatError::BlacklistExhausted { attempts: 3, .. }));
    assert!(ledger_sink(&ledger).lines.borrow().is_empty());
}

#[test]
fn test_file_ledger_appends_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = blacklist_path(&dir.path().join("psfex"), Some("test"));
    let ledger = BlacklistLedger::open(&path, fast_retry(Some(1)));

    ledger.record(&entry(1, QualityFlags::NO_STARS)).unwrap();
    ledger.record(&entry(1, QualityFlags::NO_STARS)).unwrap();
    ledger.record(&entry(2, QualityFlags::UNCLASSIFIED_ERROR)).unwrap();

    // Never deduplicated.
    assert_eq!(
        read_lines(&path),
        vec![
            "20130808000021_20121124 DECam_00231245 1 1",
            "20130808000021_20121124 DECam_00231245 1 1",
            "20130808000021_20121124 DECam_00231245 2 64",
        ]
    );
}

#[test]
fn test_exhausted_record_is_logged_not_raised() {
    let ledger = BlacklistLedger::with_sink(FlakySink::new(10), fast_retry(Some(2)));

    assert!(!ledger.record_or_log(&entry(4, QualityFlags::FINDSTARS_FAILURE)));
    assert_eq!(ledger_sink(&ledger).attempts.get(), 2);

    let ledger = BlacklistLedger::with_sink(FlakySink::new(0), fast_retry(Some(2)));
    assert!(ledger.record_or_log(&entry(4, QualityFlags::FINDSTARS_FAILURE)));
}

#[test]
fn test_concurrent_writers_leave_whole_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("psfex.txt");
    let ledger = BlacklistLedger::open(&path, fast_retry(None));

    std::thread::scope(|s| {
        for ccdnum in 1..=8 {
            let ledger = &ledger;
            s.spawn(move || {
                for _ in 0..25 {
                    ledger.record(&entry(ccdnum, QualityFlags::TOO_FEW_STARS)).unwrap();
                }
            });
        }
    });

    let lines = read_lines(&path);
    assert_eq!(lines.len(), 200);
    for ccdnum in 1..=8u32 {
        let count = lines
            .iter()
            .map(|l| l.parse::<BlacklistEntry>().unwrap())
            .filter(|e| e.ccdnum == ccdnum)
            .count();
        assert_eq!(count, 25);
    }
}

fn ledger_sink(ledger: &BlacklistLedger<FlakySink>) -> &FlakySink {
    ledger.sink()
}
