use std::ffi::OsString;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::consts::DEFAULT_BLACKLIST_RETRY_MS;
use crate::error::{PsfcatError, Result};
use crate::flags::QualityFlags;

/// One blacklist line: `run exposure detector flag`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlacklistEntry {
    pub run: String,
    pub exposure: String,
    pub ccdnum: u32,
    pub flags: QualityFlags,
}

impl fmt::Display for BlacklistEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.run,
            self.exposure,
            self.ccdnum,
            self.flags.bits()
        )
    }
}

impl FromStr for BlacklistEntry {
    type Err = PsfcatError;

    fn from_str(line: &str) -> Result<Self> {
        let malformed = || PsfcatError::SchemaMismatch {
            artifact: "blacklist".into(),
            detail: format!("malformed entry {line:?}"),
        };
        let fields: Vec<&str> = line.split_whitespace().collect();
        let [run, exposure, ccdnum, flag] = fields.as_slice() else {
            return Err(malformed());
        };
        Ok(Self {
            run: run.to_string(),
            exposure: exposure.to_string(),
            ccdnum: ccdnum.parse().map_err(|_| malformed())?,
            flags: QualityFlags::from_bits_retain(flag.parse().map_err(|_| malformed())?),
        })
    }
}

/// Destination for blacklist lines. Each call must append the whole line in
/// a single write.
pub trait LineSink {
    fn append_line(&self, line: &str) -> std::io::Result<()>;

    /// Where lines end up, for error reporting.
    fn location(&self) -> &Path;
}

/// Appends to a file that is opened in append mode for each write only.
///
/// Each line goes out in one `write` call on an append-mode handle, so lines
/// from concurrent writers do not interleave on local filesystems. A short
/// write is completed in place rather than restarting the line.
#[derive(Clone, Debug)]
pub struct AppendFile {
    path: PathBuf,
}

impl AppendFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LineSink for AppendFile {
    fn append_line(&self, line: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let bytes = line.as_bytes();
        let written = file.write(bytes)?;
        if written < bytes.len() {
            warn!(
                written,
                len = bytes.len(),
                path = %self.path.display(),
                "Short write to blacklist, completing line"
            );
            file.write_all(&bytes[written..])?;
        }
        Ok(())
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

/// How long to wait between append attempts and when to give up.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    pub interval: Duration,
    /// `None` retries until the append succeeds.
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_BLACKLIST_RETRY_MS),
            max_attempts: None,
        }
    }
}

/// Append-only log of flagged detector units, shared by concurrent workers.
#[derive(Clone, Debug)]
pub struct BlacklistLedger<S: LineSink = AppendFile> {
    sink: S,
    policy: RetryPolicy,
}

impl BlacklistLedger<AppendFile> {
    pub fn open(path: impl Into<PathBuf>, policy: RetryPolicy) -> Self {
        Self::with_sink(AppendFile::new(path), policy)
    }
}

impl<S: LineSink> BlacklistLedger<S> {
    pub fn with_sink(sink: S, policy: RetryPolicy) -> Self {
        Self { sink, policy }
    }

    pub fn location(&self) -> &Path {
        self.sink.location()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Append one entry. Failed appends are retried after the policy's
    /// interval; they are only surfaced once `max_attempts` is exhausted.
    pub fn record(&self, entry: &BlacklistEntry) -> Result<()> {
        let line = format!("{entry}\n");
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match self.sink.append_line(&line) {
                Ok(()) => {
                    info!(entry = %entry, attempts, "Logged unit in blacklist");
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        attempt = attempts,
                        path = %self.sink.location().display(),
                        "Error opening blacklist, will retry"
                    );
                    if self.policy.max_attempts.is_some_and(|max| attempts >= max) {
                        return Err(PsfcatError::BlacklistExhausted {
                            path: self.sink.location().to_path_buf(),
                            attempts,
                        });
                    }
                    std::thread::sleep(self.policy.interval);
                }
            }
        }
    }

    /// [`record`](Self::record) for batch callers that carry on regardless:
    /// a failure is logged and reported as `false`.
    pub fn record_or_log(&self, entry: &BlacklistEntry) -> bool {
        match self.record(entry) {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, entry = %entry, "Could not blacklist unit");
                false
            }
        }
    }
}

/// Blacklist file for a run: `{base}.txt`, or `{base}-{tag}.txt` when tagged.
pub fn blacklist_path(base: &Path, tag: Option<&str>) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    if let Some(tag) = tag {
        name.push("-");
        name.push(tag);
    }
    name.push(".txt");
    PathBuf::from(name)
}
