use std::fmt;
use std::path::{Path, PathBuf};

use crate::consts::{CATALOG_EXTENSION, CATALOG_INFIX};
use crate::error::{PsfcatError, Result};

/// Name of a catalog artifact: the unit's root name plus one token per
/// filter applied, in the order the filters ran.
///
/// `D00231245_25` with tokens `[magcut_3.0, tb]` names
/// `D00231245_25_psfcat_magcut_3.0_tb.csv`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArtifactName {
    root: String,
    tokens: Vec<String>,
}

impl ArtifactName {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            tokens: Vec::new(),
        }
    }

    /// A new name with `token` appended.
    pub fn with_token(&self, token: impl Into<String>) -> Self {
        let mut tokens = self.tokens.clone();
        tokens.push(token.into());
        Self {
            root: self.root.clone(),
            tokens,
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn file_name(&self) -> String {
        let suffix: String = self.tokens.iter().map(|t| format!("_{t}")).collect();
        format!(
            "{}_{CATALOG_INFIX}{suffix}.{CATALOG_EXTENSION}",
            self.root
        )
    }

    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_name())
    }
}

/// File name of the reserved-star table for a unit.
pub fn reserve_file_name(root: &str) -> String {
    format!("{root}_reserve.{CATALOG_EXTENSION}")
}

/// Split an exposure image name such as `D00231245_25.fits.fz` into its root
/// (`D00231245_25`) and detector unit number (25).
pub fn parse_unit_file_name(path: &Path) -> Result<(String, u32)> {
    let invalid = || PsfcatError::InvalidFileName(path.display().to_string());

    let mut base = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(invalid)?;
    if let Some(stripped) = base.strip_suffix(".fz") {
        base = stripped;
    }
    let root = base.strip_suffix(".fits").ok_or_else(invalid)?;
    let ccdnum = root
        .rsplit('_')
        .next()
        .and_then(|n| n.parse::<u32>().ok())
        .ok_or_else(invalid)?;
    Ok((root.to_string(), ccdnum))
}
