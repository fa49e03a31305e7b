pub mod artifact;
pub mod detection;
pub mod io;

use std::path::Path;

use ndarray::Array1;

use crate::error::Result;

pub use artifact::{parse_unit_file_name, reserve_file_name, ArtifactName};
pub use detection::{Detection, FindStarsRow, Positioned, ReservedStar, TableSchema, UsedStar};

/// Immutable snapshot of a detector unit's detections.
///
/// Filtering never mutates: every stage produces a new catalog so each
/// intermediate result can be written under its own artifact name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Catalog {
    rows: Vec<Detection>,
}

impl Catalog {
    pub fn new(rows: Vec<Detection>) -> Self {
        Self { rows }
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::new(io::read_table(path)?))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        io::write_table(path, &self.rows)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Detection] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
        self.rows.iter()
    }

    /// Rows for which `keep` holds, in their original order.
    pub fn filter(&self, mut keep: impl FnMut(&Detection) -> bool) -> Catalog {
        Catalog::new(self.rows.iter().filter(|d| keep(*d)).cloned().collect())
    }

    /// Rows at `indices`, in the order given.
    pub fn select(&self, indices: &[usize]) -> Catalog {
        Catalog::new(indices.iter().map(|&i| self.rows[i].clone()).collect())
    }

    /// One numeric column as an array.
    pub fn column(&self, field: impl Fn(&Detection) -> f64) -> Array1<f64> {
        self.rows.iter().map(field).collect()
    }
}

impl FromIterator<Detection> for Catalog {
    fn from_iter<I: IntoIterator<Item = Detection>>(iter: I) -> Self {
        Catalog::new(iter.into_iter().collect())
    }
}
