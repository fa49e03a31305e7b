use std::collections::HashMap;
use std::path::Path;

use tracing::info;

use crate::error::{PsfcatError, Result};

/// Rectangular defect zone on one detector unit, in detector pixels.
///
/// Bounds name the first and last defective pixel rows/columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub row_min: i64,
    pub col_min: i64,
    pub row_max: i64,
    pub col_max: i64,
}

impl Region {
    pub fn new(row_min: i64, col_min: i64, row_max: i64, col_max: i64) -> Self {
        Self {
            row_min,
            col_min,
            row_max,
            col_max,
        }
    }

    /// Whether `(x, y)` lies within `margin` pixels of the region, bounds
    /// inclusive. Rows run along y, columns along x.
    pub fn contains(&self, x: f64, y: f64, margin: f64) -> bool {
        (self.row_min as f64 - margin) <= y
            && y <= (self.row_max as f64 + margin)
            && (self.col_min as f64 - margin) <= x
            && x <= (self.col_max as f64 + margin)
    }
}

/// Defect regions keyed by detector unit id.
#[derive(Clone, Debug, Default)]
pub struct RegionTable {
    by_unit: HashMap<u32, Vec<Region>>,
}

impl RegionTable {
    /// Load a flat list of `unit, row_min, col_min, row_max, col_max`
    /// records. Values may be written as floats; they are truncated.
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .comment(Some(b'#'))
            .from_path(path)?;

        let mut table = RegionTable::default();
        let mut count = 0usize;
        for (i, record) in reader.records().enumerate() {
            let record = record?;
            let bad_line = |detail: &str| PsfcatError::SchemaMismatch {
                artifact: path.display().to_string(),
                detail: format!("line {}: {detail}", i + 1),
            };
            let values = parse_region_record(&record)
                .ok_or_else(|| bad_line("expected 5 numeric fields"))?;
            let unit = u32::try_from(values[0])
                .map_err(|_| bad_line(&format!("unit id {} out of range", values[0])))?;
            table.insert(
                unit,
                Region::new(values[1], values[2], values[3], values[4]),
            );
            count += 1;
        }

        info!(
            regions = count,
            units = table.by_unit.len(),
            "Read tapebump file"
        );
        Ok(table)
    }

    pub fn insert(&mut self, unit: u32, region: Region) {
        self.by_unit.entry(unit).or_default().push(region);
    }

    /// Regions owned by `unit`; empty when it has none.
    pub fn regions_for(&self, unit: u32) -> &[Region] {
        self.by_unit.get(&unit).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn unit_count(&self) -> usize {
        self.by_unit.len()
    }
}

fn parse_region_record(record: &csv::StringRecord) -> Option<[i64; 5]> {
    if record.len() != 5 {
        return None;
    }
    let mut values = [0i64; 5];
    for (slot, field) in values.iter_mut().zip(record.iter()) {
        *slot = field.parse::<f64>().ok()?.trunc() as i64;
    }
    Some(values)
}
