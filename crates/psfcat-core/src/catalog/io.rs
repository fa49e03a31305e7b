use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{PsfcatError, Result};

use super::detection::TableSchema;

/// Read a CSV table, validating its header against `T`'s schema before any
/// row is decoded.
pub fn read_table<T>(path: &Path) -> Result<Vec<T>>
where
    T: DeserializeOwned + TableSchema,
{
    let artifact = path.display().to_string();
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    let missing: Vec<&str> = T::REQUIRED
        .iter()
        .copied()
        .filter(|column| !headers.iter().any(|h| h == *column))
        .collect();
    if !missing.is_empty() {
        return Err(PsfcatError::SchemaMismatch {
            artifact,
            detail: format!("missing columns: {}", missing.join(", ")),
        });
    }

    let mut rows = Vec::new();
    for (i, record) in reader.deserialize::<T>().enumerate() {
        let row = record.map_err(|e| PsfcatError::SchemaMismatch {
            artifact: artifact.clone(),
            detail: format!("row {}: {e}", i + 1),
        })?;
        rows.push(row);
    }
    Ok(rows)
}

/// Write a CSV table. The header is always written, so an empty table still
/// reads back with a valid schema.
pub fn write_table<T>(path: &Path, rows: &[T]) -> Result<()>
where
    T: Serialize + TableSchema,
{
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(T::HEADER)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
