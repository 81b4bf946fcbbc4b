//! Reads a persisted record set back from CSV.

use crate::models::{Record, RecordSet, Value};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, warn};

/// Cell → typed value. Empty is Absent. A cell is a number only when the
/// number writes back as the same cell ("007" and "1e3" stay text).
fn infer(cell: &str) -> Value {
    if cell.trim().is_empty() {
        return Value::Absent;
    }
    let number = match cell.parse::<i64>() {
        Ok(i) => Value::Integer(i),
        Err(_) => match cell.parse::<f64>() {
            Ok(f) if f.is_finite() => Value::Float(f),
            _ => return Value::Text(cell.to_string()),
        },
    };
    if number.to_cell() == cell {
        number
    } else {
        Value::Text(cell.to_string())
    }
}

/// Load a CSV written by `storage::write_csv`. Short rows are padded with
/// Absent; malformed rows are skipped with a warning.
pub fn read_csv(path: &Path) -> Result<RecordSet> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Cannot open {:?}", path))?;

    let columns: Vec<String> = reader
        .headers()
        .with_context(|| format!("No header row in {:?}", path))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut records = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                warn!("Row {} in {:?}: {}", i + 1, path, e);
                continue;
            }
        };
        let record = columns.iter().enumerate().fold(Record::new(), |rec, (c, column)| {
            rec.with(column.as_str(), row.get(c).map_or(Value::Absent, infer))
        });
        records.push(record);
    }

    debug!("{:?}: {} records, {} columns", path, records.len(), columns.len());
    Ok(RecordSet::from_parts(columns, records))
}
