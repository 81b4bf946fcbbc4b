use crate::models::RecordSet;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

// ── Output layout ─────────────────────────────────────────────────────────────

/// Files of one task under the output directory.
#[derive(Debug, Clone)]
pub struct OutputDir {
    root: PathBuf,
}

impl OutputDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn csv(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.csv"))
    }

    pub fn json(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.json"))
    }

    /// Writes `<name>.csv` and, if asked, `<name>.json`.
    pub fn save(&self, name: &str, set: &RecordSet, with_json: bool) -> Result<()> {
        write_csv(set, &self.csv(name))?;
        if with_json {
            write_json(set, &self.json(name))?;
        }
        Ok(())
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("Cannot create {:?}", parent))?;
    }
    Ok(())
}

// ── Writers ───────────────────────────────────────────────────────────────────

/// Header row in canonical column order; Absent cells are written empty.
/// A set with no records still gets its header.
pub fn write_csv(set: &RecordSet, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("Cannot open {:?} for writing", path))?;

    writer.write_record(set.columns())?;
    for record in set.records() {
        writer.write_record(record.values().map(|v| v.to_cell()))?;
    }
    writer.flush().with_context(|| format!("Cannot flush {:?}", path))?;

    info!("Wrote {} rows to {:?}", set.len(), path);
    Ok(())
}

/// Array of objects, keys in canonical order, Absent as `null`.
pub fn write_json(set: &RecordSet, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(set.records()).context("Cannot serialise records")?;
    fs::write(path, json).with_context(|| format!("Cannot write {:?}", path))?;

    info!("Wrote {} records to {:?}", set.len(), path);
    Ok(())
}
