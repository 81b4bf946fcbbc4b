use crate::models::RecordSet;
use std::time::{Duration, Instant};
use tracing::info;

/// A simple wall-clock timer for logging elapsed time.
pub struct Timer {
    label: String,
    start: Instant,
}

impl Timer {
    pub fn start(label: impl Into<String>) -> Self {
        let label = label.into();
        info!("⏱  Starting: {}", label);
        Self {
            label,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        info!(
            "⏱  Finished: {} (took {:.2?})",
            self.label,
            self.start.elapsed()
        );
    }
}

const MAX_CELL: usize = 40;

fn clip(s: &str) -> String {
    if s.chars().count() <= MAX_CELL {
        s.to_string()
    } else {
        let head: String = s.chars().take(MAX_CELL - 1).collect();
        format!("{head}…")
    }
}

fn render_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(c, w)| format!("{:<width$}", c, width = *w))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

/// First `n` rows as an aligned text table. Absent cells show as "—".
pub fn preview(set: &RecordSet, n: usize) -> String {
    let rows: Vec<Vec<String>> = set
        .records()
        .iter()
        .take(n)
        .map(|r| r.values().map(|v| clip(&v.to_string())).collect())
        .collect();

    let mut widths: Vec<usize> = set.columns().iter().map(|c| c.chars().count()).collect();
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = vec![render_line(set.columns().iter().map(String::as_str), &widths)];
    out.push(widths.iter().map(|w| "─".repeat(*w)).collect::<Vec<_>>().join("  "));
    for row in &rows {
        out.push(render_line(row.iter().map(String::as_str), &widths));
    }
    if set.len() > n {
        out.push(format!("… {} more rows", set.len() - n));
    }
    out.join("\n")
}
