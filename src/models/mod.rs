use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

// ── Raw document ──────────────────────────────────────────────────────────────

/// A fetched page. Owned by the collection task that fetched it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub url: String,
    pub body: String,
    pub fetched_at: DateTime<Utc>,
}

impl RawDocument {
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: body.into(),
            fetched_at: Utc::now(),
        }
    }

    /// "https://dps.psx.com.pk/indices?x=1" → "dps.psx.com.pk/indices"
    pub fn source_label(&self) -> String {
        match url::Url::parse(&self.url) {
            Ok(u) => {
                let host = u.host_str().unwrap_or_default();
                let host = host.strip_prefix("www.").unwrap_or(host);
                format!("{}{}", host, u.path().trim_end_matches('/'))
            }
            Err(_) => self.url.clone(),
        }
    }
}

// ── Candidate table ───────────────────────────────────────────────────────────

/// A grid lifted out of a page: header labels plus rows of raw cell text.
/// Every row is exactly as wide as the header.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CandidateTable {
    /// Rows are padded with empty cells or truncated to the header width.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ── Values ────────────────────────────────────────────────────────────────────

/// A typed cell. `Absent` means "could not be determined" and is kept apart
/// from zero and from the empty string all the way to the output files.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    Text(String),
    Float(f64),
    Integer(i64),
    #[default]
    Absent,
}

impl Value {
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn from_f64(v: Option<f64>) -> Self {
        v.filter(|f| f.is_finite()).map_or(Value::Absent, Value::Float)
    }

    pub fn from_i64(v: Option<i64>) -> Self {
        v.map_or(Value::Absent, Value::Integer)
    }

    pub fn from_text(v: Option<String>) -> Self {
        v.map_or(Value::Absent, Value::Text)
    }

    /// Rendering used for CSV cells. Absent is an empty cell; whole floats
    /// keep a decimal so they read back as floats.
    pub fn to_cell(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{:.1}", f),
            Value::Float(f) => f.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Absent => String::new(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Absent => f.write_str("—"),
            other => f.write_str(&other.to_cell()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Text(s) => serializer.serialize_str(s),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Absent => serializer.serialize_none(),
        }
    }
}

// ── Record ────────────────────────────────────────────────────────────────────

/// Ordered column → value mapping.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: Value) -> Self {
        self.set(column, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    /// Missing columns read as Absent.
    pub fn value(&self, column: &str) -> &Value {
        static ABSENT: Value = Value::Absent;
        self.get(column).unwrap_or(&ABSENT)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    /// Replaces the value in place, or appends the column.
    pub fn set(&mut self, column: impl Into<String>, value: Value) {
        let column = column.into();
        match self.fields.iter_mut().find(|(c, _)| *c == column) {
            Some((_, v)) => *v = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(c, _)| c.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.fields.iter().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (column, value) in &self.fields {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

// ── Record set ────────────────────────────────────────────────────────────────

/// Records sharing one schema: every record carries every column, in
/// column order. Built by the schema reconciler.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordSet {
    columns: Vec<String>,
    records: Vec<Record>,
}

impl RecordSet {
    /// Callers guarantee every record is aligned with `columns`.
    pub(crate) fn from_parts(columns: Vec<String>, records: Vec<Record>) -> Self {
        debug_assert!(
            records
                .iter()
                .all(|r| r.columns().eq(columns.iter().map(String::as_str)))
        );
        Self { columns, records }
    }

    pub fn empty(columns: Vec<String>) -> Self {
        Self {
            columns,
            records: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn truncate(mut self, n: usize) -> Self {
        self.records.truncate(n);
        self
    }
}
