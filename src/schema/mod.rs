//! Canonical column schemas: header mapping, typed coercion, default fill,
//! derived columns and the final column order of every record set.

pub mod dedupe;

pub use self::dedupe::{Identity, dedupe};

use crate::errors::SchemaError;
use crate::models::{CandidateTable, RawDocument, Record, RecordSet, Value};
use crate::scraper::cleaner::{to_as_of, to_currency, to_float, to_integer, to_percentage, to_text};
use crate::scraper::parsers::page_text;
use std::collections::HashSet;

// ── Field specs ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Float,
    Percentage,
    Integer,
    /// Amount kept as text, currency prefix included.
    Currency,
    /// Retrieval time of the page the record came from.
    ScrapedAt,
    /// Host + path of the page the record came from.
    Source,
    /// "As of" stamp printed on the page, if any.
    AsOf,
}

/// Which source header feeds a field. Comparisons are case-insensitive on
/// trimmed labels.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderMatch {
    /// Not read from a cell (derived, enriched, or never published).
    Unsourced,
    Exact(Vec<String>),
    Contains(String),
}

impl HeaderMatch {
    fn matches(&self, header: &str) -> bool {
        let h = header.trim().to_lowercase();
        match self {
            HeaderMatch::Unsourced => false,
            HeaderMatch::Exact(labels) => labels.iter().any(|l| *l == h),
            HeaderMatch::Contains(needle) => h.contains(needle.as_str()),
        }
    }
}

/// Declared value for a column that came out Absent.
#[derive(Debug, Clone, PartialEq)]
pub enum Fill {
    Text(String),
    Float(f64),
    Integer(i64),
}

impl Fill {
    fn value(&self) -> Value {
        match self {
            Fill::Text(s) => Value::Text(s.clone()),
            Fill::Float(f) => Value::Float(*f),
            Fill::Integer(i) => Value::Integer(*i),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub header: HeaderMatch,
    pub default: Option<Fill>,
}

impl FieldSpec {
    pub fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            header: HeaderMatch::Unsourced,
            default: None,
        }
    }

    pub fn text(name: &str) -> Self {
        Self::new(name, FieldKind::Text)
    }

    pub fn float(name: &str) -> Self {
        Self::new(name, FieldKind::Float)
    }

    pub fn percentage(name: &str) -> Self {
        Self::new(name, FieldKind::Percentage)
    }

    pub fn integer(name: &str) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    pub fn currency(name: &str) -> Self {
        Self::new(name, FieldKind::Currency)
    }

    pub fn scraped_at() -> Self {
        Self::new("scraped_at", FieldKind::ScrapedAt)
    }

    pub fn source() -> Self {
        Self::new("source", FieldKind::Source)
    }

    pub fn as_of() -> Self {
        Self::new("source_as_of", FieldKind::AsOf)
    }

    pub fn exact<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.header = HeaderMatch::Exact(
            labels
                .into_iter()
                .map(|l| l.as_ref().trim().to_lowercase())
                .collect(),
        );
        self
    }

    pub fn containing(mut self, needle: &str) -> Self {
        self.header = HeaderMatch::Contains(needle.trim().to_lowercase());
        self
    }

    pub fn or_default(mut self, fill: Fill) -> Self {
        self.default = Some(fill);
        self
    }

    /// Coerce one raw cell according to this field's kind.
    pub fn coerce(&self, text: &str) -> Value {
        match self.kind {
            FieldKind::Text | FieldKind::ScrapedAt | FieldKind::Source | FieldKind::AsOf => {
                Value::from_text(to_text(text))
            }
            FieldKind::Float => Value::from_f64(to_float(text)),
            FieldKind::Percentage => Value::from_f64(to_percentage(text)),
            FieldKind::Integer => Value::from_i64(to_integer(text)),
            FieldKind::Currency => Value::from_text(to_currency(text)),
        }
    }
}

// ── Derivations ───────────────────────────────────────────────────────────────

pub type DeriveFn = fn(&[&Value]) -> Value;

/// A column computed from other columns of the same record.
#[derive(Debug, Clone)]
pub struct Derivation {
    pub target: String,
    pub inputs: Vec<String>,
    pub func: DeriveFn,
}

impl Derivation {
    pub fn new(target: &str, inputs: &[&str], func: DeriveFn) -> Self {
        Self {
            target: target.to_string(),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            func,
        }
    }

    /// `target = minuend - subtrahend`, Absent unless both are numbers.
    pub fn difference(target: &str, minuend: &str, subtrahend: &str) -> Self {
        Self::new(target, &[minuend, subtrahend], |v| match v {
            [a, b] => match (a.as_f64(), b.as_f64()) {
                (Some(a), Some(b)) => Value::from_f64(Some(a - b)),
                _ => Value::Absent,
            },
            _ => Value::Absent,
        })
    }
}

// ── Schema ────────────────────────────────────────────────────────────────────

/// Validated column list plus derivations. Construction is the only place
/// a [`SchemaError`] can arise.
#[derive(Debug, Clone)]
pub struct Schema {
    fields: Vec<FieldSpec>,
    derivations: Vec<Derivation>,
}

impl Schema {
    pub fn new(fields: Vec<FieldSpec>, derivations: Vec<Derivation>) -> Result<Self, SchemaError> {
        let mut seen = HashSet::new();
        for f in &fields {
            if !seen.insert(f.name.as_str()) {
                return Err(SchemaError::DuplicateColumn(f.name.clone()));
            }
        }

        for (i, d) in derivations.iter().enumerate() {
            for column in d.inputs.iter().chain(std::iter::once(&d.target)) {
                if !seen.contains(column.as_str()) {
                    return Err(SchemaError::UnknownColumn {
                        derivation: d.target.clone(),
                        column: column.clone(),
                    });
                }
            }
            // Reading a column that this or a later derivation writes would
            // make a second reconcile pass see different inputs.
            if let Some(column) = d
                .inputs
                .iter()
                .find(|c| derivations[i..].iter().any(|later| &later.target == *c))
            {
                return Err(SchemaError::DerivedTooLate {
                    derivation: d.target.clone(),
                    column: column.clone(),
                });
            }
        }

        Ok(Self { fields, derivations })
    }

    pub fn columns(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Header index feeding each field: the first header a field matches,
    /// each header used at most once, headers claimed in page order.
    fn header_map(&self, headers: &[String]) -> Vec<Option<usize>> {
        let mut map = vec![None; self.fields.len()];
        for (col, header) in headers.iter().enumerate() {
            if let Some(fi) = self
                .fields
                .iter()
                .enumerate()
                .position(|(fi, f)| map[fi].is_none() && f.header.matches(header))
            {
                map[fi] = Some(col);
            }
        }
        map
    }

    /// Typed records for one selected grid. Rows whose mapped cells are all
    /// empty are skipped; unmapped fields are left for `reconcile` to fill.
    pub fn records_from_table(&self, table: &CandidateTable, doc: &RawDocument) -> Vec<Record> {
        let map = self.header_map(table.headers());
        let scraped_at = doc.fetched_at.format("%Y-%m-%dT%H:%M:%S%:z").to_string();
        let source = doc.source_label();
        let as_of = if self.fields.iter().any(|f| f.kind == FieldKind::AsOf) {
            Value::from_text(to_as_of(&page_text(&doc.body)))
        } else {
            Value::Absent
        };

        table
            .rows()
            .iter()
            .filter(|row| {
                map.iter()
                    .flatten()
                    .any(|&col| !row[col].trim().is_empty())
            })
            .map(|row| {
                let mut record = Record::new();
                for (field, col) in self.fields.iter().zip(&map) {
                    match (field.kind, col) {
                        (FieldKind::ScrapedAt, _) => {
                            record.set(&field.name, Value::Text(scraped_at.clone()))
                        }
                        (FieldKind::Source, _) => record.set(&field.name, Value::Text(source.clone())),
                        (FieldKind::AsOf, _) => record.set(&field.name, as_of.clone()),
                        (_, Some(col)) => record.set(&field.name, field.coerce(&row[*col])),
                        (_, None) => {}
                    }
                }
                record
            })
            .collect()
    }

    /// Bring records onto the canonical schema:
    /// missing columns become Absent, declared defaults replace Absent,
    /// derivations run in declaration order (their targets then get their
    /// own defaults), and fields are emitted in canonical order. Columns not
    /// in the schema are dropped. Reconciling twice changes nothing.
    pub fn reconcile(&self, records: Vec<Record>) -> RecordSet {
        let records = records.into_iter().map(|r| self.reconcile_one(&r)).collect();
        RecordSet::from_parts(self.columns(), records)
    }

    fn reconcile_one(&self, source: &Record) -> Record {
        let mut out = Record::new();
        for field in &self.fields {
            let value = source.value(&field.name).clone();
            out.set(&field.name, fill(value, field));
        }

        for d in &self.derivations {
            let inputs: Vec<&Value> = d.inputs.iter().map(|c| out.value(c)).collect();
            let derived = (d.func)(&inputs);
            let derived = match self.field(&d.target) {
                Some(field) => fill(derived, field),
                None => derived,
            };
            out.set(&d.target, derived);
        }
        out
    }
}

fn fill(value: Value, field: &FieldSpec) -> Value {
    match (&value, &field.default) {
        (Value::Absent, Some(default)) => default.value(),
        _ => value,
    }
}

/// One-shot form: validate the configuration, then reconcile.
pub fn reconcile(
    records: Vec<Record>,
    fields: Vec<FieldSpec>,
    derivations: Vec<Derivation>,
) -> Result<RecordSet, SchemaError> {
    Ok(Schema::new(fields, derivations)?.reconcile(records))
}
