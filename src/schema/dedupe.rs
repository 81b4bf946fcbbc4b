use crate::models::{Record, RecordSet, Value};
use std::collections::HashSet;

/// How duplicate records are recognised.
#[derive(Debug, Clone, PartialEq)]
pub enum Identity {
    /// Never deduplicate.
    None,
    /// Trimmed cell value of a column.
    Column(String),
    /// A URL column, compared after canonicalisation.
    Url(String),
}

impl Identity {
    pub fn column(&self) -> Option<&str> {
        match self {
            Identity::None => None,
            Identity::Column(c) | Identity::Url(c) => Some(c),
        }
    }

    /// The record's identity key; None for keyless records.
    pub fn key(&self, record: &Record) -> Option<String> {
        let column = self.column()?;
        let raw = match record.value(column) {
            Value::Absent => return None,
            Value::Text(s) => s.trim().to_string(),
            other => other.to_cell(),
        };
        if raw.is_empty() {
            return None;
        }
        match self {
            Identity::Url(_) => Some(canonical_url(&raw)),
            _ => Some(raw),
        }
    }
}

/// "https://Example.com/news/1/#top" → "https://example.com/news/1"
pub fn canonical_url(raw: &str) -> String {
    match url::Url::parse(raw.trim()) {
        Ok(mut u) => {
            u.set_fragment(None);
            let s = u.to_string();
            if u.path() != "/" && s.ends_with('/') && u.query().is_none() {
                s.trim_end_matches('/').to_string()
            } else {
                s
            }
        }
        Err(_) => raw.trim().to_string(),
    }
}

/// Drop records whose identity key was already seen, keeping first-seen
/// order and values. Records without a key are always kept.
pub fn dedupe<F>(set: RecordSet, key_fn: F) -> RecordSet
where
    F: Fn(&Record) -> Option<String>,
{
    let columns = set.columns().to_vec();
    let mut seen = HashSet::new();
    let kept = set
        .into_records()
        .into_iter()
        .filter(|r| match key_fn(r).filter(|k| !k.is_empty()) {
            Some(key) => seen.insert(key),
            None => true,
        })
        .collect();
    RecordSet::from_parts(columns, kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSpec, Schema};

    fn set(rows: &[(&str, Option<&str>)]) -> RecordSet {
        let schema = Schema::new(vec![FieldSpec::text("headline"), FieldSpec::text("url")], vec![]).unwrap();
        schema.reconcile(
            rows.iter()
                .map(|(h, u)| {
                    Record::new()
                        .with("headline", Value::Text(h.to_string()))
                        .with("url", u.map_or(Value::Absent, |u| Value::Text(u.to_string())))
                })
                .collect(),
        )
    }

    #[test]
    fn test_first_seen_wins() {
        let input = set(&[
            ("first", Some("https://dawn.com/news/1")),
            ("other", Some("https://dawn.com/news/2")),
            ("second", Some("https://dawn.com/news/1#comments")),
            ("third", Some("https://dawn.com/news/1/")),
        ]);
        let identity = Identity::Url("url".into());
        let out = dedupe(input.clone(), |r| identity.key(r));

        assert!(out.len() <= input.len());
        let headlines: Vec<_> = out.records().iter().map(|r| r.value("headline").clone()).collect();
        assert_eq!(headlines, vec![Value::Text("first".into()), Value::Text("other".into())]);
        assert_eq!(out.columns(), input.columns());
    }

    #[test]
    fn test_keyless_records_are_all_kept() {
        let input = set(&[("same", None), ("same", None), ("same", Some("  "))]);
        let identity = Identity::Column("url".into());
        let out = dedupe(input, |r| identity.key(r));
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_identity_none_keeps_everything() {
        let input = set(&[("a", Some("u")), ("a", Some("u"))]);
        assert_eq!(dedupe(input, |r| Identity::None.key(r)).len(), 2);
    }

    #[test]
    fn test_canonical_url() {
        assert_eq!(canonical_url("https://Example.com/news/1/#top"), "https://example.com/news/1");
        assert_eq!(canonical_url("https://example.com/"), "https://example.com/");
        assert_eq!(canonical_url("https://example.com/a/?page=2"), "https://example.com/a/?page=2");
        assert_eq!(canonical_url(" not a url "), "not a url");
    }
}
