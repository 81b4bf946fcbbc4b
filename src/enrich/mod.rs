//! Bounded-parallel, per-record enrichment: fetch each record's own page and
//! fill one column from it, under a concurrency ceiling and a wall-clock
//! budget.

use crate::config::EnrichConfig;
use crate::models::{RawDocument, Record, Value};
use crate::scraper::DocumentSource;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

/// Pulls the target value out of a fetched page; Absent when not found.
pub type ExtractFn = fn(&RawDocument) -> Value;

/// Returns the records in input order. Each lookup writes only its own slot;
/// lookups that fail, find nothing, or are still running at the deadline
/// leave the record's existing value in place.
pub async fn enrich_column(
    mut records: Vec<Record>,
    url_column: &str,
    target_column: &str,
    source: Arc<dyn DocumentSource>,
    extract: ExtractFn,
    config: &EnrichConfig,
) -> Vec<Record> {
    let budget = config.budget();
    let deadline = Instant::now() + budget;
    let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));

    let mut tasks: JoinSet<Option<(usize, Value)>> = JoinSet::new();
    for (slot, record) in records.iter().enumerate() {
        let Some(url) = record.value(url_column).as_str().map(str::to_string) else {
            continue;
        };
        let source = Arc::clone(&source);
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return None;
            };
            match source.fetch(&url).await {
                Ok(doc) => Some((slot, extract(&doc))),
                Err(e) => {
                    debug!("Enrichment lookup failed: {}", e);
                    None
                }
            }
        });
    }

    let total = tasks.len();
    info!("Enriching '{}' for {} records (budget {:?})", target_column, total, budget);

    let mut found = vec![Value::Absent; records.len()];
    let mut done = 0usize;
    loop {
        match timeout_at(deadline, tasks.join_next()).await {
            Ok(Some(Ok(outcome))) => {
                done += 1;
                if let Some((slot, value)) = outcome {
                    found[slot] = value;
                }
                if done % 10 == 0 {
                    info!("  {}/{} lookups finished", done, total);
                }
            }
            Ok(Some(Err(e))) => {
                done += 1;
                warn!("Enrichment task panicked: {}", e);
            }
            Ok(None) => break,
            Err(_) => {
                warn!(
                    "Enrichment budget spent; {} of {} lookups unfinished",
                    total - done,
                    total
                );
                break;
            }
        }
    }
    tasks.abort_all();

    let mut filled = 0usize;
    for (record, value) in records.iter_mut().zip(found) {
        if !value.is_absent() {
            record.set(target_column, value);
            filled += 1;
        }
    }
    info!("Enriched {}/{} records", filled, records.len());
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FetchErrorKind;
    use crate::scraper::testing::StubSource;
    use std::time::Duration;

    fn body_text(doc: &RawDocument) -> Value {
        Value::from_text(Some(doc.body.trim().to_string()).filter(|s| !s.is_empty()))
    }

    fn record(name: &str, url: Option<&str>) -> Record {
        Record::new()
            .with("name", Value::Text(name.into()))
            .with("url", url.map_or(Value::Absent, |u| Value::Text(u.into())))
            .with("country", Value::Absent)
    }

    fn quick(budget_secs: f64) -> EnrichConfig {
        EnrichConfig {
            concurrency: 4,
            budget_secs,
            ..EnrichConfig::default()
        }
    }

    #[tokio::test]
    async fn test_fills_slots_in_input_order() {
        let source = StubSource::new()
            .slow("http://u/1", "Japan", Duration::from_millis(60))
            .page("http://u/2", "Chile")
            .failing("http://u/3", FetchErrorKind::Timeout)
            .page("http://u/4", "   ");
        let records = vec![
            record("a", Some("http://u/1")),
            record("b", Some("http://u/2")),
            record("c", Some("http://u/3")),
            record("d", None),
            record("e", Some("http://u/4")),
        ];

        let out = enrich_column(records, "url", "country", Arc::new(source), body_text, &quick(5.0)).await;

        let names: Vec<_> = out.iter().map(|r| r.value("name").to_cell()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d", "e"]);
        let countries: Vec<_> = out.iter().map(|r| r.value("country").clone()).collect();
        assert_eq!(
            countries,
            vec![
                Value::Text("Japan".into()),
                Value::Text("Chile".into()),
                Value::Absent,
                Value::Absent,
                Value::Absent,
            ]
        );
    }

    #[tokio::test]
    async fn test_budget_leaves_unfinished_slots_absent() {
        let source = StubSource::new()
            .page("http://u/fast", "Kenya")
            .slow("http://u/slow", "Peru", Duration::from_secs(5));
        let records = vec![record("slow", Some("http://u/slow")), record("fast", Some("http://u/fast"))];

        let started = std::time::Instant::now();
        let out = enrich_column(records, "url", "country", Arc::new(source), body_text, &quick(0.3)).await;

        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].value("country"), &Value::Absent);
        assert_eq!(out[1].value("country"), &Value::Text("Kenya".into()));
    }

    #[tokio::test]
    async fn test_existing_value_survives_empty_lookup() {
        let source = StubSource::new().page("http://u/1", "");
        let records = vec![record("a", Some("http://u/1")).with("country", Value::Text("Peru".into()))];
        let out = enrich_column(records, "url", "country", Arc::new(source), body_text, &quick(5.0)).await;
        assert_eq!(out[0].value("country"), &Value::Text("Peru".into()));
    }
}
