//! Record collector: ties fetch → extract → select → normalize together.
//!
//! Endpoints are tried in order until enough records are buffered. A failed
//! endpoint (fetch retries exhausted, or no table matching the expected
//! headers) is logged and skipped; only a run where *every* endpoint failed
//! and nothing was collected is an error. Each page's records are
//! deduplicated against the buffer before they count towards the target;
//! the buffer is then reconciled onto the task schema, deduplicated and
//! truncated to the target count.

use crate::errors::{CollectError, EndpointError};
use crate::models::{RawDocument, Record, RecordSet};
use crate::scraper::selector::{select_all, select_best};
use crate::scraper::{DocumentSource, Extractor, TokenSet};
use crate::schema::{Identity, Schema, dedupe};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One table per page, or every table clearing the minimum score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Best,
    All,
}

/// Everything a task needs to turn one endpoint into records.
#[derive(Debug, Clone)]
pub struct EndpointPipeline {
    pub extractor: Extractor,
    pub tokens: TokenSet,
    pub selection: Selection,
    pub schema: Schema,
    pub identity: Identity,
}

impl EndpointPipeline {
    /// Fetched page → typed records.
    pub fn records(&self, doc: &RawDocument) -> Result<Vec<Record>, EndpointError> {
        let candidates = self.extractor.extract(doc);
        debug!("{}: {} candidates", doc.url, candidates.len());

        let no_match = |source| EndpointError::NoMatch {
            url: doc.url.clone(),
            source,
        };
        let tables = match self.selection {
            Selection::Best => vec![select_best(&candidates, &self.tokens).map_err(no_match)?],
            Selection::All => select_all(&candidates, &self.tokens).map_err(no_match)?,
        };

        Ok(tables
            .into_iter()
            .flat_map(|t| self.schema.records_from_table(t, doc))
            .collect())
    }

    /// Reconciled records whose identity key is not in `seen`; new keys are
    /// added. Keyless records always pass.
    pub fn unseen(&self, records: Vec<Record>, seen: &mut HashSet<String>) -> Vec<Record> {
        self.schema
            .reconcile(records)
            .into_records()
            .into_iter()
            .filter(|r| match self.identity.key(r) {
                Some(key) => seen.insert(key),
                None => true,
            })
            .collect()
    }

    /// reconcile → dedupe → truncate
    pub fn finalize(&self, records: Vec<Record>, target_count: usize) -> RecordSet {
        let reconciled = self.schema.reconcile(records);
        let before = reconciled.len();
        let unique = dedupe(reconciled, |r| self.identity.key(r));
        if unique.len() < before {
            debug!("Dropped {} duplicate records", before - unique.len());
        }
        unique.truncate(target_count)
    }
}

pub struct Collector {
    source: Arc<dyn DocumentSource>,
}

impl Collector {
    pub fn new(source: Arc<dyn DocumentSource>) -> Self {
        Self { source }
    }

    pub async fn collect(
        &self,
        endpoints: &[String],
        target_count: usize,
        pipeline: &EndpointPipeline,
    ) -> Result<RecordSet, CollectError> {
        if endpoints.is_empty() {
            return Err(CollectError::NoEndpoints);
        }

        let mut buffer: Vec<Record> = Vec::new();
        let mut seen = HashSet::new();
        let mut failures = 0usize;
        let mut last_error = None;

        for url in endpoints {
            if buffer.len() >= target_count {
                break;
            }
            info!("Fetching {}", url);

            let outcome = match self.source.fetch(url).await {
                Ok(doc) => pipeline.records(&doc),
                Err(e) => Err(EndpointError::from(e)),
            };

            match outcome {
                Ok(records) => {
                    let fetched = records.len();
                    let fresh = pipeline.unseen(records, &mut seen);
                    info!("  {}: {} records, {} new", url, fetched, fresh.len());
                    buffer.extend(fresh);
                }
                Err(e) => {
                    warn!("Skipping endpoint: {}", e);
                    failures += 1;
                    last_error = Some(e);
                }
            }
        }

        if buffer.is_empty() && failures == endpoints.len() {
            if let Some(last) = last_error {
                return Err(CollectError::Exhausted {
                    endpoints: endpoints.len(),
                    last,
                });
            }
        }

        let set = pipeline.finalize(buffer, target_count);
        info!("Collected {} records ({} endpoint failures)", set.len(), failures);
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FetchErrorKind;
    use crate::models::Value;
    use crate::scraper::AnchorSpec;
    use crate::scraper::testing::StubSource;
    use crate::schema::{Derivation, FieldSpec};

    fn index_pipeline() -> EndpointPipeline {
        EndpointPipeline {
            extractor: Extractor::Tables,
            tokens: TokenSet::new(["index", "high", "low", "current", "change"]),
            selection: Selection::Best,
            schema: Schema::new(
                vec![
                    FieldSpec::text("Index Name").exact(["index"]),
                    FieldSpec::float("LDCP"),
                    FieldSpec::float("Current").exact(["current"]),
                    FieldSpec::float("Change").exact(["change"]),
                    FieldSpec::source(),
                ],
                vec![Derivation::difference("LDCP", "Current", "Change")],
            )
            .unwrap(),
            identity: Identity::Column("Index Name".into()),
        }
    }

    fn index_page(names: &[&str]) -> String {
        let rows: String = names
            .iter()
            .map(|n| format!("<tr><td>{n}</td><td>100.0</td><td>1.5</td></tr>"))
            .collect();
        format!(
            "<table><tr><th>Name</th><th>Value</th></tr><tr><td>a</td><td>b</td></tr></table>\
             <table><thead><tr><th>Index</th><th>Current</th><th>Change</th></tr></thead><tbody>{rows}</tbody></table>"
        )
    }

    fn endpoints(urls: &[&str]) -> Vec<String> {
        urls.iter().map(|u| u.to_string()).collect()
    }

    #[tokio::test]
    async fn test_failed_endpoint_is_skipped() {
        let source = StubSource::new()
            .failing("http://a/", FetchErrorKind::Timeout)
            .page("http://b/", &index_page(&["A", "B", "C", "D", "E"]));
        let collector = Collector::new(Arc::new(source));

        let set = collector
            .collect(&endpoints(&["http://a/", "http://b/"]), 3, &index_pipeline())
            .await
            .unwrap();

        assert_eq!(set.len(), 3);
        for r in set.records() {
            assert_eq!(r.value("source"), &Value::Text("b".into()));
            assert_eq!(r.value("LDCP"), &Value::Float(98.5));
        }
    }

    #[tokio::test]
    async fn test_stops_once_target_reached() {
        let source = StubSource::new()
            .page("http://a/", &index_page(&["A", "B"]))
            .failing("http://b/", FetchErrorKind::Network);
        let collector = Collector::new(Arc::new(source));

        // the failing second endpoint is never contacted
        let set = collector
            .collect(&endpoints(&["http://a/", "http://b/"]), 2, &index_pipeline())
            .await
            .unwrap();
        assert_eq!(set.len(), 2);
    }

    #[tokio::test]
    async fn test_all_endpoints_failing_is_fatal() {
        let source = StubSource::new()
            .failing("http://a/", FetchErrorKind::HttpStatus(503))
            .page("http://b/", "<table><tr><th>Name</th></tr><tr><td>x</td></tr></table>");
        let collector = Collector::new(Arc::new(source));

        let err = collector
            .collect(&endpoints(&["http://a/", "http://b/"]), 10, &index_pipeline())
            .await
            .unwrap_err();
        match err {
            CollectError::Exhausted { endpoints, last } => {
                assert_eq!(endpoints, 2);
                assert!(matches!(last, EndpointError::NoMatch { .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_duplicates_across_endpoints_collapse() {
        let source = StubSource::new()
            .page("http://a/", &index_page(&["KSE100", "KSE30"]))
            .page("http://b/", &index_page(&["KSE30", "KMI30"]));
        let collector = Collector::new(Arc::new(source));

        let set = collector
            .collect(&endpoints(&["http://a/", "http://b/"]), 10, &index_pipeline())
            .await
            .unwrap();
        let names: Vec<_> = set.records().iter().map(|r| r.value("Index Name").to_cell()).collect();
        assert_eq!(names, vec!["KSE100", "KSE30", "KMI30"]);
    }

    #[tokio::test]
    async fn test_repeated_rows_do_not_count_towards_target() {
        let source = StubSource::new()
            .page("http://a/", &index_page(&["KSE100", "KSE100", "KSE100"]))
            .page("http://b/", &index_page(&["KSE30", "KMI30"]));
        let collector = Collector::new(Arc::new(source));

        let set = collector
            .collect(&endpoints(&["http://a/", "http://b/"]), 3, &index_pipeline())
            .await
            .unwrap();
        let names: Vec<_> = set.records().iter().map(|r| r.value("Index Name").to_cell()).collect();
        assert_eq!(names, vec!["KSE100", "KSE30", "KMI30"]);
    }

    #[test]
    fn test_empty_endpoint_list() {
        let collector = Collector::new(Arc::new(StubSource::new()));
        let err = tokio_test::block_on(collector.collect(&[], 1, &index_pipeline())).unwrap_err();
        assert!(matches!(err, CollectError::NoEndpoints));
    }

    #[tokio::test]
    async fn test_anchor_pipeline_end_to_end() {
        let page = r#"<h2><a href="/news/1/a">First headline here</a></h2>
                      <h2><a href="/news/1/a#c">First headline again</a></h2>
                      <h3><a href="/news/2/b">Second headline here</a></h3>"#;
        let source = StubSource::new().page("https://www.dawn.com", page);
        let mut spec = AnchorSpec::new("h2 a[href], h3 a[href]", "headline", "url");
        spec.href_contains = Some("/news/".into());

        let pipeline = EndpointPipeline {
            extractor: Extractor::Anchors(spec),
            tokens: TokenSet::new(["headline", "url"]),
            selection: Selection::Best,
            schema: Schema::new(
                vec![
                    FieldSpec::text("headline").exact(["headline"]),
                    FieldSpec::text("url").exact(["url"]),
                    FieldSpec::source(),
                ],
                vec![],
            )
            .unwrap(),
            identity: Identity::Url("url".into()),
        };

        let set = Collector::new(Arc::new(source))
            .collect(&endpoints(&["https://www.dawn.com"]), 30, &pipeline)
            .await
            .unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.records()[0].value("url"), &Value::Text("https://www.dawn.com/news/1/a".into()));
        assert_eq!(set.records()[1].value("source"), &Value::Text("dawn.com".into()));
    }
}
