use super::{TaskPlan, check_identity, endpoints};
use crate::errors::{CollectError, EndpointError, SchemaError};
use crate::models::RecordSet;
use crate::pipeline::{Collector, EndpointPipeline, Selection};
use crate::scraper::{Extractor, TokenSet};
use crate::schema::{Derivation, FieldSpec, Identity, Schema};
use tracing::warn;

pub const INDICES_URL: &str = "https://dps.psx.com.pk/indices";
pub const MARKET_SUMMARY_URL: &str = "https://www.psx.com.pk/market-summary/";

/// Scrip column plus at least five of the seven price columns.
const MAINBOARD_MIN_SCORE: usize = 6;

/// DPS indices table. Open and Volume are not published there and stay
/// empty; LDCP is derived as `Current - Change`. `source_as_of` carries the
/// page's "As of" stamp when it prints one.
pub fn indices_plan(target_count: usize) -> Result<TaskPlan, SchemaError> {
    let schema = Schema::new(
        vec![
            FieldSpec::text("Index Name").exact(["index", "indices"]),
            FieldSpec::float("LDCP"),
            FieldSpec::float("Open"),
            FieldSpec::float("High").exact(["high"]),
            FieldSpec::float("Low").exact(["low"]),
            FieldSpec::float("Current").containing("current"),
            FieldSpec::float("Change").exact(["change"]),
            FieldSpec::percentage("Change %").containing("%"),
            FieldSpec::integer("Volume"),
            FieldSpec::scraped_at(),
            FieldSpec::source(),
            FieldSpec::as_of(),
        ],
        vec![Derivation::difference("LDCP", "Current", "Change")],
    )?;
    let identity = Identity::Column("Index Name".to_string());
    check_identity(&schema, &identity)?;

    Ok(TaskPlan {
        name: "indices",
        endpoints: endpoints(&[INDICES_URL]),
        target_count,
        pipeline: EndpointPipeline {
            extractor: Extractor::Tables,
            tokens: TokenSet::new(["index", "high", "low", "current", "change", "%"]),
            selection: Selection::Best,
            schema,
            identity,
        },
    })
}

/// Market-summary main board: every per-sector table with the scrip
/// columns, concatenated.
pub fn mainboard_plan(target_count: usize) -> Result<TaskPlan, SchemaError> {
    let schema = Schema::new(
        vec![
            FieldSpec::text("Index Name (SCRIP)").exact(["scrip"]),
            FieldSpec::float("LDCP").exact(["ldcp"]),
            FieldSpec::float("Open").exact(["open"]),
            FieldSpec::float("High").exact(["high"]),
            FieldSpec::float("Low").exact(["low"]),
            FieldSpec::float("Current").exact(["current"]),
            FieldSpec::float("Change").exact(["change"]),
            FieldSpec::integer("Volume").exact(["volume"]),
            FieldSpec::scraped_at(),
            FieldSpec::source(),
        ],
        vec![],
    )?;
    // the same scrip can be listed under several sectors
    let identity = Identity::None;

    Ok(TaskPlan {
        name: "mainboard",
        endpoints: endpoints(&[MARKET_SUMMARY_URL]),
        target_count,
        pipeline: EndpointPipeline {
            extractor: Extractor::Tables,
            tokens: TokenSet::new(["scrip", "ldcp", "open", "high", "low", "current", "change", "volume"])
                .requiring("scrip")
                .with_min_score(MAINBOARD_MIN_SCORE),
            selection: Selection::All,
            schema,
            identity,
        },
    })
}

/// Main-board collection where a page without the board is an empty result
/// rather than a failure. Fetch failures still propagate.
pub async fn collect_mainboard(plan: &TaskPlan, collector: &Collector) -> Result<RecordSet, CollectError> {
    match plan.collect(collector).await {
        Err(CollectError::Exhausted {
            last: EndpointError::NoMatch { url, source },
            ..
        }) => {
            warn!("[MAIN BOARD NOT FOUND] {}: {}; writing an empty table", url, source);
            Ok(RecordSet::empty(plan.columns()))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FetchErrorKind;
    use crate::models::{RawDocument, Value};
    use crate::scraper::testing::StubSource;
    use std::sync::Arc;

    const DPS_INDICES: &str = r#"
        <table><tr><td>Market status</td><td>Open</td></tr></table>
        <table>
          <thead><tr><th>Index</th><th>High</th><th>Low</th><th>Current</th><th>Change</th><th>Change (%)</th></tr></thead>
          <tbody>
            <tr><td>KSE100</td><td>81,234.10</td><td>80,100.00</td><td>80,950.50</td><td>-120.50</td><td>-0.15%</td></tr>
            <tr><td>KMI30</td><td>—</td><td>—</td><td>125,000.00</td><td>n/a</td><td>—</td></tr>
          </tbody>
        </table>"#;

    const MARKET_SUMMARY: &str = r#"
        <h4>AUTOMOBILE ASSEMBLER</h4>
        <table>
          <tr><th>SCRIP</th><th>LDCP</th><th>OPEN</th><th>HIGH</th><th>LOW</th><th>CURRENT</th><th>CHANGE</th><th>VOLUME</th></tr>
          <tr><td>HCAR</td><td>250.10</td><td>251.00</td><td>255.00</td><td>249.00</td><td>254.30</td><td>4.20</td><td>1,234,500</td></tr>
        </table>
        <h4>CEMENT</h4>
        <table>
          <tr><th>SCRIP</th><th>LDCP</th><th>OPEN</th><th>HIGH</th><th>LOW</th><th>CURRENT</th><th>CHANGE</th><th>VOLUME</th></tr>
          <tr><td>LUCK</td><td>900.00</td><td>905.00</td><td>910.00</td><td>899.00</td><td>902.50</td><td>2.50</td><td>85,000</td></tr>
        </table>
        <table><tr><th>Symbol</th><th>Open</th></tr><tr><td>X</td><td>1</td></tr></table>"#;

    #[test]
    fn test_indices_ldcp_and_unpublished_columns() {
        let plan = indices_plan(500).unwrap();
        let doc = RawDocument::new(INDICES_URL, DPS_INDICES);
        let set = plan.pipeline.finalize(plan.pipeline.records(&doc).unwrap(), 500);

        assert_eq!(set.len(), 2);
        let kse = &set.records()[0];
        assert_eq!(kse.value("Index Name"), &Value::Text("KSE100".into()));
        assert_eq!(kse.value("LDCP").as_f64().map(|v| (v * 100.0).round()), Some(8107100.0));
        assert_eq!(kse.value("Change %"), &Value::Float(-0.15));
        assert_eq!(kse.value("Open"), &Value::Absent);
        assert_eq!(kse.value("Volume"), &Value::Absent);
        assert_eq!(kse.value("source"), &Value::Text("dps.psx.com.pk/indices".into()));

        let kmi = &set.records()[1];
        assert_eq!(kmi.value("Current"), &Value::Float(125000.0));
        assert_eq!(kmi.value("High"), &Value::Absent);
        assert_eq!(kmi.value("LDCP"), &Value::Absent);
        assert_eq!(kmi.value("source_as_of"), &Value::Absent);
    }

    #[test]
    fn test_indices_carry_the_as_of_stamp() {
        let plan = indices_plan(500).unwrap();
        let page = format!("<p class=\"stamp\">As of <b>Oct 14, 2026 3:45 PM</b></p>{DPS_INDICES}");
        let doc = RawDocument::new(INDICES_URL, page.as_str());
        let set = plan.pipeline.finalize(plan.pipeline.records(&doc).unwrap(), 500);

        assert_eq!(set.columns().last().map(String::as_str), Some("source_as_of"));
        for r in set.records() {
            assert_eq!(r.value("source_as_of"), &Value::Text("Oct 14, 2026 3:45 PM".into()));
        }
    }

    #[test]
    fn test_mainboard_concatenates_sector_tables() {
        let plan = mainboard_plan(500).unwrap();
        let doc = RawDocument::new(MARKET_SUMMARY_URL, MARKET_SUMMARY);
        let set = plan.pipeline.finalize(plan.pipeline.records(&doc).unwrap(), 500);

        let scrips: Vec<_> = set
            .records()
            .iter()
            .map(|r| r.value("Index Name (SCRIP)").to_cell())
            .collect();
        assert_eq!(scrips, vec!["HCAR", "LUCK"]);
        assert_eq!(set.records()[0].value("Volume"), &Value::Integer(1_234_500));
        assert_eq!(set.records()[1].value("source"), &Value::Text("psx.com.pk/market-summary".into()));
    }

    #[test]
    fn test_mainboard_needs_a_scrip_column() {
        let plan = mainboard_plan(500).unwrap();
        let page = format!(
            "{MARKET_SUMMARY}<table>\
               <tr><th>SYMBOL</th><th>LDCP</th><th>OPEN</th><th>HIGH</th><th>LOW</th><th>CURRENT</th><th>CHANGE</th><th>VOLUME</th></tr>\
               <tr><td>Sector total</td><td>1</td><td>1</td><td>1</td><td>1</td><td>1</td><td>0</td><td>10</td></tr>\
             </table>"
        );
        let doc = RawDocument::new(MARKET_SUMMARY_URL, page.as_str());
        let set = plan.pipeline.finalize(plan.pipeline.records(&doc).unwrap(), 500);

        assert_eq!(set.len(), 2);
        assert!(set.records().iter().all(|r| !r.value("Index Name (SCRIP)").is_absent()));
    }

    #[tokio::test]
    async fn test_missing_mainboard_is_empty_not_fatal() {
        let plan = mainboard_plan(500).unwrap();
        let source = StubSource::new().page(MARKET_SUMMARY_URL, "<table><tr><th>Symbol</th></tr></table>");
        let collector = Collector::new(Arc::new(source));

        let set = collect_mainboard(&plan, &collector).await.unwrap();
        assert!(set.is_empty());
        assert_eq!(set.columns()[0], "Index Name (SCRIP)");
    }

    #[tokio::test]
    async fn test_mainboard_fetch_failure_still_fails() {
        let plan = mainboard_plan(500).unwrap();
        let source = StubSource::new().failing(MARKET_SUMMARY_URL, FetchErrorKind::HttpStatus(503));
        let collector = Collector::new(Arc::new(source));

        let err = collect_mainboard(&plan, &collector).await.unwrap_err();
        assert!(matches!(
            err,
            CollectError::Exhausted {
                last: EndpointError::Fetch(_),
                ..
            }
        ));
    }
}
