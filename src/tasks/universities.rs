use super::{TaskPlan, check_identity, endpoints};
use crate::config::EnrichConfig;
use crate::enrich::enrich_column;
use crate::errors::{CollectError, SchemaError};
use crate::models::{RawDocument, RecordSet, Value};
use crate::pipeline::{Collector, EndpointPipeline, Selection};
use crate::scraper::{AnchorSpec, DocumentSource, Extractor, TokenSet};
use crate::schema::{Derivation, FieldSpec, Fill, Identity, Schema};
use crate::summary::group_summary;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::{Arc, LazyLock};
use tracing::info;

pub const ARTICLE_URL: &str =
    "https://www.topuniversities.com/student-info/choosing-university/worlds-top-100-universities";

pub const UNKNOWN: &str = "Unknown";

/// Link texts that point at programme pages rather than universities.
const NOT_A_NAME: &[&str] = &[
    "view programme",
    "view programmes",
    "view program",
    "view programs",
    "view courses",
    "view course",
    "find out more",
];

const COUNTRY_ALIASES: &[(&str, &str)] = &[
    ("Hong Kong SAR", "Hong Kong"),
    ("Hong Kong SAR China", "Hong Kong"),
    ("Mainland China", "China"),
    ("U.A.E.", "UAE"),
    ("Korea, South", "South Korea"),
    ("Russian Federation", "Russia"),
];

const REGIONS: &[(&str, &[&str])] = &[
    (
        "Europe",
        &[
            "United Kingdom", "UK", "England", "Scotland", "Wales", "Ireland", "France", "Germany",
            "Netherlands", "Switzerland", "Sweden", "Denmark", "Finland", "Norway", "Italy", "Spain",
            "Portugal", "Belgium", "Austria", "Poland", "Czechia", "Czech Republic", "Hungary",
            "Greece", "Turkey", "Russia",
        ],
    ),
    ("North America", &["United States", "USA", "Canada"]),
    (
        "Asia",
        &[
            "China", "Hong Kong", "Macao", "Macau", "Taiwan", "Japan", "Singapore", "South Korea",
            "Republic of Korea", "India", "Pakistan", "Malaysia", "Thailand", "United Arab Emirates",
            "UAE", "Saudi Arabia", "Qatar", "Kuwait", "Bangladesh", "Sri Lanka", "Indonesia",
        ],
    ),
    ("Oceania", &["Australia", "New Zealand"]),
    ("South America", &["Brazil", "Argentina", "Chile", "Colombia", "Peru"]),
    ("Africa", &["South Africa", "Egypt", "Morocco", "Kenya", "Nigeria", "Ghana", "Tunisia"]),
];

static STUDY_IN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(study in|universities in)\s+").expect("static regex"));

pub fn normalize_country(raw: &str) -> Option<String> {
    let c = raw.trim();
    if c.is_empty() {
        return None;
    }
    let c = COUNTRY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == c)
        .map_or(c, |(_, canonical)| *canonical);
    Some(c.to_string())
}

pub fn region_for(country: &str) -> &'static str {
    let Some(c) = normalize_country(country) else {
        return UNKNOWN;
    };
    REGIONS
        .iter()
        .find(|(_, members)| members.contains(&c.as_str()))
        .map_or(UNKNOWN, |(region, _)| *region)
}

fn region_of(inputs: &[&Value]) -> Value {
    match inputs {
        [Value::Text(country)] => Value::Text(region_for(country).to_string()),
        _ => Value::Text(UNKNOWN.to_string()),
    }
}

/// QS top-100 article: the first `target_count` distinct university links.
/// Country comes from each profile page afterwards; the overall score is not
/// published in the article and stays empty.
pub fn plan(target_count: usize) -> Result<TaskPlan, SchemaError> {
    let mut anchors = AnchorSpec::new("a[href*='/universities/']", "University", "URL");
    anchors.href_contains = Some("/universities/".to_string());
    anchors.reject = NOT_A_NAME.iter().map(|s| s.to_string()).collect();

    let schema = Schema::new(
        vec![
            FieldSpec::text("University").exact(["university"]),
            FieldSpec::text("Country").or_default(Fill::Text(UNKNOWN.to_string())),
            FieldSpec::float("OverallScore"),
            FieldSpec::text("SubjectRanking").or_default(Fill::Text("Not listed".to_string())),
            FieldSpec::text("URL").exact(["url"]),
            FieldSpec::text("Region"),
        ],
        vec![Derivation::new("Region", &["Country"], region_of)],
    )?;
    let identity = Identity::Column("University".to_string());
    check_identity(&schema, &identity)?;

    Ok(TaskPlan {
        name: "universities",
        endpoints: endpoints(&[ARTICLE_URL]),
        target_count,
        pipeline: EndpointPipeline {
            extractor: Extractor::Anchors(anchors),
            tokens: TokenSet::new(["university", "url"]),
            selection: Selection::Best,
            schema,
            identity,
        },
    })
}

/// Collect the list, fill Country from the profile pages, then re-derive
/// Region.
pub async fn collect(
    plan: &TaskPlan,
    collector: &Collector,
    profiles: Arc<dyn DocumentSource>,
    config: &EnrichConfig,
) -> Result<RecordSet, CollectError> {
    let listed = plan.collect(collector).await?;
    let records = enrich_column(listed.into_records(), "URL", "Country", profiles, country_from_page, config).await;
    Ok(plan.pipeline.schema.reconcile(records))
}

/// `(file name, summary)` pairs written next to the main table.
pub fn summaries(set: &RecordSet) -> Vec<(&'static str, RecordSet)> {
    let by_country = group_summary(set, "Country", "OverallScore").truncate(15);
    let by_region = group_summary(set, "Region", "OverallScore");
    info!("{} countries, {} regions", by_country.len(), by_region.len());
    vec![("universities_by_country", by_country), ("universities_by_region", by_region)]
}

// ── Country lookup ────────────────────────────────────────────────────────────

/// Country of a university profile page, normalised; Absent if the page
/// does not say.
pub fn country_from_page(doc: &RawDocument) -> Value {
    let html = Html::parse_document(&doc.body);
    let found = country_from_json_ld(&html)
        .or_else(|| country_from_location_links(&html))
        .or_else(|| country_from_microdata(&html));
    Value::from_text(found.as_deref().and_then(normalize_country))
}

fn first_country(value: &serde_json::Value) -> Option<String> {
    let address = value.get("address")?;
    let addresses: Vec<&serde_json::Value> = match address {
        serde_json::Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    addresses.into_iter().find_map(|a| {
        ["addressCountry", "addressCountryCode"].iter().find_map(|key| {
            match a.get(*key)? {
                serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                serde_json::Value::Object(o) => o
                    .get("name")
                    .and_then(serde_json::Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
                _ => None,
            }
        })
    })
}

fn country_from_json_ld(html: &Html) -> Option<String> {
    let sel = Selector::parse(r#"script[type="application/ld+json"]"#).ok()?;
    html.select(&sel).find_map(|script| {
        let text: String = script.text().collect();
        let data: serde_json::Value = serde_json::from_str(text.trim()).ok()?;
        match &data {
            serde_json::Value::Array(items) => items.iter().find_map(first_country),
            obj => first_country(obj),
        }
    })
}

/// Longest `/locations/` link text; breadcrumbs usually end with the
/// country.
fn country_from_location_links(html: &Html) -> Option<String> {
    let sel = Selector::parse(r#"a[href^="/locations/"], a[href*="topuniversities.com/locations/"]"#).ok()?;
    let mut texts: Vec<String> = html
        .select(&sel)
        .map(|a| a.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" "))
        .filter(|t| t.chars().count() >= 3 && t.chars().any(|c| c.is_ascii_alphabetic()))
        .collect();
    texts.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then_with(|| a.cmp(b)));
    texts.dedup();

    texts.into_iter().find_map(|t| {
        let stripped = STUDY_IN.replace(&t, "").trim().to_string();
        (3..=40).contains(&stripped.chars().count()).then_some(stripped)
    })
}

fn country_from_microdata(html: &Html) -> Option<String> {
    let sel = Selector::parse(r#"[itemprop="addressCountry"]"#).ok()?;
    let el = html.select(&sel).next()?;
    let text = el
        .value()
        .attr("content")
        .map(str::to_string)
        .unwrap_or_else(|| el.text().collect::<String>());
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
