use super::{TaskPlan, check_identity, endpoints};
use crate::errors::SchemaError;
use crate::pipeline::{EndpointPipeline, Selection};
use crate::scraper::{AnchorSpec, Extractor, TokenSet};
use crate::schema::{FieldSpec, Fill, Identity, Schema};

pub const ENDPOINTS: &[&str] = &["https://www.dawn.com", "https://www.dawn.com/latest-news"];

pub const NO_URL: &str = "No URL available";

/// Front-page and latest-news headline links.
pub fn plan(target_count: usize) -> Result<TaskPlan, SchemaError> {
    let mut anchors = AnchorSpec::new("h1 a[href], h2 a[href], h3 a[href]", "headline", "url");
    anchors.href_contains = Some("/news/".to_string());
    anchors.strip = vec!["Image:".to_string()];
    anchors.min_text_len = 5;

    let schema = Schema::new(
        vec![
            FieldSpec::text("headline").exact(["headline"]),
            FieldSpec::text("url")
                .exact(["url"])
                .or_default(Fill::Text(NO_URL.to_string())),
            FieldSpec::scraped_at(),
            FieldSpec::source(),
        ],
        vec![],
    )?;

    let identity = Identity::Url("url".to_string());
    check_identity(&schema, &identity)?;

    Ok(TaskPlan {
        name: "headlines",
        endpoints: endpoints(ENDPOINTS),
        target_count,
        pipeline: EndpointPipeline {
            extractor: Extractor::Anchors(anchors),
            tokens: TokenSet::new(["headline", "url"]),
            selection: Selection::Best,
            schema,
            identity,
        },
    })
}
