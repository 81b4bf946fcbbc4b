use super::{TaskPlan, check_identity};
use crate::errors::SchemaError;
use crate::pipeline::{EndpointPipeline, Selection};
use crate::scraper::{CardField, CardSource, CardSpec, Extractor, TokenSet};
use crate::schema::{FieldSpec, Fill, Identity, Schema};

pub const BASE_URL: &str = "https://www.daraz.pk";

pub const NOT_AVAILABLE: &str = "Not available";

/// Result pages fetched per search.
pub const MAX_PAGES: usize = 4;

const DELIVERY_KEYWORDS: &[&str] = &[
    "Free Delivery",
    "Fulfilled by Daraz",
    "Daraz Verified",
    "Mall",
    "Global",
    "Cash on Delivery",
];

/// `/catalog/?q=<query>&page=<n>` for pages 1..=`pages`.
pub fn search_urls(query: &str, pages: usize) -> Vec<String> {
    (1..=pages)
        .filter_map(|page| {
            let page = page.to_string();
            url::Url::parse_with_params(&format!("{BASE_URL}/catalog/"), [("q", query), ("page", page.as_str())]).ok()
        })
        .map(|u| u.to_string())
        .collect()
}

fn text(selector: &str) -> CardSource {
    CardSource::Text(selector.to_string())
}

fn attr(selector: &str, attr: &str) -> CardSource {
    CardSource::Attr {
        selector: selector.to_string(),
        attr: attr.to_string(),
    }
}

fn product_cards() -> CardSpec {
    CardSpec {
        cards: vec![
            "div[data-qa-locator='product-item'], div[data-qa-locator^='product-item']".to_string(),
            // generic grid tiles when the QA locators are missing
            "div.gridItem, div.box--ujueT, div.c2prKC".to_string(),
        ],
        fields: vec![
            CardField::new(
                "Title",
                vec![
                    attr("a[href*='/products/']", "title"),
                    text("[class*='title'], [data-qa-locator*='title']"),
                    text("a"),
                    attr("img[alt]", "alt"),
                ],
            ),
            CardField::new("Price", vec![CardSource::CardText]),
            CardField::new("Ratings", vec![text("[class*='rating__review']")]),
            CardField::new("Sold", vec![CardSource::Containing("sold".to_string())]),
            CardField::new(
                "DeliveryOptions",
                vec![CardSource::Keywords(DELIVERY_KEYWORDS.iter().map(|k| k.to_string()).collect())],
            ),
            CardField::new(
                "ProductURL",
                vec![
                    CardSource::Link("a[href*='/products/']".to_string()),
                    CardSource::Link("a[href]".to_string()),
                ],
            ),
        ],
    }
}

/// Product cards from the search-result pages for `query`. Price is the
/// first currency amount on the card; Ratings and Sold are counts.
pub fn plan(query: &str, target_count: usize) -> Result<TaskPlan, SchemaError> {
    let schema = Schema::new(
        vec![
            FieldSpec::text("Title").exact(["title"]),
            FieldSpec::currency("Price")
                .exact(["price"])
                .or_default(Fill::Text(NOT_AVAILABLE.to_string())),
            FieldSpec::integer("Ratings").exact(["ratings"]),
            FieldSpec::integer("Sold").exact(["sold"]),
            FieldSpec::text("DeliveryOptions")
                .exact(["deliveryoptions"])
                .or_default(Fill::Text(NOT_AVAILABLE.to_string())),
            FieldSpec::text("ProductURL").exact(["producturl"]),
            FieldSpec::scraped_at(),
            FieldSpec::source(),
        ],
        vec![],
    )?;
    let identity = Identity::Url("ProductURL".to_string());
    check_identity(&schema, &identity)?;

    Ok(TaskPlan {
        name: "listings",
        endpoints: search_urls(query, MAX_PAGES),
        target_count,
        pipeline: EndpointPipeline {
            extractor: Extractor::Cards(product_cards()),
            tokens: TokenSet::new(["title", "price", "producturl"]),
            selection: Selection::Best,
            schema,
            identity,
        },
    })
}
