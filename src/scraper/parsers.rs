use crate::models::{CandidateTable, RawDocument};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

/// Upper bound for `colspan`; pages occasionally carry `colspan="1000"`.
const MAX_COLSPAN: usize = 64;

// ── Extraction strategies ─────────────────────────────────────────────────────

/// How a task lifts candidate grids out of a page.
#[derive(Debug, Clone)]
pub enum Extractor {
    /// Every `<table>` on the page.
    Tables,
    /// A list of links turned into a two-column text/href grid.
    Anchors(AnchorSpec),
    /// Repeated card elements, one row per card.
    Cards(CardSpec),
}

impl Extractor {
    pub fn extract(&self, doc: &RawDocument) -> Vec<CandidateTable> {
        match self {
            Extractor::Tables => extract_tables(&doc.body),
            Extractor::Anchors(spec) => extract_anchors(&doc.body, spec, &doc.url),
            Extractor::Cards(spec) => extract_cards(&doc.body, spec, &doc.url),
        }
    }
}

/// Anchor-list extraction settings.
#[derive(Debug, Clone)]
pub struct AnchorSpec {
    pub selector: String,
    /// Href must contain this to be kept (e.g. "/news/").
    pub href_contains: Option<String>,
    /// Phrases removed from the link text ("Image:").
    pub strip: Vec<String>,
    /// Lowercase fragments that disqualify a link ("view programmes").
    pub reject: Vec<String>,
    pub min_text_len: usize,
    pub text_header: String,
    pub href_header: String,
}

impl AnchorSpec {
    pub fn new(selector: &str, text_header: &str, href_header: &str) -> Self {
        Self {
            selector: selector.to_string(),
            href_contains: None,
            strip: Vec::new(),
            reject: Vec::new(),
            min_text_len: 1,
            text_header: text_header.to_string(),
            href_header: href_header.to_string(),
        }
    }
}

/// Where a card field's text comes from.
#[derive(Debug, Clone)]
pub enum CardSource {
    /// Attribute of the first matching element that has it.
    Attr { selector: String, attr: String },
    /// `href` of the first matching element, resolved against the page URL.
    Link(String),
    /// Text of the first matching element with any.
    Text(String),
    /// Shortest element text containing the needle (case-insensitive).
    Containing(String),
    /// The whole card's text.
    CardText,
    /// Listed keywords found in the card text, sorted and comma-joined.
    Keywords(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct CardField {
    pub header: String,
    /// Tried in order; the first non-empty result wins.
    pub sources: Vec<CardSource>,
}

impl CardField {
    pub fn new(header: &str, sources: Vec<CardSource>) -> Self {
        Self {
            header: header.to_string(),
            sources,
        }
    }
}

/// Card extraction settings.
#[derive(Debug, Clone)]
pub struct CardSpec {
    /// Card selectors in order of preference; the first one matching
    /// anything is used.
    pub cards: Vec<String>,
    pub fields: Vec<CardField>,
}

fn collapse(text: impl Iterator<Item = impl AsRef<str>>) -> String {
    let mut out = String::new();
    for chunk in text {
        for word in chunk.as_ref().split_whitespace() {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(word);
        }
    }
    out
}

fn element_text(el: &ElementRef) -> String {
    collapse(el.text())
}

fn sel(s: &str) -> Option<Selector> {
    Selector::parse(s)
        .map_err(|e| warn!("Invalid selector {:?}: {:?}", s, e))
        .ok()
}

/// Whitespace-collapsed text of the whole document, text nodes joined as
/// they stand.
pub fn page_text(markup: &str) -> String {
    let raw: String = Html::parse_document(markup).root_element().text().collect();
    collapse(std::iter::once(raw))
}

// ── <table> grids ─────────────────────────────────────────────────────────────

/// Cells of one `<tr>`, `colspan` expanded, and whether every cell is a `<th>`.
fn row_cells(tr: ElementRef) -> (Vec<String>, bool) {
    let mut cells = Vec::new();
    let mut all_th = true;
    let mut any = false;

    for cell in tr.child_elements() {
        let name = cell.value().name();
        if name != "td" && name != "th" {
            continue;
        }
        any = true;
        all_th &= name == "th";
        let span = cell
            .value()
            .attr("colspan")
            .and_then(|s| s.trim().parse::<usize>().ok())
            .unwrap_or(1)
            .clamp(1, MAX_COLSPAN);
        let text = element_text(&cell);
        for _ in 0..span {
            cells.push(text.clone());
        }
    }
    (cells, any && all_th)
}

/// Rows owned by `table` itself, not by tables nested inside it.
fn own_rows<'a>(table: ElementRef<'a>, tr_sel: &Selector) -> Vec<(ElementRef<'a>, bool)> {
    table
        .select(tr_sel)
        .filter(|tr| {
            tr.ancestors()
                .filter_map(ElementRef::wrap)
                .find(|a| a.value().name() == "table")
                .is_some_and(|t| t.id() == table.id())
        })
        .map(|tr| {
            let in_thead = tr
                .parent()
                .and_then(ElementRef::wrap)
                .is_some_and(|p| p.value().name() == "thead");
            (tr, in_thead)
        })
        .collect()
}

/// Every `<table>` on the page as a candidate grid. Never fails; markup
/// that yields nothing usable yields an empty list.
pub fn extract_tables(markup: &str) -> Vec<CandidateTable> {
    let doc = Html::parse_document(markup);
    let (Some(table_sel), Some(tr_sel)) = (sel("table"), sel("tr")) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for table in doc.select(&table_sel) {
        let rows = own_rows(table, &tr_sel);

        let mut headers: Option<Vec<String>> = None;
        let mut body = Vec::new();
        for (tr, in_thead) in rows {
            let (cells, all_th) = row_cells(tr);
            if cells.is_empty() {
                continue;
            }
            if headers.is_none() && body.is_empty() && (in_thead || all_th) {
                headers = Some(cells);
            } else if in_thead || all_th {
                // second header row or stray <th> row
                continue;
            } else {
                body.push(cells);
            }
        }

        let headers = match headers {
            Some(h) => h,
            None => {
                let width = body.iter().map(Vec::len).max().unwrap_or(0);
                vec![String::new(); width]
            }
        };
        if headers.is_empty() && body.is_empty() {
            continue;
        }
        out.push(CandidateTable::new(headers, body));
    }

    debug!("Extracted {} candidate tables", out.len());
    out
}

fn resolve(base: Option<&url::Url>, href: &str) -> String {
    match base {
        Some(b) => b.join(href).map(|u| u.to_string()).unwrap_or_else(|_| href.to_string()),
        None => href.to_string(),
    }
}

// ── Anchor lists ──────────────────────────────────────────────────────────────

/// Links matching `spec` as a single two-column candidate, hrefs resolved
/// against `base_url`. Empty if nothing matched.
pub fn extract_anchors(markup: &str, spec: &AnchorSpec, base_url: &str) -> Vec<CandidateTable> {
    let Some(a_sel) = sel(&spec.selector) else {
        return Vec::new();
    };
    let base = url::Url::parse(base_url).ok();
    let doc = Html::parse_document(markup);

    let mut rows = Vec::new();
    for a in doc.select(&a_sel) {
        let Some(href) = a.value().attr("href").map(str::trim).filter(|h| !h.is_empty()) else {
            continue;
        };
        if let Some(needle) = &spec.href_contains {
            if !href.contains(needle.as_str()) {
                continue;
            }
        }

        let mut text = element_text(&a);
        for phrase in &spec.strip {
            text = text.replace(phrase.as_str(), "");
        }
        let text = collapse(std::iter::once(text));
        if text.chars().count() < spec.min_text_len {
            continue;
        }
        let lower = text.to_lowercase();
        if spec.reject.iter().any(|r| lower.contains(r.as_str())) {
            continue;
        }

        rows.push(vec![text, resolve(base.as_ref(), href)]);
    }

    if rows.is_empty() {
        return Vec::new();
    }
    vec![CandidateTable::new(
        vec![spec.text_header.clone(), spec.href_header.clone()],
        rows,
    )]
}

// ── Cards ─────────────────────────────────────────────────────────────────────

fn matching<'a>(card: ElementRef<'a>, selector: &str) -> Vec<ElementRef<'a>> {
    match sel(selector) {
        Some(s) => card.select(&s).collect(),
        None => Vec::new(),
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn card_value(card: ElementRef, source: &CardSource, base: Option<&url::Url>) -> Option<String> {
    match source {
        CardSource::Attr { selector, attr } => matching(card, selector)
            .into_iter()
            .find_map(|el| el.value().attr(attr).and_then(non_empty))
            .map(|v| collapse(std::iter::once(v))),
        CardSource::Link(selector) => matching(card, selector)
            .into_iter()
            .find_map(|el| el.value().attr("href").and_then(non_empty))
            .map(|href| resolve(base, &href)),
        CardSource::Text(selector) => matching(card, selector)
            .into_iter()
            .find_map(|el| non_empty(&element_text(&el))),
        CardSource::Containing(needle) => {
            let needle = needle.to_lowercase();
            card.descendants()
                .filter_map(ElementRef::wrap)
                .map(|el| element_text(&el))
                .filter(|text| text.to_lowercase().contains(&needle))
                .min_by_key(|text| text.len())
        }
        CardSource::CardText => non_empty(&element_text(&card)),
        CardSource::Keywords(keywords) => {
            let text = element_text(&card).to_lowercase();
            let mut found: Vec<&str> = keywords
                .iter()
                .filter(|k| text.contains(&k.to_lowercase()))
                .map(String::as_str)
                .collect();
            found.sort_unstable();
            found.dedup();
            (!found.is_empty()).then(|| found.join(", "))
        }
    }
}

/// One row per card, one column per field, as a single candidate. Cards
/// with every field empty are dropped; no cards gives an empty list.
pub fn extract_cards(markup: &str, spec: &CardSpec, base_url: &str) -> Vec<CandidateTable> {
    let doc = Html::parse_document(markup);
    let base = url::Url::parse(base_url).ok();

    let Some(cards) = spec
        .cards
        .iter()
        .filter_map(|s| sel(s))
        .map(|s| doc.select(&s).collect::<Vec<_>>())
        .find(|cards| !cards.is_empty())
    else {
        return Vec::new();
    };

    let rows: Vec<Vec<String>> = cards
        .into_iter()
        .map(|card| {
            spec.fields
                .iter()
                .map(|f| {
                    f.sources
                        .iter()
                        .find_map(|src| card_value(card, src, base.as_ref()))
                        .unwrap_or_default()
                })
                .collect::<Vec<_>>()
        })
        .filter(|row| row.iter().any(|c| !c.is_empty()))
        .collect();

    debug!("Extracted {} cards", rows.len());
    if rows.is_empty() {
        return Vec::new();
    }
    vec![CandidateTable::new(
        spec.fields.iter().map(|f| f.header.clone()).collect(),
        rows,
    )]
}
