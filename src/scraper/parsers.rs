use crate::error::{FetchError, Result};
use crate::models::{ColumnSchema, TableShape, Value};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::cleaner::{json_to_value, parse_cell};

// html5ever wraps bare <tr> children in <tbody>, so both forms are matched.
static ROW_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("table.list_table > tbody > tr, table.list_table > tr")
        .expect("list_table row selector")
});
static TABLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table.list_table").expect("list_table selector"));
static CELL_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("td, th").expect("cell selector"));
static PAGER_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.pages a").expect("pager selector"));
static PAGE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("page token regex"));

// ── Finance list pages ────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct ParsedPage {
    pub rows: Vec<Vec<Value>>,
    /// Page number carried by the last pager anchor, if any.
    pub next_page: Option<u32>,
}

/// Raw rows of the `list_table`, header rows excluded. A row is exactly as
/// wide as its source markup; no schema is applied yet.
///
/// A page without any `list_table` (block page, layout change) is an error;
/// a table holding only its header is a valid empty page.
pub fn parse_list_table(html: &str) -> Result<ParsedPage> {
    let doc = Html::parse_document(html);
    if doc.select(&TABLE_SELECTOR).next().is_none() {
        return Err(FetchError::Parse("no list_table on page".into()));
    }

    let rows = doc
        .select(&ROW_SELECTOR)
        .filter_map(|tr| {
            let cells: Vec<ElementRef> = tr.select(&CELL_SELECTOR).collect();
            if cells.is_empty() || cells.iter().all(|c| c.value().name() == "th") {
                return None;
            }
            Some(
                cells
                    .iter()
                    .map(|c| parse_cell(&c.text().collect::<String>()))
                    .collect(),
            )
        })
        .collect();

    Ok(ParsedPage {
        rows,
        next_page: next_page_token(&doc),
    })
}

/// Parse one finance page and align every row to `shape`.
pub fn parse_report_page(html: &str, shape: &TableShape) -> Result<ParsedPage> {
    let page = parse_list_table(html)?;
    let rows = page
        .rows
        .into_iter()
        .map(|row| shape.reshape(row))
        .collect::<Result<Vec<_>>>()?;

    Ok(ParsedPage {
        rows,
        next_page: page.next_page,
    })
}

/// The pager's last anchor holds the "next" control, e.g.
/// `onclick="set_page_num('3')"` → 3. No onclick means no further page.
pub fn next_page_token(doc: &Html) -> Option<u32> {
    let last = doc.select(&PAGER_SELECTOR).last()?;
    let onclick = last.value().attr("onclick")?;
    PAGE_TOKEN.find(onclick)?.as_str().parse().ok()
}

// ── Screener listing JSON ─────────────────────────────────────────────────────

/// Rows of `{"data": {"list": [...]}}`, projected onto `schema` by field name.
/// A null or empty list yields no rows; a missing `data` object is an error.
pub fn parse_profile_page(
    payload: &serde_json::Value,
    schema: &ColumnSchema,
) -> Result<Vec<Vec<Value>>> {
    let data = payload
        .get("data")
        .filter(|d| d.is_object())
        .ok_or_else(|| FetchError::Parse("listing payload has no `data` object".into()))?;

    let list = match data.get("list") {
        None | Some(serde_json::Value::Null) => return Ok(Vec::new()),
        Some(serde_json::Value::Array(items)) => items,
        Some(other) => {
            return Err(FetchError::Parse(format!(
                "listing `data.list` is not an array: {}",
                other
            )));
        }
    };

    list.iter()
        .map(|item| {
            let obj = item
                .as_object()
                .ok_or_else(|| FetchError::Parse(format!("listing row is not an object: {}", item)))?;
            Ok(schema
                .names()
                .iter()
                .map(|col| obj.get(col).map(json_to_value).unwrap_or(Value::Empty))
                .collect())
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
