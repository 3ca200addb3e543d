//! Page-structured JSON content.
//!
//! Documents extracted page by page are stored as a JSON array:
//!
//! ```json
//! [{ "page_number": 1, "content": "..." }, { "page_number": 2, "content": "..." }]
//! ```
//!
//! Each page becomes one unit whose index is its page number.

use super::SourceError;
use crate::job::{ProcessedUnit, Unit};
use serde::{Deserialize, Serialize};

/// One page of a page-structured document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub page_number: u64,
    pub content: String,
}

/// Parses page JSON into units keyed by page number.
pub fn units_from_pages_json(json: &str) -> Result<Vec<Unit>, SourceError> {
    let pages: Vec<Page> = serde_json::from_str(json)?;
    if pages.is_empty() {
        return Err(SourceError::NoPages);
    }
    Ok(pages
        .into_iter()
        .map(|page| Unit::new(page.page_number, page.content))
        .collect())
}

/// Serializes processed units back to page JSON, ascending by page number.
pub fn pages_to_json(units: &[ProcessedUnit]) -> Result<String, SourceError> {
    let mut pages: Vec<Page> = units
        .iter()
        .map(|unit| Page {
            page_number: unit.index,
            content: unit.content.clone(),
        })
        .collect();
    pages.sort_by_key(|page| page.page_number);
    Ok(serde_json::to_string(&pages)?)
}

/// Returns true if `content` looks like page JSON: a non-empty array whose
/// first element has a `page_number`.
pub fn is_pages_json(content: &str) -> bool {
    let Ok(serde_json::Value::Array(items)) = serde_json::from_str::<serde_json::Value>(content)
    else {
        return false;
    };
    items
        .first()
        .and_then(|first| first.get("page_number"))
        .is_some()
}
