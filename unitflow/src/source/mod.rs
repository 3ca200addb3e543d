//! Content sources: turning documents into units and results back into
//! documents.
//!
//! Two shapes are supported. Plain text is split into paragraph-packed
//! chunks; page JSON yields one unit per page. [`Document::parse`] picks
//! the shape from the content itself, falling back to plain text.

mod pages;
mod text;

pub use pages::{is_pages_json, pages_to_json, units_from_pages_json, Page};
pub use text::{split_text, units_from_text, PARAGRAPH_SEPARATOR};

use crate::job::{ProcessedUnit, Unit};
use thiserror::Error;

/// Errors reading or writing structured content.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Invalid page JSON: {0}")]
    InvalidPages(#[from] serde_json::Error),

    #[error("Page JSON contains no pages")]
    NoPages,
}

/// A document in one of the supported shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Document {
    Text(String),
    Pages(String),
}

impl Document {
    /// Detects page JSON, otherwise treats the content as plain text.
    pub fn parse(content: impl Into<String>) -> Self {
        let content = content.into();
        if is_pages_json(&content) {
            Self::Pages(content)
        } else {
            Self::Text(content)
        }
    }

    pub fn is_pages(&self) -> bool {
        matches!(self, Self::Pages(_))
    }

    /// Splits the document into units.
    pub fn units(&self, chunk_size: usize) -> Result<Vec<Unit>, SourceError> {
        match self {
            Self::Text(text) => Ok(units_from_text(text, chunk_size)),
            Self::Pages(json) => units_from_pages_json(json),
        }
    }

    /// Renders processed units in this document's shape.
    pub fn render(&self, units: &[ProcessedUnit]) -> Result<String, SourceError> {
        match self {
            Self::Text(_) => {
                let mut sorted: Vec<&ProcessedUnit> = units.iter().collect();
                sorted.sort_by_key(|unit| unit.index);
                Ok(sorted
                    .iter()
                    .map(|unit| unit.content.as_str())
                    .collect::<Vec<_>>()
                    .join(PARAGRAPH_SEPARATOR))
            }
            Self::Pages(_) => pages_to_json(units),
        }
    }
}
