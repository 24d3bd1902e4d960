//! Report structures for a comparator search

use crate::processing::comparator::{ComparisonResult, Interpretation};
use crate::processing::element::ElementTextMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Everything a formatter needs to render one search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub metadata: ReportMetadata,

    /// Displayed comparators, best first
    pub results: Vec<ComparisonResult>,

    pub interpretation: Interpretation,

    /// Element text the search ran on, when requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elements: Option<ElementTextMap>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub generated_at: DateTime<Utc>,
    pub input_file: String,
    pub embedding_model: String,
    pub corpus_size: usize,
    pub tool_version: String,
}

impl ReportMetadata {
    pub fn new(input_file: impl Into<String>, embedding_model: impl Into<String>, corpus_size: usize) -> Self {
        Self {
            generated_at: Utc::now(),
            input_file: input_file.into(),
            embedding_model: embedding_model.into(),
            corpus_size,
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ComparisonReport {
    /// The interpretation is derived from `results`
    pub fn new(metadata: ReportMetadata, results: Vec<ComparisonResult>) -> Self {
        let interpretation = Interpretation::from_results(&results);
        Self {
            metadata,
            results,
            interpretation,
            elements: None,
        }
    }

    pub fn with_elements(mut self, elements: ElementTextMap) -> Self {
        self.elements = Some(elements);
        self
    }
}
