//! Short explanations of which elements drove a comparator score

use crate::processing::element::{EcElement, ElementScores};

/// Similarity at or above which an element counts as aligned
pub const ALIGNED_THRESHOLD: f64 = 0.5;
/// Similarity below which an element counts as missing
pub const MISSING_THRESHOLD: f64 = 0.2;

pub fn aligned_elements(scores: &ElementScores) -> Vec<EcElement> {
    scores
        .iter()
        .filter(|(_, score)| **score >= ALIGNED_THRESHOLD)
        .map(|(element, _)| element)
        .collect()
}

pub fn missing_elements(scores: &ElementScores) -> Vec<EcElement> {
    scores
        .iter()
        .filter(|(_, score)| **score < MISSING_THRESHOLD)
        .map(|(element, _)| element)
        .collect()
}

/// `Aligned: <names>. Missing: <names>.` in canonical element order.
/// Elements scoring in [0.2, 0.5) appear in neither list.
pub fn explain(scores: &ElementScores) -> String {
    format!(
        "Aligned: {}. Missing: {}.",
        join_names(&aligned_elements(scores)),
        join_names(&missing_elements(scores))
    )
}

fn join_names(elements: &[EcElement]) -> String {
    if elements.is_empty() {
        return "none".to_string();
    }
    elements
        .iter()
        .map(|e| e.name())
        .collect::<Vec<_>>()
        .join(", ")
}
