//! The nine EC classification elements and the per-element maps built on them

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::{Index, IndexMut};

/// One of the nine fixed EC classification dimensions.
///
/// Variant order is the canonical order used for embedding, explanation
/// text and report columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EcElement {
    #[serde(rename = "Decision Making")]
    DecisionMaking,
    #[serde(rename = "Leadership and Operational Management")]
    LeadershipAndOperationalManagement,
    #[serde(rename = "Communication")]
    Communication,
    #[serde(rename = "Knowledge of Specialized Fields")]
    KnowledgeOfSpecializedFields,
    #[serde(rename = "Contextual Knowledge")]
    ContextualKnowledge,
    #[serde(rename = "Research and Analysis")]
    ResearchAndAnalysis,
    #[serde(rename = "Physical Effort")]
    PhysicalEffort,
    #[serde(rename = "Sensory Effort")]
    SensoryEffort,
    #[serde(rename = "Working Conditions")]
    WorkingConditions,
}

pub const ELEMENT_COUNT: usize = 9;

impl EcElement {
    pub const ALL: [EcElement; ELEMENT_COUNT] = [
        EcElement::DecisionMaking,
        EcElement::LeadershipAndOperationalManagement,
        EcElement::Communication,
        EcElement::KnowledgeOfSpecializedFields,
        EcElement::ContextualKnowledge,
        EcElement::ResearchAndAnalysis,
        EcElement::PhysicalEffort,
        EcElement::SensoryEffort,
        EcElement::WorkingConditions,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EcElement::DecisionMaking => "Decision Making",
            EcElement::LeadershipAndOperationalManagement => "Leadership and Operational Management",
            EcElement::Communication => "Communication",
            EcElement::KnowledgeOfSpecializedFields => "Knowledge of Specialized Fields",
            EcElement::ContextualKnowledge => "Contextual Knowledge",
            EcElement::ResearchAndAnalysis => "Research and Analysis",
            EcElement::PhysicalEffort => "Physical Effort",
            EcElement::SensoryEffort => "Sensory Effort",
            EcElement::WorkingConditions => "Working Conditions",
        }
    }

    /// Position in the canonical order
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Match an element by name, ignoring case and surrounding whitespace
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = name.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|element| element.name().eq_ignore_ascii_case(wanted))
    }
}

impl fmt::Display for EcElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Free text per element. Absent elements read as empty text.
/// Serializes in canonical element order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementTextMap {
    texts: BTreeMap<EcElement, String>,
}

impl ElementTextMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, element: EcElement, text: impl Into<String>) -> Self {
        self.insert(element, text);
        self
    }

    pub fn insert(&mut self, element: EcElement, text: impl Into<String>) {
        self.texts.insert(element, text.into());
    }

    /// Text for an element, empty when the element was never supplied
    pub fn get(&self, element: EcElement) -> &str {
        self.texts.get(&element).map(String::as_str).unwrap_or("")
    }

    /// Trimmed text, or `None` when there is nothing to embed
    pub fn non_empty(&self, element: EcElement) -> Option<&str> {
        let text = self.get(element).trim();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    pub fn is_blank(&self) -> bool {
        EcElement::ALL.iter().all(|e| self.non_empty(*e).is_none())
    }

    /// Elements with text, in canonical order
    pub fn populated(&self) -> Vec<EcElement> {
        EcElement::ALL
            .iter()
            .copied()
            .filter(|e| self.non_empty(*e).is_some())
            .collect()
    }
}

/// Exactly one value per element, indexed by `EcElement`
#[derive(Debug, Clone, PartialEq)]
pub struct PerElement<T>([T; ELEMENT_COUNT]);

impl<T> PerElement<T> {
    pub fn from_fn(mut f: impl FnMut(EcElement) -> T) -> Self {
        Self(EcElement::ALL.map(|e| f(e)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (EcElement, &T)> {
        EcElement::ALL.iter().copied().zip(self.0.iter())
    }

    pub fn values(&self) -> &[T; ELEMENT_COUNT] {
        &self.0
    }
}

impl<T> Index<EcElement> for PerElement<T> {
    type Output = T;

    fn index(&self, element: EcElement) -> &T {
        &self.0[element.index()]
    }
}

impl<T> IndexMut<EcElement> for PerElement<T> {
    fn index_mut(&mut self, element: EcElement) -> &mut T {
        &mut self.0[element.index()]
    }
}

/// Per-element similarity scores for one comparison
pub type ElementScores = PerElement<f64>;

impl Serialize for PerElement<f64> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(ELEMENT_COUNT))?;
        for (element, score) in self.iter() {
            map.serialize_entry(element.name(), score)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PerElement<f64> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw: HashMap<EcElement, f64> = HashMap::deserialize(deserializer)?;
        Ok(PerElement::from_fn(|e| raw.get(&e).copied().unwrap_or(0.0)))
    }
}

/// One embedding per element, all of the same dimension
#[derive(Debug, Clone, PartialEq)]
pub struct ElementEmbeddings {
    vectors: PerElement<Vec<f32>>,
    dimensions: usize,
}

impl ElementEmbeddings {
    /// All-zero embeddings, used when every element is empty
    pub fn zeros(dimensions: usize) -> Self {
        Self {
            vectors: PerElement::from_fn(|_| vec![0.0; dimensions]),
            dimensions,
        }
    }

    /// Build from per-element vectors; every vector must have `dimensions` entries
    pub fn from_vectors(vectors: PerElement<Vec<f32>>, dimensions: usize) -> crate::Result<Self> {
        for (_, vector) in vectors.iter() {
            if vector.len() != dimensions {
                return Err(crate::RelativityError::DimensionMismatch {
                    left: vector.len(),
                    right: dimensions,
                });
            }
        }
        Ok(Self { vectors, dimensions })
    }

    pub fn get(&self, element: EcElement) -> &[f32] {
        &self.vectors[element]
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn iter(&self) -> impl Iterator<Item = (EcElement, &Vec<f32>)> {
        self.vectors.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_order_matches_index() {
        for (i, element) in EcElement::ALL.iter().enumerate() {
            assert_eq!(element.index(), i);
        }
    }

    #[test]
    fn test_from_name_is_case_insensitive() {
        assert_eq!(EcElement::from_name("decision making"), Some(EcElement::DecisionMaking));
        assert_eq!(
            EcElement::from_name("  Research and Analysis "),
            Some(EcElement::ResearchAndAnalysis)
        );
        assert_eq!(EcElement::from_name("Budgeting"), None);
    }

    #[test]
    fn test_missing_text_reads_as_empty() {
        let texts = ElementTextMap::new().with(EcElement::Communication, "   ");
        assert_eq!(texts.get(EcElement::DecisionMaking), "");
        assert_eq!(texts.non_empty(EcElement::Communication), None);
        assert!(texts.is_blank());
    }

    #[test]
    fn test_populated_follows_canonical_order() {
        let texts = ElementTextMap::new()
            .with(EcElement::WorkingConditions, "Office")
            .with(EcElement::DecisionMaking, "Approves budgets");
        assert_eq!(
            texts.populated(),
            vec![EcElement::DecisionMaking, EcElement::WorkingConditions]
        );
    }

    #[test]
    fn test_text_map_serializes_with_element_names() {
        let texts = ElementTextMap::new().with(EcElement::SensoryEffort, "Screen work");
        let json = serde_json::to_string(&texts).unwrap();
        assert_eq!(json, r#"{"Sensory Effort":"Screen work"}"#);
    }

    #[test]
    fn test_text_map_serializes_in_canonical_order() {
        let texts = ElementTextMap::new()
            .with(EcElement::WorkingConditions, "Office")
            .with(EcElement::Communication, "Briefings")
            .with(EcElement::DecisionMaking, "Approves budgets");
        let json = serde_json::to_string(&texts).unwrap();
        assert_eq!(
            json,
            r#"{"Decision Making":"Approves budgets","Communication":"Briefings","Working Conditions":"Office"}"#
        );
    }

    #[test]
    fn test_embeddings_reject_wrong_dimension() {
        let vectors = PerElement::from_fn(|e| {
            if e == EcElement::Communication {
                vec![0.0; 2]
            } else {
                vec![0.0; 3]
            }
        });
        assert!(ElementEmbeddings::from_vectors(vectors, 3).is_err());
    }
}
