//! Fixed importance weights for the EC elements

use crate::error::{RelativityError, Result};
use crate::processing::element::{EcElement, PerElement};

const SUM_TOLERANCE: f64 = 1e-6;

/// Validated weight table: every weight finite and non-negative, summing to 1.0
#[derive(Debug, Clone, PartialEq)]
pub struct ElementWeights {
    weights: PerElement<f64>,
}

impl ElementWeights {
    pub fn new(weights: PerElement<f64>) -> Result<Self> {
        for (element, weight) in weights.iter() {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(RelativityError::InvalidWeights(format!(
                    "weight for {} must be a non-negative number, got {}",
                    element, weight
                )));
            }
        }

        let total: f64 = weights.values().iter().sum();
        if (total - 1.0).abs() > SUM_TOLERANCE {
            return Err(RelativityError::InvalidWeights(format!(
                "weights must sum to 1.0, got {:.6}",
                total
            )));
        }

        Ok(Self { weights })
    }

    /// Build from `(element, weight)` pairs; every element must be present
    pub fn from_pairs(pairs: &[(EcElement, f64)]) -> Result<Self> {
        let mut weights = PerElement::from_fn(|_| f64::NAN);
        for (element, weight) in pairs {
            weights[*element] = *weight;
        }
        if let Some((element, _)) = weights.iter().find(|(_, w)| w.is_nan()) {
            return Err(RelativityError::InvalidWeights(format!(
                "no weight given for {}",
                element
            )));
        }
        Self::new(weights)
    }

    pub fn get(&self, element: EcElement) -> f64 {
        self.weights[element]
    }

    pub fn iter(&self) -> impl Iterator<Item = (EcElement, f64)> + '_ {
        self.weights.iter().map(|(e, w)| (e, *w))
    }
}

impl Default for ElementWeights {
    fn default() -> Self {
        Self {
            weights: PerElement::from_fn(default_weight),
        }
    }
}

/// Official EC evaluation weights
pub fn default_weight(element: EcElement) -> f64 {
    match element {
        EcElement::DecisionMaking => 0.21,
        EcElement::LeadershipAndOperationalManagement => 0.14,
        EcElement::Communication => 0.18,
        EcElement::KnowledgeOfSpecializedFields => 0.105,
        EcElement::ContextualKnowledge => 0.105,
        EcElement::ResearchAndAnalysis => 0.21,
        EcElement::PhysicalEffort => 0.015,
        EcElement::SensoryEffort => 0.01,
        EcElement::WorkingConditions => 0.025,
    }
}
