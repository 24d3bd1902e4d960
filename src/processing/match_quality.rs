//! Discrete match-quality labels for comparator scores

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchQuality {
    VeryStrong,
    Strong,
    Ok,
    Weak,
    VeryWeak,
}

impl MatchQuality {
    /// Thresholds are inclusive lower bounds, checked highest first.
    /// Anything below 0.70 (or NaN) is `VeryWeak`.
    pub fn classify(score: f64) -> Self {
        if score >= 0.90 {
            MatchQuality::VeryStrong
        } else if score >= 0.85 {
            MatchQuality::Strong
        } else if score >= 0.80 {
            MatchQuality::Ok
        } else if score >= 0.70 {
            MatchQuality::Weak
        } else {
            MatchQuality::VeryWeak
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MatchQuality::VeryStrong => "Very Strong Match",
            MatchQuality::Strong => "Strong Match",
            MatchQuality::Ok => "OK Match",
            MatchQuality::Weak => "Weak Match",
            MatchQuality::VeryWeak => "Very Weak Match",
        }
    }
}

impl fmt::Display for MatchQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
