//! Penalty hooks subtracted from the weighted score.
//!
//! Classification-level and subject-alignment penalties are extension
//! points. Both default to `NoPenalty`.

use crate::error::{RelativityError, Result};
use crate::processing::corpus::ReferenceRecord;

pub trait ScorePenalty: Send + Sync {
    fn name(&self) -> &str;

    /// Amount to subtract from a record's weighted score. Must be finite and >= 0.
    fn penalty(&self, record: &ReferenceRecord) -> f64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoPenalty;

impl ScorePenalty for NoPenalty {
    fn name(&self) -> &str {
        "none"
    }

    fn penalty(&self, _record: &ReferenceRecord) -> f64 {
        0.0
    }
}

pub struct PenaltySet {
    level: Box<dyn ScorePenalty>,
    subject: Box<dyn ScorePenalty>,
}

impl PenaltySet {
    pub fn new(level: Box<dyn ScorePenalty>, subject: Box<dyn ScorePenalty>) -> Self {
        Self { level, subject }
    }

    pub fn with_level(mut self, level: Box<dyn ScorePenalty>) -> Self {
        self.level = level;
        self
    }

    pub fn with_subject(mut self, subject: Box<dyn ScorePenalty>) -> Self {
        self.subject = subject;
        self
    }

    /// Sum of the level and subject penalties for a record
    pub fn total(&self, record: &ReferenceRecord) -> Result<f64> {
        let mut total = 0.0;
        for hook in [&self.level, &self.subject] {
            let value = hook.penalty(record);
            if !value.is_finite() || value < 0.0 {
                return Err(RelativityError::InvalidPenalty(format!(
                    "{} penalty returned {} for '{}'",
                    hook.name(),
                    value,
                    record.job_title
                )));
            }
            total += value;
        }
        Ok(total)
    }

    pub fn names(&self) -> (&str, &str) {
        (self.level.name(), self.subject.name())
    }
}

impl Default for PenaltySet {
    fn default() -> Self {
        Self::new(Box::new(NoPenalty), Box::new(NoPenalty))
    }
}

impl std::fmt::Debug for PenaltySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PenaltySet")
            .field("level", &self.level.name())
            .field("subject", &self.subject.name())
            .finish()
    }
}
