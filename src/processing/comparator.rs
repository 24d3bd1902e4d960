//! Weighted comparator engine: embeds a work description element by element
//! and ranks the reference corpus against it

use crate::error::{RelativityError, Result};
use crate::processing::alignment;
use crate::processing::corpus::ReferenceRecord;
use crate::processing::element::{EcElement, ElementEmbeddings, ElementScores, ElementTextMap, PerElement};
use crate::processing::embeddings::{embed_with_timeout, EmbeddingService, DEFAULT_CALL_TIMEOUT};
use crate::processing::match_quality::MatchQuality;
use crate::processing::penalty::PenaltySet;
use crate::processing::similarity::cosine_similarity;
use crate::processing::weights::ElementWeights;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Results retained per request so the display window can grow without rescoring
pub const MAX_RETAINED_RESULTS: usize = 25;
pub const DEFAULT_TOP_K: usize = 5;
pub const DISPLAY_STEP: usize = 5;

/// Decimal places kept in final scores
const SCORE_DECIMALS: i32 = 4;

pub struct ComparatorEngine<E> {
    embedder: E,
    weights: ElementWeights,
    penalties: PenaltySet,
    call_timeout: Duration,
}

/// One scored comparator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub rank: usize,
    pub job_title: String,
    pub ec_level: String,
    pub department: String,
    pub final_score: f64,
    pub match_quality: MatchQuality,
    pub explanation: String,
    pub element_scores: ElementScores,
}

/// Summary line shown under a result table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Interpretation {
    Strong { count: usize },
    Advisory,
    AdvisoryOnly,
}

impl Interpretation {
    pub fn from_results(results: &[ComparisonResult]) -> Self {
        let top_score = match results.first() {
            Some(top) => top.final_score,
            None => return Interpretation::AdvisoryOnly,
        };

        if top_score >= 0.85 {
            let count = results.iter().filter(|r| r.final_score >= 0.85).count();
            Interpretation::Strong { count }
        } else if top_score >= 0.80 {
            Interpretation::Advisory
        } else {
            Interpretation::AdvisoryOnly
        }
    }

    pub fn message(&self) -> String {
        match self {
            Interpretation::Strong { count } => format!(
                "{} comparators scored ≥ 0.85. These are strong matches.",
                count
            ),
            Interpretation::Advisory => {
                "Top matches are in the advisory range (0.80–0.84). Use with caution.".to_string()
            }
            Interpretation::AdvisoryOnly => {
                "No comparators above 0.80. These are advisory only.".to_string()
            }
        }
    }
}

/// Display window settings: `1 <= initial <= max <= MAX_RETAINED_RESULTS`, `step >= 1`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    initial: usize,
    step: usize,
    max: usize,
}

impl Default for Paging {
    fn default() -> Self {
        Self {
            initial: DEFAULT_TOP_K,
            step: DISPLAY_STEP,
            max: MAX_RETAINED_RESULTS,
        }
    }
}

impl Paging {
    pub fn new(initial: usize, step: usize, max: usize) -> Result<Self> {
        if max == 0 || max > MAX_RETAINED_RESULTS {
            return Err(RelativityError::InvalidArgument(format!(
                "result limit must be between 1 and {}, got {}",
                MAX_RETAINED_RESULTS, max
            )));
        }
        if initial == 0 || initial > max {
            return Err(RelativityError::InvalidArgument(format!(
                "top-k must be between 1 and {}, got {}",
                max, initial
            )));
        }
        if step == 0 {
            return Err(RelativityError::InvalidArgument(
                "display step must be at least 1".to_string(),
            ));
        }
        Ok(Self { initial, step, max })
    }

    /// Same step and limit, different first page
    pub fn with_initial(self, initial: usize) -> Result<Self> {
        Self::new(initial, self.step, self.max)
    }

    pub fn initial(&self) -> usize {
        self.initial
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn max(&self) -> usize {
        self.max
    }
}

/// Retained results plus the number currently displayed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultWindow {
    results: Vec<ComparisonResult>,
    displayed: usize,
    step: usize,
    max: usize,
}

impl ResultWindow {
    /// Keeps at most `MAX_RETAINED_RESULTS`, showing `DEFAULT_TOP_K` at first
    pub fn new(results: Vec<ComparisonResult>) -> Self {
        Self::with_paging(results, Paging::default())
    }

    pub fn with_paging(mut results: Vec<ComparisonResult>, paging: Paging) -> Self {
        results.truncate(paging.max);
        Self {
            results,
            displayed: paging.initial,
            step: paging.step,
            max: paging.max,
        }
    }

    pub fn visible(&self) -> &[ComparisonResult] {
        &self.results[..self.display_limit()]
    }

    pub fn all(&self) -> &[ComparisonResult] {
        &self.results
    }

    pub fn display_limit(&self) -> usize {
        self.displayed.min(self.results.len())
    }

    pub fn can_show_more(&self) -> bool {
        self.displayed < self.max && self.displayed < self.results.len()
    }

    /// Grow the display by one step; returns false when nothing more can be shown
    pub fn show_more(&mut self) -> bool {
        if !self.can_show_more() {
            return false;
        }
        self.displayed = (self.displayed + self.step).min(self.max);
        true
    }

    /// Back to the initial page size
    pub fn reset_display(&mut self, initial: usize) {
        self.displayed = initial.clamp(1, self.max);
    }
}

impl<E: EmbeddingService> ComparatorEngine<E> {
    pub fn new(embedder: E, weights: ElementWeights) -> Self {
        Self {
            embedder,
            weights,
            penalties: PenaltySet::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_penalties(mut self, penalties: PenaltySet) -> Self {
        self.penalties = penalties;
        self
    }

    pub fn with_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    pub fn weights(&self) -> &ElementWeights {
        &self.weights
    }

    /// Score the whole corpus and return the `top_k` best matches, best first
    pub async fn compare_all(
        &self,
        user: &ElementTextMap,
        corpus: &[ReferenceRecord],
        top_k: usize,
    ) -> Result<Vec<ComparisonResult>> {
        if top_k == 0 {
            return Err(RelativityError::InvalidArgument(
                "top_k must be at least 1".to_string(),
            ));
        }

        let user_embeddings = self.embed_elements(user).await?;
        let mut results = self.rank(&user_embeddings, corpus)?;
        results.truncate(top_k);
        Ok(results)
    }

    /// Retain up to `paging.max()` results and open a display window over them
    pub async fn compare_window(
        &self,
        user: &ElementTextMap,
        corpus: &[ReferenceRecord],
        paging: Paging,
    ) -> Result<ResultWindow> {
        let results = self.compare_all(user, corpus, paging.max()).await?;
        Ok(ResultWindow::with_paging(results, paging))
    }

    /// Embed each non-empty element text; empty elements get the zero vector
    pub async fn embed_elements(&self, user: &ElementTextMap) -> Result<ElementEmbeddings> {
        let start_time = Instant::now();
        let dimensions = self.embedder.dimensions();
        let mut vectors = PerElement::from_fn(|_| Vec::new());
        let mut calls = 0;

        for element in EcElement::ALL {
            vectors[element] = match user.non_empty(element) {
                Some(text) => {
                    calls += 1;
                    log::debug!("Embedding {} ({} chars)", element, text.len());
                    embed_with_timeout(&self.embedder, text, self.call_timeout, element.name()).await?
                }
                None => vec![0.0; dimensions],
            };
        }

        log::debug!(
            "Embedded {} of {} elements in {:.2?}",
            calls,
            EcElement::ALL.len(),
            start_time.elapsed()
        );

        ElementEmbeddings::from_vectors(vectors, dimensions).map_err(|e| {
            RelativityError::EmbeddingService(format!("Embedding service returned a malformed vector: {}", e))
        })
    }

    /// Score every record and sort best first. Ties keep corpus order.
    pub fn rank(
        &self,
        user: &ElementEmbeddings,
        corpus: &[ReferenceRecord],
    ) -> Result<Vec<ComparisonResult>> {
        let mut results = corpus
            .iter()
            .map(|record| self.score_record(user, record))
            .collect::<Result<Vec<_>>>()?;

        results.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));
        for (i, result) in results.iter_mut().enumerate() {
            result.rank = i + 1;
        }
        Ok(results)
    }

    /// Weighted element similarity minus penalties, rounded to 4 decimals
    pub fn score_record(
        &self,
        user: &ElementEmbeddings,
        record: &ReferenceRecord,
    ) -> Result<ComparisonResult> {
        let mut element_scores = PerElement::from_fn(|_| 0.0);
        let mut weighted_total = 0.0;

        for (element, weight) in self.weights.iter() {
            let similarity = cosine_similarity(user.get(element), record.embeddings.get(element))?;
            element_scores[element] = similarity;
            weighted_total += weight * similarity;
        }

        let penalty = self.penalties.total(record)?;
        let final_score = round_score(weighted_total - penalty);
        if !final_score.is_finite() {
            return Err(RelativityError::NonFiniteScore(format!(
                "score for '{}' is not a number",
                record.job_title
            )));
        }

        Ok(ComparisonResult {
            rank: 0,
            job_title: record.job_title.clone(),
            ec_level: record.ec_level.clone(),
            department: record.department.clone(),
            final_score,
            match_quality: MatchQuality::classify(final_score),
            explanation: alignment::explain(&element_scores),
            element_scores,
        })
    }
}

/// Round half away from zero to `SCORE_DECIMALS` places
pub fn round_score(score: f64) -> f64 {
    let factor = 10f64.powi(SCORE_DECIMALS);
    (score * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::penalty::ScorePenalty;
    use std::collections::HashMap;

    /// Returns a fixed vector per known text
    struct LookupEmbedder {
        vectors: HashMap<String, Vec<f32>>,
        dimensions: usize,
    }

    impl EmbeddingService for LookupEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.vectors
                .get(text)
                .cloned()
                .ok_or_else(|| RelativityError::EmbeddingService(format!("unknown text: {}", text)))
        }

        fn dimensions(&self) -> usize {
            self.dimensions
        }

        fn model_name(&self) -> &str {
            "lookup"
        }
    }

    fn engine(pairs: &[(&str, Vec<f32>)]) -> ComparatorEngine<LookupEmbedder> {
        let embedder = LookupEmbedder {
            vectors: pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
            dimensions: 3,
        };
        ComparatorEngine::new(embedder, ElementWeights::default())
    }

    fn record(title: &str, f: impl FnMut(EcElement) -> Vec<f32>) -> ReferenceRecord {
        ReferenceRecord {
            job_title: title.to_string(),
            ec_level: "EC-04".to_string(),
            department: "Finance".to_string(),
            embeddings: ElementEmbeddings::from_vectors(PerElement::from_fn(f), 3).unwrap(),
        }
    }

    #[test]
    fn test_round_score() {
        assert_eq!(round_score(0.123_46), 0.1235);
        assert_eq!(round_score(0.876_549), 0.8765);
        assert_eq!(round_score(-0.000_04), -0.0);
    }

    #[tokio::test]
    async fn test_zero_top_k_is_rejected_before_embedding() {
        // The lookup has no vectors, so any embed call would fail with a different error
        let engine = engine(&[]);
        let user = ElementTextMap::new().with(EcElement::DecisionMaking, "Approves budgets");
        let err = engine.compare_all(&user, &[], 0).await.unwrap_err();
        assert!(matches!(err, RelativityError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_embedding_failure_fails_the_request() {
        let engine = engine(&[]);
        let user = ElementTextMap::new().with(EcElement::Communication, "Briefs ministers");
        let corpus = vec![record("Analyst", |_| vec![1.0, 0.0, 0.0])];
        let err = engine.compare_all(&user, &corpus, 5).await.unwrap_err();
        assert!(matches!(err, RelativityError::EmbeddingService(_)));
    }

    #[tokio::test]
    async fn test_wrong_dimension_from_service_is_an_error() {
        let engine = engine(&[("Briefs ministers", vec![1.0, 0.0])]);
        let user = ElementTextMap::new().with(EcElement::Communication, "Briefs ministers");
        let err = engine.embed_elements(&user).await.unwrap_err();
        assert!(matches!(err, RelativityError::EmbeddingService(_)));
    }

    #[tokio::test]
    async fn test_text_is_trimmed_before_embedding() {
        let engine = engine(&[("Approves budgets", vec![0.0, 1.0, 0.0])]);
        let user = ElementTextMap::new().with(EcElement::DecisionMaking, "  Approves budgets \n");
        let embeddings = engine.embed_elements(&user).await.unwrap();
        assert_eq!(embeddings.get(EcElement::DecisionMaking), &[0.0, 1.0, 0.0]);
        assert_eq!(embeddings.get(EcElement::Communication), &[0.0, 0.0, 0.0]);
    }

    #[tokio::test]
    async fn test_decision_making_only_scores_its_weight() {
        let engine = engine(&[("Approves budget allocations", vec![0.2, 0.4, 0.9])]);
        let user = ElementTextMap::new().with(EcElement::DecisionMaking, "Approves budget allocations");
        let corpus = vec![record("Budget Officer", |e| {
            if e == EcElement::DecisionMaking {
                vec![0.2, 0.4, 0.9]
            } else {
                vec![0.0, 0.0, 0.0]
            }
        })];

        let results = engine.compare_all(&user, &corpus, 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].final_score, 0.21);
        assert_eq!(results[0].match_quality, MatchQuality::VeryWeak);
        assert_eq!(results[0].rank, 1);
        assert!(results[0].explanation.starts_with("Aligned: Decision Making. Missing: "));
    }

    #[tokio::test]
    async fn test_ties_keep_corpus_order() {
        let engine = engine(&[]);
        let corpus = vec![
            record("First", |_| vec![1.0, 0.0, 0.0]),
            record("Second", |_| vec![0.0, 1.0, 0.0]),
        ];
        let results = engine.compare_all(&ElementTextMap::new(), &corpus, 5).await.unwrap();
        let titles: Vec<_> = results.iter().map(|r| r.job_title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Second"]);
        assert!(results.iter().all(|r| r.final_score == 0.0));
    }

    #[test]
    fn test_result_window_paging() {
        let results: Vec<ComparisonResult> = (0..30)
            .map(|i| ComparisonResult {
                rank: i + 1,
                job_title: format!("Job {}", i),
                ec_level: "EC-02".to_string(),
                department: "Dept".to_string(),
                final_score: 0.9,
                match_quality: MatchQuality::VeryStrong,
                explanation: String::new(),
                element_scores: PerElement::from_fn(|_| 0.0),
            })
            .collect();

        let mut window = ResultWindow::new(results);
        assert_eq!(window.all().len(), MAX_RETAINED_RESULTS);
        assert_eq!(window.visible().len(), 5);
        for expected in [10, 15, 20, 25] {
            assert!(window.show_more());
            assert_eq!(window.visible().len(), expected);
        }
        assert!(!window.can_show_more());
        assert!(!window.show_more());
    }

    #[test]
    fn test_paging_limits() {
        assert!(Paging::new(5, 5, MAX_RETAINED_RESULTS + 1).is_err());
        assert!(Paging::new(0, 5, 25).is_err());
        assert!(Paging::new(5, 0, 25).is_err());
        assert!(matches!(
            Paging::default().with_initial(30),
            Err(RelativityError::InvalidArgument(_))
        ));
        assert_eq!(Paging::default().with_initial(25).unwrap().initial(), 25);
    }

    #[tokio::test]
    async fn test_compare_window_retains_configured_limit() {
        let engine = engine(&[]);
        let corpus: Vec<_> = (0..40)
            .map(|i| record(&format!("Position {}", i), |_| vec![1.0, 0.0, 0.0]))
            .collect();
        let paging = Paging::new(3, 4, 10).unwrap();

        let mut window = engine
            .compare_window(&ElementTextMap::new(), &corpus, paging)
            .await
            .unwrap();
        assert_eq!(window.all().len(), 10);
        assert_eq!(window.visible().len(), 3);
        while window.show_more() {}
        assert_eq!(window.visible().len(), 10);
    }

    /// Never answers
    struct StalledEmbedder;

    impl EmbeddingService for StalledEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            std::future::pending().await
        }

        fn dimensions(&self) -> usize {
            3
        }

        fn model_name(&self) -> &str {
            "stalled"
        }
    }

    #[tokio::test]
    async fn test_embedding_timeout_fails_the_request() {
        let engine = ComparatorEngine::new(StalledEmbedder, ElementWeights::default())
            .with_timeout(Duration::from_millis(10));
        let user = ElementTextMap::new().with(EcElement::Communication, "Briefs ministers");
        let corpus = vec![record("Analyst", |_| vec![1.0, 0.0, 0.0])];

        let err = engine.compare_all(&user, &corpus, 5).await.unwrap_err();
        assert!(matches!(err, RelativityError::EmbeddingService(_)));
    }

    struct Fixed(f64);

    impl ScorePenalty for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn penalty(&self, _record: &ReferenceRecord) -> f64 {
            self.0
        }
    }

    fn budget_officer() -> ReferenceRecord {
        record("Budget Officer", |e| {
            if e == EcElement::DecisionMaking {
                vec![0.2, 0.4, 0.9]
            } else {
                vec![0.0, 0.0, 0.0]
            }
        })
    }

    #[tokio::test]
    async fn test_penalty_is_subtracted_before_rounding() {
        let engine = engine(&[("Approves budget allocations", vec![0.2, 0.4, 0.9])])
            .with_penalties(PenaltySet::default().with_level(Box::new(Fixed(0.01))));
        let user = ElementTextMap::new().with(EcElement::DecisionMaking, "Approves budget allocations");

        let results = engine.compare_all(&user, &[budget_officer()], 5).await.unwrap();
        assert_eq!(results[0].final_score, 0.2);
        assert_eq!(results[0].match_quality, MatchQuality::VeryWeak);
    }

    #[tokio::test]
    async fn test_negative_penalty_is_rejected() {
        let engine = engine(&[("Approves budget allocations", vec![0.2, 0.4, 0.9])])
            .with_penalties(PenaltySet::default().with_subject(Box::new(Fixed(-0.05))));
        let user = ElementTextMap::new().with(EcElement::DecisionMaking, "Approves budget allocations");

        let err = engine.compare_all(&user, &[budget_officer()], 5).await.unwrap_err();
        assert!(matches!(err, RelativityError::InvalidPenalty(_)));
    }

    #[test]
    fn test_interpretation_bands() {
        let at = |score: f64| ComparisonResult {
            rank: 1,
            job_title: "Job".to_string(),
            ec_level: "EC-01".to_string(),
            department: "Dept".to_string(),
            final_score: score,
            match_quality: MatchQuality::classify(score),
            explanation: String::new(),
            element_scores: PerElement::from_fn(|_| 0.0),
        };
        assert_eq!(Interpretation::from_results(&[at(0.82)]), Interpretation::Advisory);
        assert_eq!(Interpretation::from_results(&[at(0.5)]), Interpretation::AdvisoryOnly);
        assert_eq!(Interpretation::from_results(&[]), Interpretation::AdvisoryOnly);
        assert_eq!(
            Interpretation::from_results(&[at(0.91), at(0.86), at(0.84)]),
            Interpretation::Strong { count: 2 }
        );
    }
}
