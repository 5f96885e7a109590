use super::scorer::{scorer_for, Scorer};
use crate::config::ScoringConfig;
use crate::models::{CandidatePool, PostSignals, ScoredCandidate, UserContext};
use crate::services::features::FeatureExtractor;
use crate::utils::compare_scores_desc;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Ranking Layer - feature extraction + scoring
pub struct RankingLayer {
    extractor: FeatureExtractor,
    scorer: Box<dyn Scorer>,
}

impl RankingLayer {
    pub fn new(config: ScoringConfig) -> Self {
        let scorer = scorer_for(&config);
        Self {
            extractor: FeatureExtractor::new(config),
            scorer,
        }
    }

    /// Swap in a different scorer; callers are unaffected.
    pub fn with_scorer(config: ScoringConfig, scorer: Box<dyn Scorer>) -> Self {
        Self {
            extractor: FeatureExtractor::new(config),
            scorer,
        }
    }

    pub fn scorer_name(&self) -> &'static str {
        self.scorer.name()
    }

    /// Score every candidate in the pool and sort by score, descending.
    ///
    /// Ties fall back to the fused recall score, then post id, so the order
    /// is fully determined by the inputs.
    pub fn rank_candidates(
        &self,
        pool: CandidatePool,
        signals: &HashMap<String, PostSignals>,
        context: &UserContext,
    ) -> Vec<ScoredCandidate> {
        let mut fault_count = 0usize;

        let mut scored: Vec<ScoredCandidate> = pool
            .into_ranked()
            .into_iter()
            .map(|mut candidate| {
                let extraction = self.extractor.extract(
                    &candidate,
                    signals.get(&candidate.post_id),
                    context,
                );
                for fault in &extraction.faults {
                    debug!(post_id = %candidate.post_id, fault = %fault, "Feature defaulted");
                }
                fault_count += extraction.faults.len();

                let score = self.scorer.score(&candidate, &extraction.features);
                candidate.score = if score.is_finite() {
                    score
                } else {
                    warn!(
                        post_id = %candidate.post_id,
                        scorer = self.scorer.name(),
                        "Scorer returned a non-finite score, using 0.0"
                    );
                    0.0
                };

                ScoredCandidate {
                    candidate,
                    features: extraction.features,
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            compare_scores_desc(a.candidate.score, b.candidate.score)
                .then_with(|| {
                    compare_scores_desc(a.candidate.recall_score, b.candidate.recall_score)
                })
                .then_with(|| a.candidate.post_id.cmp(&b.candidate.post_id))
        });

        debug!(
            user_id = %context.user_id,
            scored = scored.len(),
            defaulted_features = fault_count,
            top_score = scored.first().map(|c| c.candidate.score),
            "Scoring complete"
        );

        scored
    }
}
