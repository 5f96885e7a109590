use crate::config::{ScoreWeights, ScorerKind, ScoringConfig};
use crate::models::{Candidate, FeatureVector};

/// Maps one candidate's features to a relevance score.
///
/// Every implementation must be deterministic: the same candidate and
/// features always produce the same score.
pub trait Scorer: Send + Sync {
    fn score(&self, candidate: &Candidate, features: &FeatureVector) -> f32;

    fn name(&self) -> &'static str;
}

/// Weighted sum of the four features.
#[derive(Debug, Clone)]
pub struct LinearScorer {
    weights: ScoreWeights,
}

impl LinearScorer {
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }
}

impl Default for LinearScorer {
    fn default() -> Self {
        Self::new(ScoreWeights::default())
    }
}

impl Scorer for LinearScorer {
    fn score(&self, _candidate: &Candidate, features: &FeatureVector) -> f32 {
        features.engagement * self.weights.engagement
            + features.recency * self.weights.recency
            + features.author_quality * self.weights.author_quality
            + features.content_quality * self.weights.content_quality
    }

    fn name(&self) -> &'static str {
        "linear"
    }
}

/// Build the scorer selected by configuration.
pub fn scorer_for(config: &ScoringConfig) -> Box<dyn Scorer> {
    match config.scorer {
        ScorerKind::Linear => Box::new(LinearScorer::new(config.weights)),
    }
}
