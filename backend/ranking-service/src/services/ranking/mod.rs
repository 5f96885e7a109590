/// Ranking Module
///
/// Scores recalled candidates for feed personalization.
///
/// # Architecture
/// - **Feature Layer**: bounded features per candidate (`services::features`)
/// - **Scoring Layer**: a `Scorer` maps `(Candidate, FeatureVector)` to a scalar
///
/// # Workflow
/// 1. Extract engagement, recency, author and content quality
/// 2. Score with the configured scorer (linear weights by default)
/// 3. Sort descending; diversity reranking happens afterwards
pub mod scorer;
pub mod simple;

pub use scorer::{scorer_for, LinearScorer, Scorer};
pub use simple::RankingLayer;
