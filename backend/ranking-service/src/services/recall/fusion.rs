use crate::config::RecallConfig;
use crate::models::{CandidatePool, RecallResult, RecallSource};
use crate::utils::scale_to_unit;
use std::collections::HashMap;

/// Fusion weight of one source.
pub fn source_weight(config: &RecallConfig, source: RecallSource) -> f32 {
    match source {
        RecallSource::Graph => config.graph_weight,
        RecallSource::Trending => config.trending_weight,
        RecallSource::Personalized => config.personalized_weight,
    }
}

/// Merge per-source results into one deduplicated pool.
///
/// Each source's raw scores are scaled into [0, 1] independently, then
/// `recall_score = Σ weight(source) × scaled(source)` over the sources that
/// returned the post. The source with the largest weighted contribution
/// becomes the candidate's primary source (ties resolve in `RecallSource`
/// order).
pub fn fuse(results: Vec<RecallResult>, config: &RecallConfig) -> CandidatePool {
    let mut source_max: HashMap<RecallSource, f32> = HashMap::new();
    for result in &results {
        let max = result
            .candidates
            .iter()
            .filter_map(|c| c.source_scores.get(&result.source).copied())
            .filter(|s| s.is_finite())
            .fold(0.0_f32, f32::max);
        source_max.insert(result.source, max);
    }

    let mut pool = CandidatePool::new();
    for result in results {
        for candidate in result.candidates {
            pool.upsert(candidate);
        }
    }

    for candidate in pool.iter_mut() {
        let mut fused = 0.0_f32;
        let mut primary: Option<(RecallSource, f32)> = None;

        for (&source, &raw) in &candidate.source_scores {
            let max = source_max.get(&source).copied().unwrap_or(1.0);
            let contribution = source_weight(config, source) * scale_to_unit(raw, max);
            fused += contribution;

            match primary {
                Some((_, best)) if contribution <= best => {}
                _ => primary = Some((source, contribution)),
            }
        }

        candidate.recall_score = fused;
        if let Some((source, _)) = primary {
            candidate.primary_source = source;
        }
    }

    pool
}
