use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::utils::compare_scores_desc;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum RecallSource {
    Graph,        // follow graph
    Trending,     // time-decayed popularity
    Personalized, // interest tags
}

impl RecallSource {
    pub const ALL: [RecallSource; 3] = [
        RecallSource::Graph,
        RecallSource::Trending,
        RecallSource::Personalized,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecallSource::Graph => "graph",
            RecallSource::Trending => "trending",
            RecallSource::Personalized => "personalized",
        }
    }
}

impl fmt::Display for RecallSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A post as stored by an upstream capability, before it becomes a candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub post_id: String,
    pub author_id: String,
    /// Unix seconds; 0 when the store does not know.
    pub created_at: i64,
    pub score: f64,
}

/// One post moving through the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub post_id: String,
    pub author_id: String,
    /// Raw score per contributing source, as returned by that source.
    pub source_scores: BTreeMap<RecallSource, f32>,
    pub created_at: i64,
    /// Fused recall score, set by the merge step.
    pub recall_score: f32,
    /// Primary contributing source, set by the merge step.
    pub primary_source: RecallSource,
    /// Relevance score, set by the scoring step.
    pub score: f32,
}

impl Candidate {
    pub fn from_record(record: PostRecord, source: RecallSource, raw_score: f32) -> Self {
        let mut source_scores = BTreeMap::new();
        source_scores.insert(source, raw_score);
        Self {
            post_id: record.post_id,
            author_id: record.author_id,
            source_scores,
            created_at: record.created_at,
            recall_score: 0.0,
            primary_source: source,
            score: 0.0,
        }
    }

    pub fn sources(&self) -> BTreeSet<RecallSource> {
        self.source_scores.keys().copied().collect()
    }
}

/// Ordered output of a single recall strategy.
#[derive(Debug, Clone)]
pub struct RecallResult {
    pub source: RecallSource,
    pub candidates: Vec<Candidate>,
}

/// Deduplicated candidates keyed by post id.
#[derive(Debug, Clone, Default)]
pub struct CandidatePool {
    entries: HashMap<String, Candidate>,
}

impl CandidatePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, post_id: &str) -> Option<&Candidate> {
        self.entries.get(post_id)
    }

    pub fn post_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Inserts a candidate, or folds its source scores into the existing
    /// entry with the same post id (keeping the higher score per source).
    pub fn upsert(&mut self, candidate: Candidate) {
        match self.entries.get_mut(&candidate.post_id) {
            Some(existing) => {
                for (source, score) in candidate.source_scores {
                    existing
                        .source_scores
                        .entry(source)
                        .and_modify(|s| *s = s.max(score))
                        .or_insert(score);
                }
                if existing.created_at <= 0 {
                    existing.created_at = candidate.created_at;
                }
                if existing.author_id.is_empty() {
                    existing.author_id = candidate.author_id;
                }
            }
            None => {
                self.entries.insert(candidate.post_id.clone(), candidate);
            }
        }
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Candidate> {
        self.entries.values_mut()
    }

    /// Candidates ordered by fused score desc, newer first, then post id asc.
    pub fn ranked(&self) -> Vec<&Candidate> {
        let mut ranked: Vec<&Candidate> = self.entries.values().collect();
        ranked.sort_by(|a, b| {
            compare_scores_desc(a.recall_score, b.recall_score)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| a.post_id.cmp(&b.post_id))
        });
        ranked
    }

    pub fn into_ranked(self) -> Vec<Candidate> {
        let mut ranked: Vec<Candidate> = self.entries.into_values().collect();
        ranked.sort_by(|a, b| {
            compare_scores_desc(a.recall_score, b.recall_score)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| a.post_id.cmp(&b.post_id))
        });
        ranked
    }

    /// Keeps only the top `limit` candidates in `ranked()` order.
    pub fn truncate(&mut self, limit: usize) {
        if self.entries.len() <= limit {
            return;
        }
        let keep: std::collections::HashSet<String> = self
            .ranked()
            .into_iter()
            .take(limit)
            .map(|c| c.post_id.clone())
            .collect();
        self.entries.retain(|id, _| keep.contains(id));
    }
}

/// Per-post signals read from the content-metadata store. Any field may be
/// missing; the feature extractor substitutes defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostSignals {
    pub interaction_count: Option<f64>,
    pub author_quality: Option<f32>,
    pub content_quality: Option<f32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub engagement: f32,
    pub recency: f32,
    pub author_quality: f32,
    pub content_quality: f32,
}

/// Who is asking and when; recency is measured against `now`.
#[derive(Debug, Clone)]
pub struct UserContext {
    pub user_id: String,
    pub now: i64,
}

impl UserContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            now: chrono::Utc::now().timestamp(),
        }
    }

    pub fn at(user_id: impl Into<String>, now: i64) -> Self {
        Self {
            user_id: user_id.into(),
            now,
        }
    }
}

/// A candidate after feature extraction and scoring.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub features: FeatureVector,
}

impl ScoredCandidate {
    pub fn score(&self) -> f32 {
        self.candidate.score
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedItem {
    pub post_id: String,
    pub score: f32,
    pub source: RecallSource,
    pub author_id: String,
    pub features: FeatureVector,
}

impl From<ScoredCandidate> for RankedItem {
    fn from(scored: ScoredCandidate) -> Self {
        Self {
            post_id: scored.candidate.post_id,
            score: scored.candidate.score,
            source: scored.candidate.primary_source,
            author_id: scored.candidate.author_id,
            features: scored.features,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecallStats {
    pub graph_recall_count: usize,
    pub trending_recall_count: usize,
    pub personalized_recall_count: usize,
    /// Sources the recall layer ran, sorted.
    pub attempted_sources: Vec<RecallSource>,
    pub failed_sources: Vec<RecallSource>,
    pub total_candidates: usize,
    /// Wall time of the whole recall fan-out.
    pub recall_latency_ms: u64,
}

impl RecallStats {
    pub fn record(&mut self, source: RecallSource, count: usize) {
        match source {
            RecallSource::Graph => self.graph_recall_count = count,
            RecallSource::Trending => self.trending_recall_count = count,
            RecallSource::Personalized => self.personalized_recall_count = count,
        }
    }

    /// Every source that ran failed. False when nothing ran.
    pub fn all_failed(&self) -> bool {
        !self.attempted_sources.is_empty()
            && self
                .attempted_sources
                .iter()
                .all(|s| self.failed_sources.contains(s))
    }

    pub fn is_degraded(&self) -> bool {
        !self.failed_sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(post_id: &str, source: RecallSource, score: f32, created_at: i64) -> Candidate {
        Candidate::from_record(
            PostRecord {
                post_id: post_id.to_string(),
                author_id: "author".to_string(),
                created_at,
                score: score as f64,
            },
            source,
            score,
        )
    }

    #[test]
    fn test_upsert_unions_sources() {
        let mut pool = CandidatePool::new();
        pool.upsert(candidate("post1", RecallSource::Graph, 0.8, 100));
        pool.upsert(candidate("post1", RecallSource::Trending, 0.5, 100));
        pool.upsert(candidate("post2", RecallSource::Trending, 0.4, 100));

        assert_eq!(pool.len(), 2);
        let post1 = pool.get("post1").unwrap();
        assert_eq!(
            post1.sources().into_iter().collect::<Vec<_>>(),
            vec![RecallSource::Graph, RecallSource::Trending]
        );
    }

    #[test]
    fn test_upsert_keeps_higher_score_within_source() {
        let mut pool = CandidatePool::new();
        pool.upsert(candidate("post1", RecallSource::Trending, 0.3, 100));
        pool.upsert(candidate("post1", RecallSource::Trending, 0.7, 100));

        let post1 = pool.get("post1").unwrap();
        assert!((post1.source_scores[&RecallSource::Trending] - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_ranked_tie_break() {
        let mut pool = CandidatePool::new();
        for (id, created_at) in [("b", 100), ("a", 100), ("c", 200)] {
            let mut c = candidate(id, RecallSource::Graph, 0.5, created_at);
            c.recall_score = 0.5;
            pool.upsert(c);
        }

        let ids: Vec<&str> = pool.ranked().iter().map(|c| c.post_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_truncate_keeps_best() {
        let mut pool = CandidatePool::new();
        for (id, score) in [("a", 0.1), ("b", 0.9), ("c", 0.5)] {
            let mut c = candidate(id, RecallSource::Graph, score, 100);
            c.recall_score = score;
            pool.upsert(c);
        }

        pool.truncate(2);
        assert_eq!(pool.post_ids(), vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_all_failed() {
        let mut stats = RecallStats {
            attempted_sources: RecallSource::ALL.to_vec(),
            failed_sources: vec![RecallSource::Graph, RecallSource::Trending],
            ..RecallStats::default()
        };
        assert!(stats.is_degraded());
        assert!(!stats.all_failed());

        stats.failed_sources.push(RecallSource::Personalized);
        assert!(stats.all_failed());
    }

    #[test]
    fn test_all_failed_follows_attempted_sources() {
        let stats = RecallStats {
            attempted_sources: vec![RecallSource::Graph, RecallSource::Trending],
            failed_sources: vec![RecallSource::Graph, RecallSource::Trending],
            ..RecallStats::default()
        };
        assert!(stats.all_failed());

        // nothing ran, nothing failed
        assert!(!RecallStats::default().all_failed());
    }
}
