use crate::config::DiversityConfig;
use crate::models::ScoredCandidate;
use crate::utils::compare_scores_desc;
use std::cmp::Ordering;

/// Diversity Layer - MMR (Maximal Marginal Relevance) reranking
///
/// `adjusted = λ·score − (1−λ)·penalty`, where the penalty is categorical:
/// a repeated author inside the trailing window costs `author_penalty`,
/// otherwise a repeated source right after the same source costs
/// `source_penalty`. The same author is never picked twice in a row while
/// another author is still available.
pub struct DiversityLayer {
    lambda: f32, // relevance vs. diversity (0~1)
    author_window: usize,
    author_penalty: f32,
    source_penalty: f32,
}

impl DiversityLayer {
    pub fn new(lambda: f32) -> Self {
        let defaults = DiversityConfig::default();
        Self {
            lambda: lambda.clamp(0.0, 1.0),
            author_window: defaults.author_window,
            author_penalty: defaults.author_penalty,
            source_penalty: defaults.source_penalty,
        }
    }

    pub fn from_config(config: &DiversityConfig) -> Self {
        Self {
            lambda: config.mmr_lambda.clamp(0.0, 1.0),
            author_window: config.author_window.max(1),
            author_penalty: config.author_penalty,
            source_penalty: config.source_penalty,
        }
    }

    /// Rerank a scored list, returning at most `top_k` items.
    /// lambda = 1.0: relevance only
    /// lambda = 0.0: diversity only
    pub fn rerank(&self, posts: Vec<ScoredCandidate>, top_k: usize) -> Vec<ScoredCandidate> {
        if posts.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let mut remaining = posts;
        remaining.sort_by(|a, b| {
            compare_scores_desc(a.score(), b.score())
                .then_with(|| a.candidate.post_id.cmp(&b.candidate.post_id))
        });

        let mut selected: Vec<ScoredCandidate> = Vec::with_capacity(top_k.min(remaining.len()));

        while selected.len() < top_k && !remaining.is_empty() {
            let previous_author = selected
                .last()
                .map(|p| p.candidate.author_id.as_str())
                .filter(|author| !author.is_empty());

            // Hard constraint: skip a back-to-back author while someone else is left
            let blocked_author = previous_author.filter(|&author| {
                remaining
                    .iter()
                    .any(|p| p.candidate.author_id != author)
            });

            let mut best: Option<(usize, f32)> = None;
            for (i, post) in remaining.iter().enumerate() {
                if blocked_author == Some(post.candidate.author_id.as_str()) {
                    continue;
                }

                let adjusted = self.lambda * post.score()
                    - (1.0 - self.lambda) * self.penalty(post, &selected);

                let better = match best {
                    None => true,
                    Some((best_idx, best_adjusted)) => {
                        compare_picks(post, adjusted, &remaining[best_idx], best_adjusted)
                            == Ordering::Greater
                    }
                };
                if better {
                    best = Some((i, adjusted));
                }
            }

            // remaining is non-empty and at least one author is unblocked
            let Some((best_idx, _)) = best else {
                break;
            };
            selected.push(remaining.remove(best_idx));
        }

        selected
    }

    /// Categorical redundancy of `post` against the picks so far.
    fn penalty(&self, post: &ScoredCandidate, selected: &[ScoredCandidate]) -> f32 {
        let Some(previous) = selected.last() else {
            return 0.0;
        };

        let author = post.candidate.author_id.as_str();
        if !author.is_empty()
            && selected
                .iter()
                .rev()
                .take(self.author_window)
                .any(|p| p.candidate.author_id == author)
        {
            return self.author_penalty;
        }

        if previous.candidate.primary_source == post.candidate.primary_source {
            return self.source_penalty;
        }

        0.0
    }
}

/// Higher adjusted score wins, then higher raw score, then lower post id.
fn compare_picks(
    a: &ScoredCandidate,
    a_adjusted: f32,
    b: &ScoredCandidate,
    b_adjusted: f32,
) -> Ordering {
    a_adjusted
        .total_cmp(&b_adjusted)
        .then_with(|| a.score().total_cmp(&b.score()))
        .then_with(|| b.candidate.post_id.cmp(&a.candidate.post_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Candidate, FeatureVector, PostRecord, RecallSource};
    use std::collections::HashSet;

    fn post(post_id: &str, author_id: &str, source: RecallSource, score: f32) -> ScoredCandidate {
        let mut candidate = Candidate::from_record(
            PostRecord {
                post_id: post_id.to_string(),
                author_id: author_id.to_string(),
                created_at: 1_700_000_000,
                score: score as f64,
            },
            source,
            score,
        );
        candidate.score = score;
        ScoredCandidate {
            candidate,
            features: FeatureVector::default(),
        }
    }

    fn ids(posts: &[ScoredCandidate]) -> Vec<String> {
        posts.iter().map(|p| p.candidate.post_id.clone()).collect()
    }

    #[test]
    fn test_diversity_rerank() {
        let layer = DiversityLayer::new(0.7);

        let posts = vec![
            post("post1", "a1", RecallSource::Graph, 0.9),
            post("post2", "a2", RecallSource::Graph, 0.85),
            post("post3", "a3", RecallSource::Trending, 0.8),
            post("post4", "a4", RecallSource::Personalized, 0.75),
        ];

        let reranked = layer.rerank(posts, 3);

        assert_eq!(reranked.len(), 3);
        let unique_sources: HashSet<_> = reranked
            .iter()
            .map(|p| p.candidate.primary_source)
            .collect();
        assert!(unique_sources.len() >= 2);
        // 0.7*0.8 > 0.7*0.85 - 0.3*0.3, so trending jumps ahead of post2
        assert_eq!(ids(&reranked), vec!["post1", "post3", "post2"]);
    }

    #[test]
    fn test_author_diversity_enforcement() {
        let layer = DiversityLayer::new(0.7);

        let posts = vec![
            post("post1", "author1", RecallSource::Graph, 0.9),
            post("post2", "author1", RecallSource::Graph, 0.88),
            post("post3", "author1", RecallSource::Graph, 0.86),
            post("post4", "author2", RecallSource::Trending, 0.7),
        ];

        let reranked = layer.rerank(posts, 4);

        assert_eq!(reranked.len(), 4);
        assert_eq!(reranked[1].candidate.author_id, "author2");
        // only author1 is left after the second pick, so repeats are allowed
        assert_eq!(ids(&reranked), vec!["post1", "post4", "post2", "post3"]);
    }

    #[test]
    fn test_no_adjacent_authors_even_at_lambda_one() {
        let layer = DiversityLayer::new(1.0);

        let posts = vec![
            post("a", "x", RecallSource::Graph, 0.99),
            post("b", "x", RecallSource::Graph, 0.98),
            post("c", "y", RecallSource::Graph, 0.10),
            post("d", "x", RecallSource::Graph, 0.97),
            post("e", "z", RecallSource::Graph, 0.05),
        ];

        let reranked = layer.rerank(posts, 5);

        assert_eq!(ids(&reranked), vec!["a", "c", "b", "e", "d"]);
        for pair in reranked.windows(2) {
            assert_ne!(pair[0].candidate.author_id, pair[1].candidate.author_id);
        }
    }

    #[test]
    fn test_output_length() {
        let layer = DiversityLayer::new(0.7);
        let posts: Vec<ScoredCandidate> = (0..5)
            .map(|i| post(&format!("p{}", i), &format!("a{}", i), RecallSource::Graph, 0.5))
            .collect();

        assert_eq!(layer.rerank(posts.clone(), 3).len(), 3);
        assert_eq!(layer.rerank(posts.clone(), 10).len(), 5);
        assert!(layer.rerank(posts, 0).is_empty());
        assert!(layer.rerank(Vec::new(), 3).is_empty());
    }

    #[test]
    fn test_deterministic() {
        let layer = DiversityLayer::new(0.7);
        let posts: Vec<ScoredCandidate> = (0..40)
            .map(|i| {
                let source = RecallSource::ALL[i % 3];
                post(
                    &format!("p{:02}", i),
                    &format!("a{}", i % 4),
                    source,
                    ((i * 7) % 10) as f32 / 10.0,
                )
            })
            .collect();

        let mut reversed = posts.clone();
        reversed.reverse();

        let first = ids(&layer.rerank(posts.clone(), 20));
        let second = ids(&layer.rerank(posts, 20));
        let third = ids(&layer.rerank(reversed, 20));
        assert_eq!(first, second);
        assert_eq!(first, third);
    }

    #[test]
    fn test_ties_prefer_lower_post_id() {
        let layer = DiversityLayer::new(0.7);
        let posts = vec![
            post("b", "a1", RecallSource::Graph, 0.5),
            post("a", "a2", RecallSource::Graph, 0.5),
        ];

        assert_eq!(ids(&layer.rerank(posts, 2)), vec!["a", "b"]);
    }

    #[test]
    fn test_author_window_penalty() {
        let config = DiversityConfig {
            mmr_lambda: 0.5,
            author_window: 2,
            author_penalty: 1.0,
            source_penalty: 0.0,
        };
        let layer = DiversityLayer::from_config(&config);

        let posts = vec![
            post("p1", "x", RecallSource::Graph, 0.9),
            post("p2", "y", RecallSource::Graph, 0.8),
            post("p3", "x", RecallSource::Graph, 0.7),
            post("p4", "z", RecallSource::Graph, 0.3),
        ];

        // p3's author is two picks back: 0.5*0.7 - 0.5*1.0 < 0.5*0.3
        let reranked = layer.rerank(posts, 4);
        assert_eq!(ids(&reranked), vec!["p1", "p2", "p4", "p3"]);
    }
}
