use super::{Candidate, RecallSource, RecallStrategy};
use crate::services::stores::FollowGraph;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

const AFFINITY_STEP: f32 = 0.01;
const MIN_AFFINITY: f32 = 0.01;

/// Graph Recall Strategy - posts from followed authors
pub struct GraphRecallStrategy {
    graph: Arc<dyn FollowGraph>,
}

impl GraphRecallStrategy {
    pub fn new(graph: Arc<dyn FollowGraph>) -> Self {
        Self { graph }
    }
}

/// Affinity by position in the following list (strongest first).
fn author_affinity(rank: usize) -> f32 {
    (1.0 - rank as f32 * AFFINITY_STEP).max(MIN_AFFINITY)
}

#[async_trait]
impl RecallStrategy for GraphRecallStrategy {
    async fn recall(&self, user_id: &str, limit: usize) -> Result<Vec<Candidate>> {
        let following = self
            .graph
            .following(user_id, limit)
            .await
            .context("Failed to load following list")?;

        if following.is_empty() {
            warn!(user_id = %user_id, "User has no following, graph recall returns empty");
            return Ok(Vec::new());
        }

        let affinity: HashMap<&str, f32> = following
            .iter()
            .enumerate()
            .map(|(rank, author_id)| (author_id.as_str(), author_affinity(rank)))
            .collect();

        let posts = self
            .graph
            .recent_posts(&following, limit)
            .await
            .context("Failed to load posts from followed authors")?;

        let candidates = posts
            .into_iter()
            .take(limit)
            .map(|post| {
                let score = affinity
                    .get(post.author_id.as_str())
                    .copied()
                    .unwrap_or(MIN_AFFINITY);
                Candidate::from_record(post, RecallSource::Graph, score)
            })
            .collect();

        Ok(candidates)
    }

    fn source(&self) -> RecallSource {
        RecallSource::Graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PostRecord;
    use crate::services::stores::MockFollowGraph;

    fn post(post_id: &str, author_id: &str) -> PostRecord {
        PostRecord {
            post_id: post_id.to_string(),
            author_id: author_id.to_string(),
            created_at: 1_700_000_000,
            score: 0.0,
        }
    }

    #[tokio::test]
    async fn test_scores_follow_affinity_order() {
        let mut graph = MockFollowGraph::new();
        graph
            .expect_following()
            .returning(|_, _| Ok(vec!["alice".to_string(), "bob".to_string()]));
        graph
            .expect_recent_posts()
            .returning(|_, _| Ok(vec![post("p1", "bob"), post("p2", "alice")]));

        let strategy = GraphRecallStrategy::new(Arc::new(graph));
        let candidates = strategy.recall("user1", 10).await.unwrap();

        assert_eq!(candidates.len(), 2);
        assert!((candidates[0].source_scores[&RecallSource::Graph] - 0.99).abs() < 1e-6);
        assert!((candidates[1].source_scores[&RecallSource::Graph] - 1.0).abs() < 1e-6);
        assert_eq!(candidates[1].author_id, "alice");
    }

    #[tokio::test]
    async fn test_no_following_is_empty_not_error() {
        let mut graph = MockFollowGraph::new();
        graph.expect_following().returning(|_, _| Ok(Vec::new()));
        graph.expect_recent_posts().never();

        let strategy = GraphRecallStrategy::new(Arc::new(graph));
        let candidates = strategy.recall("lonely", 10).await.unwrap();
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn test_store_error_propagates() {
        let mut graph = MockFollowGraph::new();
        graph
            .expect_following()
            .returning(|_, _| Err(anyhow::anyhow!("graph store down")));

        let strategy = GraphRecallStrategy::new(Arc::new(graph));
        assert!(strategy.recall("user1", 10).await.is_err());
    }

    #[test]
    fn test_affinity_floor() {
        assert!((author_affinity(0) - 1.0).abs() < 1e-6);
        assert!((author_affinity(500) - MIN_AFFINITY).abs() < 1e-6);
    }
}
