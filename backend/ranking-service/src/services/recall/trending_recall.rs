use super::{Candidate, RecallSource, RecallStrategy};
use crate::services::stores::TrendingStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// Trending Recall Strategy - recently popular posts
pub struct TrendingRecallStrategy {
    trending: Arc<dyn TrendingStore>,
}

impl TrendingRecallStrategy {
    pub fn new(trending: Arc<dyn TrendingStore>) -> Self {
        Self { trending }
    }
}

#[async_trait]
impl RecallStrategy for TrendingRecallStrategy {
    async fn recall(&self, _user_id: &str, limit: usize) -> Result<Vec<Candidate>> {
        let trending_posts = self
            .trending
            .trending_posts(limit)
            .await
            .context("Failed to load trending posts")?;

        if trending_posts.is_empty() {
            warn!("No trending posts found");
            return Ok(Vec::new());
        }

        let candidates = trending_posts
            .into_iter()
            .take(limit)
            .map(|post| {
                let score = post.score as f32;
                Candidate::from_record(post, RecallSource::Trending, score)
            })
            .collect();

        Ok(candidates)
    }

    fn source(&self) -> RecallSource {
        RecallSource::Trending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PostRecord;
    use crate::services::stores::MockTrendingStore;

    #[tokio::test]
    async fn test_trending_keeps_store_scores_and_cap() {
        let mut store = MockTrendingStore::new();
        store.expect_trending_posts().returning(|_| {
            Ok((0..5)
                .map(|i| PostRecord {
                    post_id: format!("t{}", i),
                    author_id: format!("a{}", i),
                    created_at: 1_700_000_000,
                    score: 50.0 - i as f64,
                })
                .collect())
        });

        let strategy = TrendingRecallStrategy::new(Arc::new(store));
        let candidates = strategy.recall("user123", 3).await.unwrap();

        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].post_id, "t0");
        assert!((candidates[0].source_scores[&RecallSource::Trending] - 50.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_trending_recall_empty() {
        let mut store = MockTrendingStore::new();
        store.expect_trending_posts().returning(|_| Ok(Vec::new()));

        let strategy = TrendingRecallStrategy::new(Arc::new(store));
        assert!(strategy.recall("user123", 10).await.unwrap().is_empty());
    }
}
