use super::{Candidate, RecallSource, RecallStrategy};
use crate::services::stores::InterestStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

const TAG_DECAY: f32 = 0.05;
const MIN_TAG_WEIGHT: f32 = 0.05;

/// Personalized Recall Strategy - posts matching the user's interest tags
pub struct PersonalizedRecallStrategy {
    interests: Arc<dyn InterestStore>,
}

impl PersonalizedRecallStrategy {
    pub fn new(interests: Arc<dyn InterestStore>) -> Self {
        Self { interests }
    }
}

/// Weaker interests contribute less; decays 5% per tag rank.
fn tag_weight(rank: usize) -> f32 {
    (1.0 - rank as f32 * TAG_DECAY).max(MIN_TAG_WEIGHT)
}

#[async_trait]
impl RecallStrategy for PersonalizedRecallStrategy {
    async fn recall(&self, user_id: &str, limit: usize) -> Result<Vec<Candidate>> {
        let user_interests = self
            .interests
            .user_interests(user_id)
            .await
            .context("Failed to load user interests")?;

        if user_interests.is_empty() {
            warn!(user_id = %user_id, "User has no interests, personalized recall returns empty");
            return Ok(Vec::new());
        }

        let per_tag_limit = (limit / user_interests.len()).max(1);
        let mut seen: HashSet<String> = HashSet::new();
        let mut candidates = Vec::new();

        for (rank, tag) in user_interests.iter().enumerate() {
            let tag_posts = self
                .interests
                .posts_by_tag(tag, per_tag_limit)
                .await
                .with_context(|| format!("Failed to load posts for tag {}", tag))?;

            let weight = tag_weight(rank);
            for post in tag_posts {
                // first (strongest) tag wins for a post matched by several
                if !seen.insert(post.post_id.clone()) {
                    continue;
                }
                let score = post.score as f32 * weight;
                candidates.push(Candidate::from_record(
                    post,
                    RecallSource::Personalized,
                    score,
                ));
            }

            if candidates.len() >= limit {
                break;
            }
        }

        candidates.truncate(limit);
        Ok(candidates)
    }

    fn source(&self) -> RecallSource {
        RecallSource::Personalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PostRecord;
    use crate::services::stores::MockInterestStore;

    fn post(post_id: &str, score: f64) -> PostRecord {
        PostRecord {
            post_id: post_id.to_string(),
            author_id: format!("author_{}", post_id),
            created_at: 1_700_000_000,
            score,
        }
    }

    #[tokio::test]
    async fn test_personalized_recall_no_interests() {
        let mut store = MockInterestStore::new();
        store.expect_user_interests().returning(|_| Ok(Vec::new()));
        store.expect_posts_by_tag().never();

        let strategy = PersonalizedRecallStrategy::new(Arc::new(store));
        let candidates = strategy.recall("user_no_interests", 10).await.unwrap();
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn test_tag_weights_and_dedup() {
        let mut store = MockInterestStore::new();
        store
            .expect_user_interests()
            .returning(|_| Ok(vec!["rust".to_string(), "music".to_string()]));
        store.expect_posts_by_tag().returning(|tag, _| {
            Ok(match tag {
                "rust" => vec![post("p1", 1.0), post("p2", 0.5)],
                _ => vec![post("p1", 0.9), post("p3", 1.0)],
            })
        });

        let strategy = PersonalizedRecallStrategy::new(Arc::new(store));
        let candidates = strategy.recall("user1", 10).await.unwrap();

        let ids: Vec<&str> = candidates.iter().map(|c| c.post_id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2", "p3"]);
        // p3 comes from the second tag and is decayed by 5%
        assert!((candidates[2].source_scores[&RecallSource::Personalized] - 0.95).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_stops_at_cap() {
        let mut store = MockInterestStore::new();
        store
            .expect_user_interests()
            .returning(|_| Ok(vec!["a".to_string(), "b".to_string()]));
        store.expect_posts_by_tag().times(1).returning(|tag, per_tag| {
            Ok((0..per_tag * 2)
                .map(|i| post(&format!("{}{}", tag, i), 1.0))
                .collect())
        });

        let strategy = PersonalizedRecallStrategy::new(Arc::new(store));
        let candidates = strategy.recall("user1", 4).await.unwrap();
        assert_eq!(candidates.len(), 4);
    }
}
