//! Ranking pipeline: recall → score → sort → diversify → truncate.

use crate::config::{ConfigError, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::models::{CandidatePool, RankedItem, RecallStats, UserContext};
use crate::services::diversity::DiversityLayer;
use crate::services::ranking::RankingLayer;
use crate::services::recall::RecallLayer;
use crate::services::stores::{FollowGraph, InterestStore, SignalStore, TrendingStore};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Ordered feed plus how recall went.
#[derive(Debug, Clone)]
pub struct RankedFeed {
    pub items: Vec<RankedItem>,
    pub recall_stats: RecallStats,
}

/// Pre-scoring pool plus how recall went.
#[derive(Debug, Clone)]
pub struct RecalledPool {
    pub pool: CandidatePool,
    pub recall_stats: RecallStats,
}

pub struct RankingPipeline {
    recall_layer: RecallLayer,
    ranking_layer: RankingLayer,
    diversity_layer: DiversityLayer,
    signals: Arc<dyn SignalStore>,
    max_limit: i32,
}

impl RankingPipeline {
    /// Build the standard three-source pipeline. The configuration is
    /// validated once here and never changes afterwards.
    pub fn new(
        config: PipelineConfig,
        graph: Arc<dyn FollowGraph>,
        trending: Arc<dyn TrendingStore>,
        interests: Arc<dyn InterestStore>,
        signals: Arc<dyn SignalStore>,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            recall_layer: RecallLayer::new(graph, trending, interests, config.recall),
            ranking_layer: RankingLayer::new(config.scoring),
            diversity_layer: DiversityLayer::from_config(&config.diversity),
            signals,
            max_limit: config.max_limit,
        })
    }

    /// Assemble a pipeline from prebuilt layers.
    pub fn from_layers(
        recall_layer: RecallLayer,
        ranking_layer: RankingLayer,
        diversity_layer: DiversityLayer,
        signals: Arc<dyn SignalStore>,
        max_limit: i32,
    ) -> Self {
        Self {
            recall_layer,
            ranking_layer,
            diversity_layer,
            signals,
            max_limit,
        }
    }

    fn validate_request(&self, user_id: &str, limit: i32) -> Result<usize> {
        if user_id.trim().is_empty() {
            return Err(PipelineError::InvalidArgument(
                "user_id must not be empty".to_string(),
            ));
        }
        if limit <= 0 {
            return Err(PipelineError::InvalidArgument(format!(
                "limit must be positive, got {}",
                limit
            )));
        }
        if limit > self.max_limit {
            return Err(PipelineError::InvalidArgument(format!(
                "limit {} exceeds maximum of {}",
                limit, self.max_limit
            )));
        }
        Ok(limit as usize)
    }

    /// Rank a feed of at most `limit` posts for `user_id`.
    pub async fn rank_feed(&self, user_id: &str, limit: i32) -> Result<RankedFeed> {
        self.rank_feed_with_context(UserContext::new(user_id), limit)
            .await
    }

    /// Same as [`RankingPipeline::rank_feed`] with an explicit reference time.
    pub async fn rank_feed_with_context(
        &self,
        context: UserContext,
        limit: i32,
    ) -> Result<RankedFeed> {
        let limit = self.validate_request(&context.user_id, limit)?;

        // 1. Recall
        let pool_size = self.recall_layer.config().max_pool_size();
        let (pool, recall_stats) = self
            .recall_layer
            .recall_candidates(&context.user_id, pool_size)
            .await;

        if pool.is_empty() {
            if recall_stats.all_failed() {
                return Err(PipelineError::UpstreamUnavailable);
            }
            info!(user_id = %context.user_id, "Recall returned no candidates");
            return Ok(RankedFeed {
                items: Vec::new(),
                recall_stats,
            });
        }

        // 2. Signals for feature extraction
        let post_ids = pool.post_ids();
        let signals = match self.signals.post_signals(&post_ids).await {
            Ok(signals) => signals,
            Err(e) => {
                warn!(
                    user_id = %context.user_id,
                    error = %e,
                    "Signal lookup failed, all features fall back to defaults"
                );
                HashMap::new()
            }
        };

        // 3. Score and sort
        let pool_len = pool.len();
        let ranked = self
            .ranking_layer
            .rank_candidates(pool, &signals, &context);

        // 4. Diversity rerank and truncate
        let items: Vec<RankedItem> = self
            .diversity_layer
            .rerank(ranked, limit)
            .into_iter()
            .take(limit)
            .map(RankedItem::from)
            .collect();

        info!(
            user_id = %context.user_id,
            candidates = pool_len,
            returned = items.len(),
            degraded = recall_stats.is_degraded(),
            "RankFeed completed"
        );

        Ok(RankedFeed {
            items,
            recall_stats,
        })
    }

    /// Recall only: the fused, deduplicated pool before scoring.
    pub async fn recall_candidates(&self, user_id: &str, limit: i32) -> Result<RecalledPool> {
        let limit = self.validate_request(user_id, limit)?;

        let (pool, recall_stats) = self.recall_layer.recall_candidates(user_id, limit).await;
        if pool.is_empty() && recall_stats.all_failed() {
            return Err(PipelineError::UpstreamUnavailable);
        }

        Ok(RecalledPool { pool, recall_stats })
    }
}
