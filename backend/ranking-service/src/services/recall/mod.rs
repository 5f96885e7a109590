mod fusion;
mod graph_recall;
mod personalized_recall;
mod trending_recall;

use crate::config::RecallConfig;
use crate::models::{Candidate, CandidatePool, RecallResult, RecallSource, RecallStats};
use crate::services::stores::{FollowGraph, InterestStore, TrendingStore};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub use fusion::{fuse, source_weight};
pub use graph_recall::GraphRecallStrategy;
pub use personalized_recall::PersonalizedRecallStrategy;
pub use trending_recall::TrendingRecallStrategy;

/// One recall strategy: reads a single upstream store.
#[async_trait]
pub trait RecallStrategy: Send + Sync {
    async fn recall(&self, user_id: &str, limit: usize) -> Result<Vec<Candidate>>;
    fn source(&self) -> RecallSource;
}

/// Why a strategy contributed nothing.
#[derive(Debug, thiserror::Error)]
enum RecallFailure {
    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("{0:#}")]
    Failed(anyhow::Error),
}

/// Recall layer: fans out to every strategy in parallel and fuses the results.
pub struct RecallLayer {
    strategies: Vec<Arc<dyn RecallStrategy>>,
    config: RecallConfig,
}

impl RecallLayer {
    pub fn new(
        graph: Arc<dyn FollowGraph>,
        trending: Arc<dyn TrendingStore>,
        interests: Arc<dyn InterestStore>,
        config: RecallConfig,
    ) -> Self {
        let strategies: Vec<Arc<dyn RecallStrategy>> = vec![
            Arc::new(GraphRecallStrategy::new(graph)),
            Arc::new(TrendingRecallStrategy::new(trending)),
            Arc::new(PersonalizedRecallStrategy::new(interests)),
        ];

        Self { strategies, config }
    }

    /// Build a layer over an explicit set of strategies.
    pub fn with_strategies(strategies: Vec<Arc<dyn RecallStrategy>>, config: RecallConfig) -> Self {
        Self { strategies, config }
    }

    pub fn config(&self) -> &RecallConfig {
        &self.config
    }

    fn cap_for(&self, source: RecallSource) -> usize {
        match source {
            RecallSource::Graph => self.config.graph_recall_limit,
            RecallSource::Trending => self.config.trending_recall_limit,
            RecallSource::Personalized => self.config.personalized_recall_limit,
        }
    }

    fn timeout_for(&self, source: RecallSource) -> Duration {
        match source {
            RecallSource::Graph => self.config.graph_timeout,
            RecallSource::Trending => self.config.trending_timeout,
            RecallSource::Personalized => self.config.personalized_timeout,
        }
    }

    /// Recall a candidate pool for `user_id`, keeping at most `limit` entries.
    ///
    /// Strategy failures and timeouts are logged and recorded in the stats;
    /// the pool is built from whatever succeeded. Dropping the returned
    /// future aborts every in-flight strategy task.
    pub async fn recall_candidates(
        &self,
        user_id: &str,
        limit: usize,
    ) -> (CandidatePool, RecallStats) {
        let started = Instant::now();
        let mut stats = RecallStats::default();
        let mut tasks = JoinSet::new();

        for strategy in &self.strategies {
            let strategy = Arc::clone(strategy);
            let source = strategy.source();
            stats.attempted_sources.push(source);
            let cap = self.cap_for(source);
            let timeout = self.timeout_for(source);
            let user_id = user_id.to_string();

            tasks.spawn(async move {
                let outcome = match tokio::time::timeout(timeout, strategy.recall(&user_id, cap))
                    .await
                {
                    Ok(Ok(candidates)) => Ok(candidates),
                    Ok(Err(e)) => Err(RecallFailure::Failed(e)),
                    Err(_) => Err(RecallFailure::TimedOut(timeout)),
                };
                (source, outcome)
            });
        }

        let mut results: Vec<RecallResult> = Vec::with_capacity(self.strategies.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((source, Ok(candidates))) => {
                    debug!(source = %source, count = candidates.len(), "Recall strategy finished");
                    stats.record(source, candidates.len());
                    results.push(RecallResult { source, candidates });
                }
                Ok((source, Err(failure))) => {
                    warn!(
                        user_id = %user_id,
                        source = %source,
                        error = %failure,
                        "Recall strategy failed, continuing with remaining sources"
                    );
                    stats.failed_sources.push(source);
                }
                Err(join_error) => {
                    // the source is unknown here; it is recovered below
                    warn!(error = %join_error, "Recall task aborted");
                }
            }
        }

        for strategy in &self.strategies {
            let source = strategy.source();
            let reported = results.iter().any(|r| r.source == source)
                || stats.failed_sources.contains(&source);
            if !reported {
                stats.failed_sources.push(source);
            }
        }
        stats.attempted_sources.sort();
        stats.failed_sources.sort();
        results.sort_by_key(|r| r.source);

        let mut pool = fuse(results, &self.config);
        pool.truncate(limit);
        stats.total_candidates = pool.len();
        stats.recall_latency_ms = started.elapsed().as_millis() as u64;

        info!(
            user_id = %user_id,
            graph = stats.graph_recall_count,
            trending = stats.trending_recall_count,
            personalized = stats.personalized_recall_count,
            failed = ?stats.failed_sources,
            total = stats.total_candidates,
            latency_ms = stats.recall_latency_ms,
            "Recall completed"
        );

        (pool, stats)
    }
}
