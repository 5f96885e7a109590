//! Request/response boundary for the ranking pipeline.
//!
//! Calls take `tonic::Request` and return `tonic::Response`/`Status` so a
//! transport can be layered on without touching the pipeline. Every call runs
//! under the service-wide request deadline.
//!
//! Other Nova services keep this layer in a `grpc` module; it is `api` here
//! because no gRPC server or generated stubs are built.

use crate::error::PipelineError;
use crate::models::{RecallSource, RecallStats};
use crate::services::pipeline::RankingPipeline;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tonic::{Request, Response, Status};
use tracing::{info, warn};
use uuid::Uuid;

pub const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankFeedRequest {
    pub user_id: String,
    pub limit: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedPost {
    pub post_id: String,
    pub score: f32,
    pub source: RecallSource,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankFeedResponse {
    pub ranked_items: Vec<RankedPost>,
    pub recall_stats: RecallStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecallRequest {
    pub user_id: String,
    pub limit: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecalledCandidate {
    pub post_id: String,
    pub author_id: String,
    pub source: RecallSource,
    /// Fused recall score
    pub raw_score: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecallResponse {
    pub candidates: Vec<RecalledCandidate>,
    pub recall_stats: RecallStats,
}

pub struct RankingServiceImpl {
    pipeline: Arc<RankingPipeline>,
    request_timeout: Duration,
}

impl RankingServiceImpl {
    pub fn new(pipeline: RankingPipeline, request_timeout: Duration) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            request_timeout,
        }
    }

    pub async fn rank_feed(
        &self,
        request: Request<RankFeedRequest>,
    ) -> Result<Response<RankFeedResponse>, Status> {
        let correlation_id = correlation_id(&request);
        let req = request.into_inner();
        let started = Instant::now();

        info!(
            correlation_id = %correlation_id,
            user_id = %req.user_id,
            limit = req.limit,
            "RankFeed request"
        );

        let feed = self
            .with_deadline(self.pipeline.rank_feed(&req.user_id, req.limit))
            .await
            .map_err(|e| log_failure("RankFeed", &correlation_id, e))?;

        let ranked_items: Vec<RankedPost> = feed
            .items
            .into_iter()
            .map(|item| RankedPost {
                post_id: item.post_id,
                score: item.score,
                source: item.source,
            })
            .collect();

        info!(
            correlation_id = %correlation_id,
            returned = ranked_items.len(),
            failed_sources = ?feed.recall_stats.failed_sources,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "RankFeed response"
        );

        Ok(Response::new(RankFeedResponse {
            ranked_items,
            recall_stats: feed.recall_stats,
        }))
    }

    pub async fn recall_candidates(
        &self,
        request: Request<RecallRequest>,
    ) -> Result<Response<RecallResponse>, Status> {
        let correlation_id = correlation_id(&request);
        let req = request.into_inner();

        info!(
            correlation_id = %correlation_id,
            user_id = %req.user_id,
            limit = req.limit,
            "RecallCandidates request"
        );

        let recalled = self
            .with_deadline(self.pipeline.recall_candidates(&req.user_id, req.limit))
            .await
            .map_err(|e| log_failure("RecallCandidates", &correlation_id, e))?;

        let candidates = recalled
            .pool
            .into_ranked()
            .into_iter()
            .map(|c| RecalledCandidate {
                post_id: c.post_id,
                author_id: c.author_id,
                source: c.primary_source,
                raw_score: c.recall_score,
            })
            .collect();

        Ok(Response::new(RecallResponse {
            candidates,
            recall_stats: recalled.recall_stats,
        }))
    }

    /// Run `fut` under the request deadline. On expiry the future is dropped,
    /// which aborts any recall tasks it still owns.
    async fn with_deadline<T, F>(&self, fut: F) -> Result<T, PipelineError>
    where
        F: Future<Output = Result<T, PipelineError>>,
    {
        match tokio::time::timeout(self.request_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::DeadlineExceeded(self.request_timeout)),
        }
    }
}

fn correlation_id<T>(request: &Request<T>) -> String {
    request
        .metadata()
        .get(CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn log_failure(rpc: &str, correlation_id: &str, err: PipelineError) -> Status {
    match &err {
        PipelineError::InvalidArgument(_) => {
            info!(correlation_id = %correlation_id, rpc, error = %err, "Rejected request")
        }
        _ => warn!(correlation_id = %correlation_id, rpc, error = %err, "Request failed"),
    }
    err.into()
}
