//! Read capabilities the pipeline consumes. The core only sees these traits;
//! `RedisStore` is the production implementation.

mod redis_store;

pub use redis_store::RedisStore;

use crate::models::{PostRecord, PostSignals};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Follow graph: who a user follows and what those authors posted.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FollowGraph: Send + Sync {
    /// Followed author ids, strongest affinity first.
    async fn following(&self, user_id: &str, limit: usize) -> Result<Vec<String>>;

    /// Recent posts written by any of `author_ids`, newest first.
    async fn recent_posts(&self, author_ids: &[String], limit: usize) -> Result<Vec<PostRecord>>;
}

/// Time-decayed popular posts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrendingStore: Send + Sync {
    async fn trending_posts(&self, limit: usize) -> Result<Vec<PostRecord>>;
}

/// Interest tags and the posts matching them.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InterestStore: Send + Sync {
    /// Interest tags for a user, strongest first.
    async fn user_interests(&self, user_id: &str) -> Result<Vec<String>>;

    async fn posts_by_tag(&self, tag: &str, limit: usize) -> Result<Vec<PostRecord>>;
}

/// Content metadata used for feature extraction.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SignalStore: Send + Sync {
    /// Signals for the given posts. Posts the store knows nothing about may
    /// be absent from the map.
    async fn post_signals(&self, post_ids: &[String]) -> Result<HashMap<String, PostSignals>>;
}

/// Signal store for deployments without a content-metadata backend; every
/// feature falls back to its default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSignals;

#[async_trait]
impl SignalStore for NoSignals {
    async fn post_signals(&self, _post_ids: &[String]) -> Result<HashMap<String, PostSignals>> {
        Ok(HashMap::new())
    }
}
