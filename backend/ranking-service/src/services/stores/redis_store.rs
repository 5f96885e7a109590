use super::{FollowGraph, InterestStore, SignalStore, TrendingStore};
use crate::models::{PostRecord, PostSignals};
use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Key: sorted set of trending post ids, score = decayed interaction score
const TRENDING_KEY: &str = "trending:posts:1h";

/// Redis-backed implementation of every read capability.
///
/// Key layout:
/// - `user:{user_id}:following`  ZSET author_id → affinity
/// - `author:{author_id}:posts`  ZSET post_id → created_at
/// - `trending:posts:1h`         ZSET post_id → trending score
/// - `user:{user_id}:interests`  ZSET tag → interest weight
/// - `tag:{tag}:posts`           ZSET post_id → tag relevance
/// - `post:{post_id}`            HASH author_id, created_at, interactions
/// - `author_quality:{author_id}`, `content_quality:{post_id}`  STRING f32
#[derive(Clone)]
pub struct RedisStore {
    redis_client: redis::Client,
}

impl RedisStore {
    pub fn new(redis_client: redis::Client) -> Self {
        Self { redis_client }
    }

    async fn connection(&self) -> Result<MultiplexedConnection> {
        self.redis_client
            .get_multiplexed_async_connection()
            .await
            .context("Failed to get Redis connection")
    }

    /// Attach author and creation time from `post:{id}` hashes to scored ids.
    async fn hydrate_records(
        &self,
        conn: &mut MultiplexedConnection,
        scored: Vec<(String, f64)>,
    ) -> Result<Vec<PostRecord>> {
        if scored.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for (post_id, _) in &scored {
            pipe.cmd("HMGET")
                .arg(format!("post:{}", post_id))
                .arg("author_id")
                .arg("created_at");
        }
        let metadata: Vec<redis::Value> = pipe
            .query_async(conn)
            .await
            .context("Failed to fetch post metadata from Redis")?;

        Ok(scored
            .into_iter()
            .zip(metadata)
            .map(|((post_id, score), value)| {
                let (author_id, created_at): (Option<String>, Option<i64>) =
                    decode_post_fields(&post_id, &value);
                PostRecord {
                    post_id,
                    author_id: author_id.unwrap_or_default(),
                    created_at: created_at.unwrap_or(0),
                    score,
                }
            })
            .collect())
    }
}

/// Decode a two-field HMGET reply from `post:{id}`. A malformed hash is
/// logged and treated as missing.
fn decode_post_fields<A, B>(post_id: &str, value: &redis::Value) -> (Option<A>, Option<B>)
where
    A: redis::FromRedisValue,
    B: redis::FromRedisValue,
{
    match redis::from_redis_value(value) {
        Ok(fields) => fields,
        Err(e) => {
            warn!(post_id = %post_id, error = %e, "Malformed post metadata in Redis");
            (None, None)
        }
    }
}

fn stop_index(limit: usize) -> isize {
    limit.saturating_sub(1) as isize
}

#[async_trait]
impl FollowGraph for RedisStore {
    async fn following(&self, user_id: &str, limit: usize) -> Result<Vec<String>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.connection().await?;
        let key = format!("user:{}:following", user_id);
        let authors: Vec<String> = conn
            .zrevrange(&key, 0, stop_index(limit))
            .await
            .context("Failed to fetch following list from Redis")?;
        Ok(authors)
    }

    async fn recent_posts(&self, author_ids: &[String], limit: usize) -> Result<Vec<PostRecord>> {
        if author_ids.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.connection().await?;

        let per_author = (limit / author_ids.len()).max(1);
        let mut pipe = redis::pipe();
        for author_id in author_ids {
            pipe.zrevrange_withscores(
                format!("author:{}:posts", author_id),
                0,
                stop_index(per_author),
            );
        }
        let per_author_posts: Vec<redis::Value> = pipe
            .query_async(&mut conn)
            .await
            .context("Failed to fetch author posts from Redis")?;

        let mut records = Vec::new();
        for (author_id, value) in author_ids.iter().zip(per_author_posts) {
            let posts: Vec<(String, f64)> = redis::from_redis_value(&value)
                .with_context(|| format!("Malformed post list for author {}", author_id))?;
            records.extend(posts.into_iter().map(|(post_id, created_at)| PostRecord {
                post_id,
                author_id: author_id.clone(),
                created_at: created_at as i64,
                score: 0.0,
            }));
        }

        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.post_id.cmp(&b.post_id))
        });
        records.truncate(limit);
        Ok(records)
    }
}

#[async_trait]
impl TrendingStore for RedisStore {
    async fn trending_posts(&self, limit: usize) -> Result<Vec<PostRecord>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.connection().await?;

        // ZREVRANGE trending:posts:1h 0 {limit-1} WITHSCORES
        let scored: Vec<(String, f64)> = conn
            .zrevrange_withscores(TRENDING_KEY, 0, stop_index(limit))
            .await
            .context("Failed to fetch trending posts from Redis")?;

        self.hydrate_records(&mut conn, scored).await
    }
}

#[async_trait]
impl InterestStore for RedisStore {
    async fn user_interests(&self, user_id: &str) -> Result<Vec<String>> {
        let mut conn = self.connection().await?;
        let key = format!("user:{}:interests", user_id);
        let interests: Vec<String> = conn
            .zrevrange(&key, 0, -1)
            .await
            .context("Failed to fetch user interests from Redis")?;
        Ok(interests)
    }

    async fn posts_by_tag(&self, tag: &str, limit: usize) -> Result<Vec<PostRecord>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.connection().await?;
        let key = format!("tag:{}:posts", tag);
        let scored: Vec<(String, f64)> = conn
            .zrevrange_withscores(&key, 0, stop_index(limit))
            .await
            .context("Failed to fetch posts by tag from Redis")?;

        self.hydrate_records(&mut conn, scored).await
    }
}

#[async_trait]
impl SignalStore for RedisStore {
    async fn post_signals(&self, post_ids: &[String]) -> Result<HashMap<String, PostSignals>> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut conn = self.connection().await?;

        let mut pipe = redis::pipe();
        for post_id in post_ids {
            pipe.cmd("HMGET")
                .arg(format!("post:{}", post_id))
                .arg("author_id")
                .arg("interactions");
            pipe.get(format!("content_quality:{}", post_id));
        }
        let raw: Vec<redis::Value> = pipe
            .query_async(&mut conn)
            .await
            .context("Failed to fetch post signals from Redis")?;

        let mut signals = HashMap::with_capacity(post_ids.len());
        let mut authors: Vec<(String, String)> = Vec::new();

        for (post_id, chunk) in post_ids.iter().zip(raw.chunks(2)) {
            let (author_id, interactions): (Option<String>, Option<f64>) =
                decode_post_fields(post_id, &chunk[0]);
            let content_quality: Option<f32> =
                chunk.get(1).and_then(|v| redis::from_redis_value(v).ok());

            if let Some(author_id) = author_id {
                authors.push((post_id.clone(), author_id));
            }
            signals.insert(
                post_id.clone(),
                PostSignals {
                    interaction_count: interactions,
                    author_quality: None,
                    content_quality,
                },
            );
        }

        if !authors.is_empty() {
            let keys: Vec<String> = authors
                .iter()
                .map(|(_, author_id)| format!("author_quality:{}", author_id))
                .collect();
            let qualities: Vec<Option<f32>> = redis::cmd("MGET")
                .arg(&keys)
                .query_async(&mut conn)
                .await
                .context("Failed to fetch author quality from Redis")?;

            for ((post_id, _), quality) in authors.iter().zip(qualities) {
                if let Some(entry) = signals.get_mut(post_id) {
                    entry.author_quality = quality;
                }
            }
        }

        debug!(requested = post_ids.len(), "Fetched post signals from Redis");
        Ok(signals)
    }
}
