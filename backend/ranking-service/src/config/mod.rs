use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const WEIGHT_SUM_TOLERANCE: f32 = 1e-3;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read environment: {0}")]
    Env(#[from] envy::Error),

    #[error("{group} weights must sum to 1.0, got {sum}")]
    WeightSum { group: &'static str, sum: f32 },

    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("Unknown scorer: {0}")]
    UnknownScorer(String),
}

/// Process configuration: service wiring plus the immutable pipeline config.
#[derive(Debug, Clone)]
pub struct Config {
    pub service: ServiceConfig,
    pub redis: RedisConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub service_name: String,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

/// Everything the pipeline reads during a request. Built once, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub recall: RecallConfig,
    pub scoring: ScoringConfig,
    pub diversity: DiversityConfig,
    /// Hard cap on the requested feed size.
    pub max_limit: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecallConfig {
    pub graph_recall_limit: usize,
    pub trending_recall_limit: usize,
    pub personalized_recall_limit: usize,
    pub graph_weight: f32,
    pub trending_weight: f32,
    pub personalized_weight: f32,
    pub graph_timeout: Duration,
    pub trending_timeout: Duration,
    pub personalized_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub engagement: f32,
    pub recency: f32,
    pub author_quality: f32,
    pub content_quality: f32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            engagement: 0.4,
            recency: 0.3,
            author_quality: 0.2,
            content_quality: 0.1,
        }
    }
}

impl ScoreWeights {
    pub fn sum(&self) -> f32 {
        self.engagement + self.recency + self.author_quality + self.content_quality
    }
}

/// Closed set of scorer implementations, chosen by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScorerKind {
    #[default]
    Linear,
}

impl FromStr for ScorerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(ScorerKind::Linear),
            other => Err(ConfigError::UnknownScorer(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub scorer: ScorerKind,
    pub weights: ScoreWeights,
    /// Neutral value substituted for a feature that cannot be computed.
    pub feature_default: f32,
    /// Interaction volume that maps to an engagement of 1.0.
    pub engagement_baseline: f64,
    pub recency_decay_per_hour: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiversityConfig {
    pub mmr_lambda: f32,
    /// How many trailing selections are checked for a repeated author.
    pub author_window: usize,
    pub author_penalty: f32,
    pub source_penalty: f32,
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            graph_recall_limit: 200,
            trending_recall_limit: 100,
            personalized_recall_limit: 100,
            graph_weight: 0.6,
            trending_weight: 0.3,
            personalized_weight: 0.1,
            graph_timeout: Duration::from_millis(300),
            trending_timeout: Duration::from_millis(300),
            personalized_timeout: Duration::from_millis(300),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            scorer: ScorerKind::Linear,
            weights: ScoreWeights::default(),
            feature_default: 0.5,
            engagement_baseline: 100.0,
            recency_decay_per_hour: 1.0 / 24.0,
        }
    }
}

impl Default for DiversityConfig {
    fn default() -> Self {
        Self {
            mmr_lambda: 0.7,
            author_window: 2,
            author_penalty: 1.0,
            source_penalty: 0.3,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            recall: RecallConfig::default(),
            scoring: ScoringConfig::default(),
            diversity: DiversityConfig::default(),
            max_limit: 500,
        }
    }
}

impl RecallConfig {
    pub fn weight_sum(&self) -> f32 {
        self.graph_weight + self.trending_weight + self.personalized_weight
    }

    /// Largest pool the coordinator can build from the configured caps.
    pub fn max_pool_size(&self) -> usize {
        self.graph_recall_limit + self.trending_recall_limit + self.personalized_recall_limit
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let recall = &self.recall;
        for (field, weight) in [
            ("graph_weight", recall.graph_weight),
            ("trending_weight", recall.trending_weight),
            ("personalized_weight", recall.personalized_weight),
        ] {
            check_unit(field, weight)?;
        }
        check_sum("recall", recall.weight_sum())?;

        let weights = &self.scoring.weights;
        for (field, weight) in [
            ("score_weight_engagement", weights.engagement),
            ("score_weight_recency", weights.recency),
            ("score_weight_author_quality", weights.author_quality),
            ("score_weight_content_quality", weights.content_quality),
        ] {
            check_unit(field, weight)?;
        }
        check_sum("score", weights.sum())?;

        check_unit("mmr_lambda", self.diversity.mmr_lambda)?;
        check_unit("feature_default", self.scoring.feature_default)?;

        if !self.diversity.author_penalty.is_finite() || self.diversity.author_penalty < 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "author_penalty",
                value: self.diversity.author_penalty as f64,
            });
        }
        if !self.diversity.source_penalty.is_finite() || self.diversity.source_penalty < 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "source_penalty",
                value: self.diversity.source_penalty as f64,
            });
        }
        if self.max_limit <= 0 {
            return Err(ConfigError::OutOfRange {
                field: "max_limit",
                value: self.max_limit as f64,
            });
        }

        Ok(())
    }
}

fn check_unit(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value: value as f64,
        })
    }
}

fn check_sum(group: &'static str, sum: f32) -> Result<(), ConfigError> {
    if (sum - 1.0).abs() <= WEIGHT_SUM_TOLERANCE {
        Ok(())
    } else {
        Err(ConfigError::WeightSum { group, sum })
    }
}

/// Flat view of the `RANKING_*` environment variables.
#[derive(Debug, Deserialize)]
struct EnvSettings {
    #[serde(default = "default_service_name")]
    service_name: String,
    #[serde(default = "default_redis_url")]
    redis_url: String,
    #[serde(default = "default_request_timeout_ms")]
    request_timeout_ms: u64,

    #[serde(default = "default_graph_recall_limit")]
    graph_recall_limit: usize,
    #[serde(default = "default_secondary_recall_limit")]
    trending_recall_limit: usize,
    #[serde(default = "default_secondary_recall_limit")]
    personalized_recall_limit: usize,
    #[serde(default = "default_graph_weight")]
    graph_weight: f32,
    #[serde(default = "default_trending_weight")]
    trending_weight: f32,
    #[serde(default = "default_personalized_weight")]
    personalized_weight: f32,
    #[serde(default = "default_source_timeout_ms")]
    graph_timeout_ms: u64,
    #[serde(default = "default_source_timeout_ms")]
    trending_timeout_ms: u64,
    #[serde(default = "default_source_timeout_ms")]
    personalized_timeout_ms: u64,

    #[serde(default = "default_scorer")]
    scorer: String,
    #[serde(default = "default_weight_engagement")]
    score_weight_engagement: f32,
    #[serde(default = "default_weight_recency")]
    score_weight_recency: f32,
    #[serde(default = "default_weight_author_quality")]
    score_weight_author_quality: f32,
    #[serde(default = "default_weight_content_quality")]
    score_weight_content_quality: f32,
    #[serde(default = "default_feature_default")]
    feature_default: f32,
    #[serde(default = "default_engagement_baseline")]
    engagement_baseline: f64,
    #[serde(default = "default_recency_decay_per_hour")]
    recency_decay_per_hour: f32,

    #[serde(default = "default_mmr_lambda")]
    mmr_lambda: f32,
    #[serde(default = "default_author_window")]
    author_window: usize,
    #[serde(default = "default_author_penalty")]
    author_penalty: f32,
    #[serde(default = "default_source_penalty")]
    source_penalty: f32,

    #[serde(default = "default_max_limit")]
    max_limit: i32,
}

fn default_service_name() -> String {
    "ranking-service".to_string()
}
fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}
fn default_request_timeout_ms() -> u64 {
    1_000
}
fn default_graph_recall_limit() -> usize {
    200
}
fn default_secondary_recall_limit() -> usize {
    100
}
fn default_graph_weight() -> f32 {
    0.6
}
fn default_trending_weight() -> f32 {
    0.3
}
fn default_personalized_weight() -> f32 {
    0.1
}
fn default_source_timeout_ms() -> u64 {
    300
}
fn default_scorer() -> String {
    "linear".to_string()
}
fn default_weight_engagement() -> f32 {
    0.4
}
fn default_weight_recency() -> f32 {
    0.3
}
fn default_weight_author_quality() -> f32 {
    0.2
}
fn default_weight_content_quality() -> f32 {
    0.1
}
fn default_feature_default() -> f32 {
    0.5
}
fn default_engagement_baseline() -> f64 {
    100.0
}
fn default_recency_decay_per_hour() -> f32 {
    1.0 / 24.0
}
fn default_mmr_lambda() -> f32 {
    0.7
}
fn default_author_window() -> usize {
    2
}
fn default_author_penalty() -> f32 {
    1.0
}
fn default_source_penalty() -> f32 {
    0.3
}
fn default_max_limit() -> i32 {
    500
}

impl EnvSettings {
    fn into_config(self) -> Result<Config, ConfigError> {
        let pipeline = PipelineConfig {
            recall: RecallConfig {
                graph_recall_limit: self.graph_recall_limit,
                trending_recall_limit: self.trending_recall_limit,
                personalized_recall_limit: self.personalized_recall_limit,
                graph_weight: self.graph_weight,
                trending_weight: self.trending_weight,
                personalized_weight: self.personalized_weight,
                graph_timeout: Duration::from_millis(self.graph_timeout_ms),
                trending_timeout: Duration::from_millis(self.trending_timeout_ms),
                personalized_timeout: Duration::from_millis(self.personalized_timeout_ms),
            },
            scoring: ScoringConfig {
                scorer: self.scorer.parse()?,
                weights: ScoreWeights {
                    engagement: self.score_weight_engagement,
                    recency: self.score_weight_recency,
                    author_quality: self.score_weight_author_quality,
                    content_quality: self.score_weight_content_quality,
                },
                feature_default: self.feature_default,
                engagement_baseline: self.engagement_baseline,
                recency_decay_per_hour: self.recency_decay_per_hour,
            },
            diversity: DiversityConfig {
                mmr_lambda: self.mmr_lambda,
                author_window: self.author_window,
                author_penalty: self.author_penalty,
                source_penalty: self.source_penalty,
            },
            max_limit: self.max_limit,
        };
        pipeline.validate()?;

        Ok(Config {
            service: ServiceConfig {
                service_name: self.service_name,
                request_timeout: Duration::from_millis(self.request_timeout_ms),
            },
            redis: RedisConfig {
                url: self.redis_url,
            },
            pipeline,
        })
    }
}

impl Config {
    /// Load configuration from `RANKING_*` environment variables (and `.env`).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let settings: EnvSettings = envy::prefixed("RANKING_").from_env()?;
        settings.into_config()
    }

    /// Same as [`Config::from_env`] but over an explicit set of variables.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let settings: EnvSettings = envy::prefixed("RANKING_").from_iter(vars)?;
        settings.into_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(Vec::new()).unwrap();
        assert_eq!(config.pipeline, PipelineConfig::default());
        assert_eq!(config.service.service_name, "ranking-service");
        assert_eq!(config.pipeline.recall.max_pool_size(), 400);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_vars(vars(&[
            ("RANKING_GRAPH_RECALL_LIMIT", "50"),
            ("RANKING_GRAPH_WEIGHT", "0.5"),
            ("RANKING_TRENDING_WEIGHT", "0.25"),
            ("RANKING_PERSONALIZED_WEIGHT", "0.25"),
            ("RANKING_MMR_LAMBDA", "0.9"),
            ("RANKING_SCORER", "Linear"),
        ]))
        .unwrap();

        assert_eq!(config.pipeline.recall.graph_recall_limit, 50);
        assert!((config.pipeline.recall.graph_weight - 0.5).abs() < 1e-6);
        assert!((config.pipeline.diversity.mmr_lambda - 0.9).abs() < 1e-6);
        assert_eq!(config.pipeline.scoring.scorer, ScorerKind::Linear);
    }

    #[test]
    fn test_recall_weights_must_sum_to_one() {
        let err = Config::from_vars(vars(&[("RANKING_GRAPH_WEIGHT", "0.9")])).unwrap_err();
        assert!(matches!(err, ConfigError::WeightSum { group: "recall", .. }));
    }

    #[test]
    fn test_score_weights_must_sum_to_one() {
        let mut config = PipelineConfig::default();
        config.scoring.weights.recency = 0.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::WeightSum { group: "score", .. })
        ));
    }

    #[test]
    fn test_lambda_range() {
        let mut config = PipelineConfig::default();
        config.diversity.mmr_lambda = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange {
                field: "mmr_lambda",
                ..
            })
        ));
    }

    #[test]
    fn test_unknown_scorer() {
        let err = Config::from_vars(vars(&[("RANKING_SCORER", "gbdt")])).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownScorer(_)));
    }
}
