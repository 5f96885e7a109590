// ============================================
// Feature Extraction
// ============================================
// Turns a candidate plus its hydrated signals into the four bounded
// ranking features. Pure CPU work; signals are fetched beforehand.

use crate::config::ScoringConfig;
use crate::models::{Candidate, FeatureVector, PostSignals, UserContext};
use crate::utils::exponential_decay;
use thiserror::Error;

const SECONDS_PER_HOUR: f32 = 3600.0;

/// A feature that could not be computed; the extractor substitutes the
/// configured default and carries on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureFault {
    #[error("{feature}: signal missing")]
    MissingSignal { feature: &'static str },

    #[error("{feature}: value is not finite")]
    NonFinite { feature: &'static str },

    #[error("recency: unknown creation time")]
    UnknownCreationTime,

    #[error("engagement: baseline must be positive, got {0}")]
    InvalidBaseline(f64),
}

/// Features plus whatever had to be defaulted.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub features: FeatureVector,
    pub faults: Vec<FeatureFault>,
}

pub struct FeatureExtractor {
    config: ScoringConfig,
}

impl FeatureExtractor {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn extract(
        &self,
        candidate: &Candidate,
        signals: Option<&PostSignals>,
        context: &UserContext,
    ) -> Extraction {
        let mut faults = Vec::new();
        let default = self.config.feature_default;

        let engagement = self
            .engagement(signals.and_then(|s| s.interaction_count))
            .unwrap_or_else(|fault| {
                faults.push(fault);
                default
            });

        let recency = self
            .recency(candidate.created_at, context.now)
            .unwrap_or_else(|fault| {
                faults.push(fault);
                default
            });

        let author_quality = bounded("author_quality", signals.and_then(|s| s.author_quality))
            .unwrap_or_else(|fault| {
                faults.push(fault);
                default
            });

        let content_quality = bounded("content_quality", signals.and_then(|s| s.content_quality))
            .unwrap_or_else(|fault| {
                faults.push(fault);
                default
            });

        Extraction {
            features: FeatureVector {
                engagement,
                recency,
                author_quality,
                content_quality,
            },
            faults,
        }
    }

    /// Interaction count against the recent volume baseline.
    fn engagement(&self, interaction_count: Option<f64>) -> Result<f32, FeatureFault> {
        let count = interaction_count.ok_or(FeatureFault::MissingSignal {
            feature: "engagement",
        })?;
        if !count.is_finite() {
            return Err(FeatureFault::NonFinite {
                feature: "engagement",
            });
        }
        let baseline = self.config.engagement_baseline;
        if !baseline.is_finite() || baseline <= 0.0 {
            return Err(FeatureFault::InvalidBaseline(baseline));
        }
        Ok((count.max(0.0) / baseline).min(1.0) as f32)
    }

    /// `e^(-λ_t·Δt)` with Δt in hours since creation.
    fn recency(&self, created_at: i64, now: i64) -> Result<f32, FeatureFault> {
        if created_at <= 0 {
            return Err(FeatureFault::UnknownCreationTime);
        }
        let age_hours = (now - created_at) as f32 / SECONDS_PER_HOUR;
        let value = exponential_decay(age_hours, self.config.recency_decay_per_hour);
        if value.is_finite() {
            Ok(value.clamp(0.0, 1.0))
        } else {
            Err(FeatureFault::NonFinite { feature: "recency" })
        }
    }
}

fn bounded(feature: &'static str, value: Option<f32>) -> Result<f32, FeatureFault> {
    match value {
        None => Err(FeatureFault::MissingSignal { feature }),
        Some(v) if !v.is_finite() => Err(FeatureFault::NonFinite { feature }),
        Some(v) => Ok(v.clamp(0.0, 1.0)),
    }
}
