// Utility functions for ranking-service

use std::cmp::Ordering;

/// Scale a raw source score into [0, 1] against the source's largest score.
/// Scores already inside [0, 1] pass through unchanged.
pub fn scale_to_unit(score: f32, source_max: f32) -> f32 {
    if !score.is_finite() || score <= 0.0 {
        return 0.0;
    }
    let denominator = if source_max.is_finite() {
        source_max.max(1.0)
    } else {
        1.0
    };
    (score / denominator).clamp(0.0, 1.0)
}

/// Exponential decay `e^(-rate * age)`; negative ages count as zero.
pub fn exponential_decay(age_hours: f32, rate_per_hour: f32) -> f32 {
    (-rate_per_hour * age_hours.max(0.0)).exp()
}

/// Descending order for scores; NaN sorts last.
pub fn compare_scores_desc(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}
