//! Score-distribution confidence analysis.
//!
//! Looks at the top-k scores of a result set and recommends how many hits
//! are worth showing inline. A dominant top hit means the caller can stop
//! at one; uniformly weak scores mean the query itself needs work.

/// Confidence label for a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// Outcome of distribution analysis.
#[derive(Debug, Clone)]
pub struct ConfidenceReport {
    pub recommended_count: usize,
    pub level: ConfidenceLevel,
    /// scores[0] − scores[1]; zero with fewer than two hits.
    pub score_gap: f32,
    pub top_score: f32,
    pub insight: Option<String>,
}

/// Top hit must exceed the runner-up by this factor for a "high" call.
const DOMINANCE_FACTOR: f32 = 2.0;
/// Below this absolute score everything counts as noise.
const WEAK_SCORE: f32 = 0.1;

/// Analyses a descending score slice.
///
/// `default_count` is what the caller would show without guidance.
#[must_use]
pub fn analyze(scores: &[f32], default_count: usize) -> ConfidenceReport {
    let top_score = scores.first().copied().unwrap_or(0.0);
    let second = scores.get(1).copied().unwrap_or(0.0);
    let score_gap = (top_score - second).max(0.0);

    if scores.is_empty() || top_score < WEAK_SCORE {
        return ConfidenceReport {
            recommended_count: 0,
            level: ConfidenceLevel::Low,
            score_gap,
            top_score,
            insight: Some(
                "Scores are uniformly low; try rephrasing the query or using more specific terms"
                    .to_string(),
            ),
        };
    }

    if scores.len() == 1 || top_score >= second * DOMINANCE_FACTOR {
        return ConfidenceReport {
            recommended_count: 1,
            level: ConfidenceLevel::High,
            score_gap,
            top_score,
            insight: None,
        };
    }

    ConfidenceReport {
        recommended_count: default_count.min(scores.len()),
        level: ConfidenceLevel::Medium,
        score_gap,
        top_score,
        insight: None,
    }
}
