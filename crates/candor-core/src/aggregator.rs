//! Session aggregation.
//!
//! Folds the current analysis of every answered question into per-dimension
//! statistics, trends, strengths and weaknesses, an overall score, and
//! outlying responses. Summaries are recomputed on demand; the same session
//! state always yields the same summary apart from `generated_at`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::model::{Dimension, InterviewSession, ResponseAnalysis};
use crate::profile::{ScoringProfile, SummaryThresholds};

/// Direction of a dimension's scores over the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
    /// Fewer answered questions than the profile's `trend_min_samples`.
    InsufficientData,
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Trend::Improving => "improving",
            Trend::Declining => "declining",
            Trend::Stable => "stable",
            Trend::InsufficientData => "insufficient data",
        };
        f.write_str(s)
    }
}

/// Statistics for one dimension across the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// Number of answered questions that scored this dimension.
    pub samples: usize,
    pub trend: Trend,
}

/// Which side of the session mean an outlier falls on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlierDirection {
    High,
    Low,
}

/// A response whose overall score is far from the session's other responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outlier {
    pub question_index: usize,
    pub overall_score: f64,
    pub z_score: f64,
    pub direction: OutlierDirection,
}

/// Session-level profile of the candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub answered_questions: usize,
    pub dimensions: BTreeMap<Dimension, DimensionStats>,
    /// Dimensions whose mean is at or above the strength threshold.
    pub strengths: Vec<Dimension>,
    /// Dimensions whose mean is at or below the weakness threshold.
    pub weaknesses: Vec<Dimension>,
    /// Mean of the answered questions' overall scores.
    pub overall_score: f64,
    #[serde(default)]
    pub outliers: Vec<Outlier>,
    /// `true` once the session has ended.
    pub is_final: bool,
    pub generated_at: DateTime<Utc>,
}

/// Incrementally accumulates analyses in question order.
#[derive(Debug, Clone)]
pub struct RunningSummary {
    thresholds: SummaryThresholds,
    series: BTreeMap<Dimension, Vec<f64>>,
    overall: Vec<(usize, f64)>,
}

impl RunningSummary {
    pub fn new(thresholds: SummaryThresholds) -> Self {
        Self {
            thresholds,
            series: BTreeMap::new(),
            overall: Vec::new(),
        }
    }

    /// Add the current analysis of the next answered question.
    pub fn push(&mut self, analysis: &ResponseAnalysis) {
        for (dim, ds) in &analysis.dimensions {
            self.series.entry(dim.clone()).or_default().push(ds.score);
        }
        self.overall
            .push((analysis.question_index, analysis.overall_score));
    }

    pub fn answered(&self) -> usize {
        self.overall.len()
    }

    /// Build the summary. Fails with `EmptySession` if nothing was pushed.
    pub fn finish(&self, session_id: Uuid, is_final: bool) -> Result<SessionSummary> {
        if self.overall.is_empty() {
            return Err(EngineError::EmptySession(session_id));
        }
        let t = &self.thresholds;
        let answered = self.overall.len();

        let mut dimensions = BTreeMap::new();
        let mut strengths = Vec::new();
        let mut weaknesses = Vec::new();
        for (dim, scores) in &self.series {
            let m = mean(scores);
            if m >= t.strength {
                strengths.push(dim.clone());
            } else if m <= t.weakness {
                weaknesses.push(dim.clone());
            }
            dimensions.insert(
                dim.clone(),
                DimensionStats {
                    mean: m,
                    min: scores.iter().copied().fold(f64::INFINITY, f64::min),
                    max: scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                    samples: scores.len(),
                    trend: trend(scores, answered, t),
                },
            );
        }

        let overall_scores: Vec<f64> = self.overall.iter().map(|(_, s)| *s).collect();
        let overall_score = mean(&overall_scores);

        Ok(SessionSummary {
            session_id,
            answered_questions: answered,
            dimensions,
            strengths,
            weaknesses,
            overall_score,
            outliers: outliers(&self.overall, t.outlier_z_score),
            is_final,
            generated_at: Utc::now(),
        })
    }
}

/// Summarize a session from the current analysis of each answered question.
pub fn summarize(session: &InterviewSession, profile: &ScoringProfile) -> Result<SessionSummary> {
    let mut running = RunningSummary::new(profile.thresholds.clone());
    for analysis in session.questions().iter().filter_map(|q| q.analysis()) {
        running.push(analysis);
    }
    running.finish(session.id, session.is_ended())
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Compare the mean of the earlier half of the scores with the later half.
///
/// Whether there is enough data depends on the session's answered count, not
/// on how many of those questions scored this dimension. A dimension scored
/// only once has no visible change and is stable.
fn trend(scores: &[f64], answered: usize, t: &SummaryThresholds) -> Trend {
    if answered < t.trend_min_samples {
        return Trend::InsufficientData;
    }
    if scores.len() < 2 {
        return Trend::Stable;
    }
    let (early, late) = scores.split_at(scores.len() / 2);
    let delta = mean(late) - mean(early);
    if delta > t.trend_tolerance {
        Trend::Improving
    } else if delta < -t.trend_tolerance {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

/// Responses whose overall score has |z| at or above the threshold.
fn outliers(overall: &[(usize, f64)], z_threshold: f64) -> Vec<Outlier> {
    if overall.len() < 3 {
        return Vec::new();
    }
    let scores: Vec<f64> = overall.iter().map(|(_, s)| *s).collect();
    let m = mean(&scores);
    let variance = scores.iter().map(|s| (s - m).powi(2)).sum::<f64>() / scores.len() as f64;
    let std = variance.sqrt();
    if std <= f64::EPSILON {
        return Vec::new();
    }

    overall
        .iter()
        .filter_map(|&(question_index, overall_score)| {
            let z_score = (overall_score - m) / std;
            (z_score.abs() >= z_threshold).then(|| Outlier {
                question_index,
                overall_score,
                z_score,
                direction: if z_score > 0.0 {
                    OutlierDirection::High
                } else {
                    OutlierDirection::Low
                },
            })
        })
        .collect()
}
