//! Deterministic rule-based scoring.
//!
//! Each dimension starts at its profile base and moves by the weight of every
//! contributing evidence tag, with diminishing returns for repeats of the same
//! tag. Dimensions with no contributing evidence stay at the neutral score with
//! the floor confidence.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use crate::error::{EngineError, Result};
use crate::model::{EvidenceSpan, EvidenceTag, QuestionType, NEUTRAL_SCORE};
use crate::profile::ScoringProfile;
use crate::traits::{
    DimensionEstimate, DimensionScores, ResponseMetadata, ScoringRequest, ScoringStrategy,
};

/// Name recorded on analyses produced by [`RuleBasedStrategy`].
pub const RULE_BASED: &str = "rule-based";

/// Scores dimensions from extracted evidence and the profile's tag weights.
#[derive(Debug, Clone)]
pub struct RuleBasedStrategy {
    profile: Arc<ScoringProfile>,
}

impl RuleBasedStrategy {
    pub fn new(profile: Arc<ScoringProfile>) -> Self {
        Self { profile }
    }

    /// Synchronous scoring core, also used as the analyzer's fallback.
    pub fn score_dimensions(
        &self,
        question_type: QuestionType,
        metadata: &ResponseMetadata,
        evidence: &[EvidenceSpan],
    ) -> Result<DimensionScores> {
        let profile = &self.profile;
        let conf = &profile.confidence;
        let length_ratio =
            (metadata.word_count as f64 / conf.target_word_count.max(1) as f64).min(1.0);

        let mut scores = BTreeMap::new();
        for dimension in profile.weights(question_type)?.keys() {
            let rule = profile.rule(dimension).ok_or_else(|| {
                EngineError::InvalidProfile(format!("dimension '{dimension}' has no rule"))
            })?;

            let mut counts: BTreeMap<EvidenceTag, u32> = BTreeMap::new();
            for span in evidence.iter().filter(|s| rule.contributes(s.tag)) {
                *counts.entry(span.tag).or_default() += 1;
            }

            let estimate = if counts.is_empty() {
                DimensionEstimate {
                    score: NEUTRAL_SCORE,
                    confidence: conf.floor,
                }
            } else {
                let evidence_points: f64 = counts
                    .iter()
                    .map(|(tag, n)| {
                        rule.tag_weight(*tag) * saturate(*n, profile.saturation_rate)
                    })
                    .sum();
                let score = rule.base + evidence_points + rule.length_weight * length_ratio;
                let confidence = conf.floor
                    + conf.evidence_share * (1.0 - 0.5f64.powi(counts.len() as i32))
                    + conf.length_share * length_ratio;
                DimensionEstimate {
                    score: score.clamp(0.0, 100.0),
                    confidence: confidence.clamp(0.0, 1.0),
                }
            };
            scores.insert(dimension.clone(), estimate);
        }
        Ok(scores)
    }
}

/// Share of a tag's weight earned by `n` occurrences.
fn saturate(n: u32, rate: f64) -> f64 {
    1.0 - (1.0 - rate).powi(n as i32)
}

#[async_trait]
impl ScoringStrategy for RuleBasedStrategy {
    fn name(&self) -> &str {
        RULE_BASED
    }

    #[instrument(skip(self, request), fields(question_type = %request.question_type))]
    async fn score(&self, request: &ScoringRequest) -> anyhow::Result<DimensionScores> {
        Ok(self.score_dimensions(request.question_type, &request.metadata, &request.evidence)?)
    }
}
