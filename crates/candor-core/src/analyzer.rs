//! Response analysis: evidence extraction, scoring, normalization, and
//! justification for a single question event.
//!
//! The configured strategy runs under a timeout. If it errors or times out,
//! the analyzer logs a warning and uses the rule-based scores instead, marking
//! the analysis with `fallback_used`. Whatever a strategy returns is normalized
//! against the profile's declared dimension set before the analysis is built,
//! and the analysis is attached to the question only once fully computed.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

use crate::error::{EngineError, Result};
use crate::evidence::extract_for_question;
use crate::model::{
    Dimension, DimensionScore, EvidenceSpan, QuestionEvent, QuestionState, QuestionType,
    ResponseAnalysis, NEUTRAL_SCORE,
};
use crate::profile::ScoringProfile;
use crate::scoring::{RuleBasedStrategy, RULE_BASED};
use crate::traits::{DimensionScores, ResponseMetadata, ScoringRequest, ScoringStrategy};

/// Default time budget for one strategy call.
pub const DEFAULT_STRATEGY_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest excerpt quoted verbatim in a justification.
const MAX_EXCERPT_CHARS: usize = 60;

/// Spans cited per dimension in a justification.
const CITATIONS_PER_DIMENSION: usize = 2;

/// Turns response text into a [`ResponseAnalysis`] and attaches it.
pub struct ResponseAnalyzer {
    profile: Arc<ScoringProfile>,
    primary: Arc<dyn ScoringStrategy>,
    fallback: RuleBasedStrategy,
    timeout: Duration,
}

impl ResponseAnalyzer {
    pub fn new(
        profile: Arc<ScoringProfile>,
        primary: Arc<dyn ScoringStrategy>,
        timeout: Duration,
    ) -> Self {
        let fallback = RuleBasedStrategy::new(profile.clone());
        Self {
            profile,
            primary,
            fallback,
            timeout,
        }
    }

    /// An analyzer whose configured strategy is the rule-based one.
    pub fn rule_based(profile: Arc<ScoringProfile>) -> Self {
        let primary = Arc::new(RuleBasedStrategy::new(profile.clone()));
        Self::new(profile, primary, DEFAULT_STRATEGY_TIMEOUT)
    }

    pub fn profile(&self) -> &ScoringProfile {
        &self.profile
    }

    /// Name of the configured (primary) strategy.
    pub fn strategy_name(&self) -> &str {
        self.primary.name()
    }

    /// Analyze the response to an asked question and attach the result.
    ///
    /// The question must be in the `asked` state; on any error it is left
    /// untouched.
    pub async fn analyze(&self, question: &mut QuestionEvent, response_text: &str) -> Result<()> {
        match question.state() {
            QuestionState::Asked => {}
            QuestionState::Created => {
                return Err(EngineError::StateConflict(format!(
                    "question {} has not been asked yet",
                    question.index
                )))
            }
            state => {
                return Err(EngineError::StateConflict(format!(
                    "question {} is already {state}",
                    question.index
                )))
            }
        }

        let analysis = self
            .evaluate(question, response_text, 1, Utc::now())
            .await?;
        question.attach_analysis(analysis)
    }

    /// Re-score the latest response to an answered question, appending a new
    /// analysis version. Earlier versions are kept.
    pub async fn reanalyze(&self, question: &mut QuestionEvent) -> Result<()> {
        let (text, version, received_at) = match question.analysis() {
            Some(latest) if question.is_answered() => {
                let received_at = question
                    .analyses()
                    .first()
                    .map(|a| a.analyzed_at)
                    .unwrap_or(latest.analyzed_at);
                (latest.response_text.clone(), latest.version + 1, received_at)
            }
            _ => {
                return Err(EngineError::StateConflict(format!(
                    "question {} is {} and has nothing to re-analyze",
                    question.index,
                    question.state()
                )))
            }
        };

        let analysis = self.evaluate(question, &text, version, received_at).await?;
        question.append_reanalysis(analysis)
    }

    /// Build an analysis without attaching it.
    #[instrument(skip(self, question, response_text), fields(question = question.index, qt = %question.question_type))]
    pub async fn evaluate(
        &self,
        question: &QuestionEvent,
        response_text: &str,
        version: u32,
        received_at: DateTime<Utc>,
    ) -> Result<ResponseAnalysis> {
        let question_type = question.question_type;
        let weights = self.profile.weights(question_type)?;

        let evidence = extract_for_question(response_text, question_type, &question.text);
        let elapsed_ms = question
            .asked_at()
            .map(|asked| (received_at - asked).num_milliseconds().max(0) as u64);
        let metadata = ResponseMetadata::measure(response_text, elapsed_ms);

        let request = ScoringRequest {
            question_type,
            question_text: question.text.clone(),
            response_text: response_text.to_string(),
            metadata,
            evidence,
            dimensions: weights.keys().cloned().collect(),
        };

        let (raw, strategy, fallback_used) = self.run_strategy(&request).await?;
        let dimensions = self.normalize(question_type, raw, &request.evidence)?;

        let overall_score = weights
            .iter()
            .map(|(dim, w)| w * dimensions.get(dim).map_or(NEUTRAL_SCORE, |d| d.score))
            .sum::<f64>()
            .clamp(0.0, 100.0);

        let justification = self.justify(question_type, overall_score, &dimensions, response_text);

        debug!(
            overall = overall_score,
            spans = request.evidence.len(),
            %strategy,
            fallback_used,
            "response analyzed"
        );

        Ok(ResponseAnalysis {
            question_index: question.index,
            version,
            response_text: response_text.to_string(),
            dimensions,
            overall_score,
            justification,
            strategy,
            fallback_used,
            analyzed_at: Utc::now(),
        })
    }

    /// Run the primary strategy, falling back to rule-based scoring on error
    /// or timeout.
    async fn run_strategy(&self, request: &ScoringRequest) -> Result<(DimensionScores, String, bool)> {
        let name = self.primary.name().to_string();
        let failure = match tokio::time::timeout(self.timeout, self.primary.score(request)).await {
            Ok(Ok(scores)) => return Ok((scores, name, false)),
            Ok(Err(e)) => format!("{e:#}"),
            Err(_) => format!("timed out after {}ms", self.timeout.as_millis()),
        };

        warn!(strategy = %name, error = %failure, "scoring strategy failed; using rule-based fallback");
        let scores = self.fallback.score_dimensions(
            request.question_type,
            &request.metadata,
            &request.evidence,
        )?;
        Ok((scores, RULE_BASED.to_string(), true))
    }

    /// Keep exactly the declared dimensions, clamp their values, and attach
    /// each dimension's contributing evidence.
    fn normalize(
        &self,
        question_type: QuestionType,
        mut raw: DimensionScores,
        evidence: &[EvidenceSpan],
    ) -> Result<BTreeMap<Dimension, DimensionScore>> {
        let floor = self.profile.confidence.floor;
        let mut out = BTreeMap::new();

        for dimension in self.profile.weights(question_type)?.keys() {
            let rule = self.profile.rule(dimension).ok_or_else(|| {
                EngineError::InvalidProfile(format!("dimension '{dimension}' has no rule"))
            })?;

            let (score, confidence) = match raw.remove(dimension) {
                Some(est) if est.score.is_finite() => {
                    let confidence = if est.confidence.is_finite() {
                        est.confidence.clamp(0.0, 1.0)
                    } else {
                        floor
                    };
                    (est.score.clamp(0.0, 100.0), confidence)
                }
                Some(_) => {
                    warn!(%dimension, "strategy returned a non-finite score; using neutral");
                    (NEUTRAL_SCORE, floor)
                }
                None => {
                    warn!(%dimension, "strategy omitted a declared dimension; using neutral");
                    (NEUTRAL_SCORE, floor)
                }
            };

            let evidence = evidence
                .iter()
                .filter(|s| rule.contributes(s.tag))
                .cloned()
                .collect();

            out.insert(
                dimension.clone(),
                DimensionScore {
                    score,
                    confidence,
                    evidence,
                },
            );
        }

        for extra in raw.keys() {
            debug!(dimension = %extra, "dropping undeclared dimension from strategy output");
        }

        Ok(out)
    }

    fn justify(
        &self,
        question_type: QuestionType,
        overall: f64,
        dimensions: &BTreeMap<Dimension, DimensionScore>,
        response_text: &str,
    ) -> String {
        let thresholds = &self.profile.thresholds;
        let mut lines = vec![format!(
            "Overall {overall:.0}/100 for a {question_type} question."
        )];

        for (dimension, ds) in dimensions {
            if ds.evidence.is_empty() {
                lines.push(format!(
                    "Scored {:.0}/100 on {dimension}; no supporting evidence was found in the response.",
                    ds.score
                ));
                continue;
            }

            let level = if ds.score >= thresholds.strength {
                "high"
            } else if ds.score <= thresholds.weakness {
                "low"
            } else {
                "moderate"
            };

            let weight = |span: &EvidenceSpan| {
                self.profile
                    .rule(dimension)
                    .map_or(0.0, |r| r.tag_weight(span.tag).abs())
            };
            let mut cited: Vec<&EvidenceSpan> = ds.evidence.iter().collect();
            cited.sort_by(|a, b| weight(*b).total_cmp(&weight(*a)).then(a.start.cmp(&b.start)));
            cited.truncate(CITATIONS_PER_DIMENSION);
            cited.sort_by_key(|s| (s.start, s.end));

            let citations: Vec<String> = cited
                .iter()
                .map(|s| {
                    format!(
                        "{} \"{}\" at characters [{}, {})",
                        s.rationale,
                        quote(&s.excerpt(response_text)),
                        s.start,
                        s.end
                    )
                })
                .collect();

            lines.push(format!(
                "Scored {level} on {dimension} ({:.0}/100, confidence {:.2}): response {}.",
                ds.score,
                ds.confidence,
                citations.join("; ")
            ));
        }

        lines.join("\n")
    }
}

/// Trim whitespace and shorten long excerpts.
fn quote(excerpt: &str) -> String {
    let trimmed = excerpt.trim();
    if trimmed.chars().count() <= MAX_EXCERPT_CHARS {
        trimmed.to_string()
    } else {
        let mut short: String = trimmed.chars().take(MAX_EXCERPT_CHARS - 1).collect();
        short.push('…');
        short
    }
}
