//! Scoring profile: the externally supplied configuration surface.
//!
//! A profile declares, per question type, which dimensions are scored and
//! their composite weights; per dimension, a base score and the evidence tags
//! that move it; plus confidence parameters and summary thresholds. Profiles
//! are loaded from TOML and validated before use.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result as AnyResult};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::model::{Dimension, EvidenceTag, QuestionType, NEUTRAL_SCORE};
use crate::transcript::ValidationWarning;

/// Allowed deviation of a weight table's sum from 1.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Complete scoring configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringProfile {
    /// Composite weights per question type; the keys are that type's dimension set.
    pub question_types: BTreeMap<QuestionType, BTreeMap<Dimension, f64>>,
    /// Scoring rule per dimension.
    pub dimensions: BTreeMap<Dimension, DimensionRule>,
    pub confidence: ConfidenceParams,
    pub thresholds: SummaryThresholds,
    /// Fraction of the remaining headroom each repeated tag occurrence adds:
    /// a tag seen `n` times contributes `weight * (1 - (1 - rate)^n)`.
    pub saturation_rate: f64,
}

/// How evidence moves one dimension's score.
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionRule {
    pub description: String,
    /// Starting score once any contributing evidence is present.
    pub base: f64,
    /// Points added at or beyond the target word count, scaled linearly below it.
    pub length_weight: f64,
    /// Points per contributing tag (at saturation). Negative weights penalize.
    pub tags: BTreeMap<EvidenceTag, f64>,
}

impl DimensionRule {
    pub fn tag_weight(&self, tag: EvidenceTag) -> f64 {
        self.tags.get(&tag).copied().unwrap_or(0.0)
    }

    /// Whether spans with this tag count as evidence for the dimension.
    pub fn contributes(&self, tag: EvidenceTag) -> bool {
        self.tag_weight(tag) != 0.0
    }
}

/// Confidence derivation parameters.
///
/// `confidence = floor + evidence_share * (1 - 0.5^distinct_tags)
///  + length_share * min(words / target_word_count, 1)`, capped at 1.0.
/// A dimension with no evidence gets exactly `floor`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceParams {
    #[serde(default = "default_floor")]
    pub floor: f64,
    #[serde(default = "default_evidence_share")]
    pub evidence_share: f64,
    #[serde(default = "default_length_share")]
    pub length_share: f64,
    #[serde(default = "default_target_words")]
    pub target_word_count: usize,
}

fn default_floor() -> f64 {
    0.2
}
fn default_evidence_share() -> f64 {
    0.6
}
fn default_length_share() -> f64 {
    0.2
}
fn default_target_words() -> usize {
    120
}

impl Default for ConfidenceParams {
    fn default() -> Self {
        Self {
            floor: default_floor(),
            evidence_share: default_evidence_share(),
            length_share: default_length_share(),
            target_word_count: default_target_words(),
        }
    }
}

/// Thresholds used by the session aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryThresholds {
    /// Mean at or above which a dimension is a strength.
    #[serde(default = "default_strength")]
    pub strength: f64,
    /// Mean at or below which a dimension is a weakness.
    #[serde(default = "default_weakness")]
    pub weakness: f64,
    /// Minimum answered questions before a trend is reported.
    #[serde(default = "default_trend_min")]
    pub trend_min_samples: usize,
    /// Half-to-half mean change (points) still reported as stable.
    #[serde(default = "default_trend_tolerance")]
    pub trend_tolerance: f64,
    /// |z| at or above which a response's overall score is an outlier.
    #[serde(default = "default_outlier_z")]
    pub outlier_z_score: f64,
}

fn default_strength() -> f64 {
    75.0
}
fn default_weakness() -> f64 {
    40.0
}
fn default_trend_min() -> usize {
    4
}
fn default_trend_tolerance() -> f64 {
    5.0
}
fn default_outlier_z() -> f64 {
    1.5
}

impl Default for SummaryThresholds {
    fn default() -> Self {
        Self {
            strength: default_strength(),
            weakness: default_weakness(),
            trend_min_samples: default_trend_min(),
            trend_tolerance: default_trend_tolerance(),
            outlier_z_score: default_outlier_z(),
        }
    }
}

fn default_saturation() -> f64 {
    0.5
}

impl ScoringProfile {
    /// Composite weights (and therefore the dimension set) for a question type.
    pub fn weights(&self, question_type: QuestionType) -> Result<&BTreeMap<Dimension, f64>> {
        self.question_types.get(&question_type).ok_or_else(|| {
            EngineError::InvalidQuestionType(format!(
                "{question_type} (no dimensions configured in the scoring profile)"
            ))
        })
    }

    /// Declared dimension set for a question type, in name order.
    pub fn dimensions_for(&self, question_type: QuestionType) -> Result<Vec<Dimension>> {
        Ok(self.weights(question_type)?.keys().cloned().collect())
    }

    pub fn rule(&self, dimension: &Dimension) -> Option<&DimensionRule> {
        self.dimensions.get(dimension)
    }

    /// Check the profile's invariants.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(EngineError::InvalidProfile(msg));

        if self.question_types.is_empty() {
            return invalid("no question types configured".into());
        }

        for (qt, weights) in &self.question_types {
            if weights.is_empty() {
                return invalid(format!("question type '{qt}' declares no dimensions"));
            }
            for (dim, w) in weights {
                if !w.is_finite() || *w < 0.0 {
                    return invalid(format!(
                        "weight of '{dim}' for '{qt}' must be a non-negative number, got {w}"
                    ));
                }
                if !self.dimensions.contains_key(dim) {
                    return invalid(format!(
                        "question type '{qt}' references undefined dimension '{dim}'"
                    ));
                }
            }
            let sum: f64 = weights.values().sum();
            if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
                return invalid(format!(
                    "weights for '{qt}' sum to {sum}, expected 1.0"
                ));
            }
        }

        for (dim, rule) in &self.dimensions {
            if !(0.0..=100.0).contains(&rule.base) {
                return invalid(format!(
                    "base score of '{dim}' must be within 0..=100, got {}",
                    rule.base
                ));
            }
            if !rule.length_weight.is_finite() || rule.tags.values().any(|w| !w.is_finite()) {
                return invalid(format!("dimension '{dim}' has a non-finite weight"));
            }
        }

        let c = &self.confidence;
        if !(0.0..1.0).contains(&c.floor) {
            return invalid(format!("confidence floor must be within 0..1, got {}", c.floor));
        }
        if c.evidence_share < 0.0 || c.length_share < 0.0 {
            return invalid("confidence shares must be non-negative".into());
        }
        if c.target_word_count == 0 {
            return invalid("confidence target_word_count must be at least 1".into());
        }

        let t = &self.thresholds;
        if t.weakness >= t.strength {
            return invalid(format!(
                "weakness threshold ({}) must be below strength threshold ({})",
                t.weakness, t.strength
            ));
        }
        if t.trend_min_samples < 2 {
            return invalid("trend_min_samples must be at least 2".into());
        }
        if t.trend_tolerance < 0.0 || t.outlier_z_score <= 0.0 {
            return invalid("trend_tolerance must be >= 0 and outlier_z_score > 0".into());
        }

        if !(self.saturation_rate > 0.0 && self.saturation_rate <= 1.0) {
            return invalid(format!(
                "saturation_rate must be within (0, 1], got {}",
                self.saturation_rate
            ));
        }

        Ok(())
    }

    /// Non-fatal issues worth surfacing to whoever maintains the profile.
    pub fn warnings(&self) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        for qt in QuestionType::ALL {
            if !self.question_types.contains_key(&qt) {
                warnings.push(ValidationWarning::general(format!(
                    "question type '{qt}' is not configured; analyzing it will fail"
                )));
            }
        }

        for (qt, weights) in &self.question_types {
            for (dim, w) in weights {
                if *w == 0.0 {
                    warnings.push(ValidationWarning::general(format!(
                        "'{dim}' has zero weight for '{qt}' and never affects the composite"
                    )));
                }
            }
        }

        for (dim, rule) in &self.dimensions {
            if !rule.tags.values().any(|w| *w != 0.0) {
                warnings.push(ValidationWarning::general(format!(
                    "dimension '{dim}' has no contributing tags and will always score {NEUTRAL_SCORE}"
                )));
            }
            let used = self.question_types.values().any(|w| w.contains_key(dim));
            if !used {
                warnings.push(ValidationWarning::general(format!(
                    "dimension '{dim}' is defined but no question type uses it"
                )));
            }
        }

        warnings
    }
}

impl Default for ScoringProfile {
    fn default() -> Self {
        fn weights(entries: &[(&str, f64)]) -> BTreeMap<Dimension, f64> {
            entries.iter().map(|(d, w)| (Dimension::from(*d), *w)).collect()
        }
        fn rule(
            description: &str,
            length_weight: f64,
            tags: &[(EvidenceTag, f64)],
        ) -> DimensionRule {
            DimensionRule {
                description: description.to_string(),
                base: NEUTRAL_SCORE,
                length_weight,
                tags: tags.iter().copied().collect(),
            }
        }

        let mut question_types = BTreeMap::new();
        question_types.insert(
            QuestionType::Technical,
            weights(&[("relevance", 0.35), ("depth", 0.40), ("structure", 0.25)]),
        );
        question_types.insert(
            QuestionType::Behavioral,
            weights(&[
                ("relevance", 0.30),
                ("structure", 0.30),
                ("self-reflection", 0.40),
            ]),
        );
        question_types.insert(
            QuestionType::Situational,
            weights(&[("relevance", 0.35), ("structure", 0.30), ("judgment", 0.35)]),
        );

        use EvidenceTag::*;
        let mut dimensions = BTreeMap::new();
        dimensions.insert(
            Dimension::from("relevance"),
            rule(
                "Stays on the question that was asked",
                0.0,
                &[(QuestionKeyword, 30.0), (ExampleGiven, 10.0), (Hedging, -10.0)],
            ),
        );
        dimensions.insert(
            Dimension::from("depth"),
            rule(
                "Goes beyond surface-level answers with specifics",
                10.0,
                &[
                    (QuantifiedClaim, 20.0),
                    (ExampleGiven, 15.0),
                    (CausalReasoning, 15.0),
                    (TechnicalTerm, 20.0),
                ],
            ),
        );
        dimensions.insert(
            Dimension::from("structure"),
            rule(
                "Organizes the answer into a followable sequence",
                5.0,
                &[(CausalReasoning, 10.0), (SequenceMarker, 25.0), (Outcome, 10.0)],
            ),
        );
        dimensions.insert(
            Dimension::from("self-reflection"),
            rule(
                "Examines their own role and what they learned",
                0.0,
                &[
                    (SelfReflection, 30.0),
                    (Ownership, 15.0),
                    (Outcome, 10.0),
                    (Hedging, -5.0),
                ],
            ),
        );
        dimensions.insert(
            Dimension::from("judgment"),
            rule(
                "Lays out a reasoned course of action",
                5.0,
                &[
                    (CausalReasoning, 20.0),
                    (Ownership, 10.0),
                    (Hypothetical, 20.0),
                    (Hedging, -10.0),
                ],
            ),
        );

        Self {
            question_types,
            dimensions,
            confidence: ConfidenceParams::default(),
            thresholds: SummaryThresholds::default(),
            saturation_rate: default_saturation(),
        }
    }
}

/// The built-in profile in its TOML form. Parses to [`ScoringProfile::default`].
pub const DEFAULT_PROFILE_TOML: &str = r#"# candor scoring profile
saturation_rate = 0.5

[confidence]
floor = 0.2
evidence_share = 0.6
length_share = 0.2
target_word_count = 120

[thresholds]
strength = 75.0
weakness = 40.0
trend_min_samples = 4
trend_tolerance = 5.0
outlier_z_score = 1.5

[question_types.technical]
relevance = 0.35
depth = 0.40
structure = 0.25

[question_types.behavioral]
relevance = 0.30
structure = 0.30
self-reflection = 0.40

[question_types.situational]
relevance = 0.35
structure = 0.30
judgment = 0.35

[dimensions.relevance]
description = "Stays on the question that was asked"
base = 50.0
length_weight = 0.0
tags = { question-keyword = 30.0, example-given = 10.0, hedging = -10.0 }

[dimensions.depth]
description = "Goes beyond surface-level answers with specifics"
base = 50.0
length_weight = 10.0
tags = { quantified-claim = 20.0, example-given = 15.0, causal-reasoning = 15.0, technical-term = 20.0 }

[dimensions.structure]
description = "Organizes the answer into a followable sequence"
base = 50.0
length_weight = 5.0
tags = { causal-reasoning = 10.0, sequence-marker = 25.0, outcome = 10.0 }

[dimensions.self-reflection]
description = "Examines their own role and what they learned"
base = 50.0
length_weight = 0.0
tags = { self-reflection = 30.0, ownership = 15.0, outcome = 10.0, hedging = -5.0 }

[dimensions.judgment]
description = "Lays out a reasoned course of action"
base = 50.0
length_weight = 5.0
tags = { causal-reasoning = 20.0, ownership = 10.0, hypothetical = 20.0, hedging = -10.0 }
"#;

/// Intermediate TOML structure for parsing profile files.
#[derive(Debug, Deserialize)]
struct TomlProfile {
    #[serde(default = "default_saturation")]
    saturation_rate: f64,
    #[serde(default)]
    confidence: ConfidenceParams,
    #[serde(default)]
    thresholds: SummaryThresholds,
    #[serde(default)]
    question_types: BTreeMap<String, BTreeMap<String, f64>>,
    #[serde(default)]
    dimensions: BTreeMap<String, TomlDimensionRule>,
}

#[derive(Debug, Deserialize)]
struct TomlDimensionRule {
    #[serde(default)]
    description: String,
    #[serde(default = "default_base")]
    base: f64,
    #[serde(default)]
    length_weight: f64,
    #[serde(default)]
    tags: BTreeMap<String, f64>,
}

fn default_base() -> f64 {
    NEUTRAL_SCORE
}

/// Parse and validate a profile from a TOML string.
pub fn parse_profile_str(content: &str, source_path: &Path) -> AnyResult<ScoringProfile> {
    let parsed: TomlProfile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let question_types = parsed
        .question_types
        .into_iter()
        .map(|(qt, weights)| {
            let qt: QuestionType = qt.parse()?;
            let weights = weights
                .into_iter()
                .map(|(d, w)| (Dimension::new(d), w))
                .collect();
            Ok((qt, weights))
        })
        .collect::<AnyResult<BTreeMap<_, _>>>()?;

    let dimensions = parsed
        .dimensions
        .into_iter()
        .map(|(name, rule)| {
            let tags = rule
                .tags
                .into_iter()
                .map(|(tag, w)| {
                    let tag: EvidenceTag = tag
                        .parse()
                        .map_err(|e: String| anyhow::anyhow!("dimension '{name}': {e}"))?;
                    Ok((tag, w))
                })
                .collect::<AnyResult<BTreeMap<_, _>>>()?;
            Ok((
                Dimension::new(name),
                DimensionRule {
                    description: rule.description,
                    base: rule.base,
                    length_weight: rule.length_weight,
                    tags,
                },
            ))
        })
        .collect::<AnyResult<BTreeMap<_, _>>>()?;

    let profile = ScoringProfile {
        question_types,
        dimensions,
        confidence: parsed.confidence,
        thresholds: parsed.thresholds,
        saturation_rate: parsed.saturation_rate,
    };
    profile
        .validate()
        .with_context(|| format!("in profile {}", source_path.display()))?;
    Ok(profile)
}

/// Load and validate a profile file.
pub fn load_profile(path: &Path) -> AnyResult<ScoringProfile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read scoring profile: {}", path.display()))?;
    parse_profile_str(&content, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parse(toml: &str) -> AnyResult<ScoringProfile> {
        parse_profile_str(toml, &PathBuf::from("profile.toml"))
    }

    #[test]
    fn default_profile_is_valid() {
        ScoringProfile::default().validate().unwrap();
    }

    #[test]
    fn default_toml_matches_builtin_profile() {
        let parsed = parse(DEFAULT_PROFILE_TOML).unwrap();
        assert_eq!(parsed, ScoringProfile::default());
    }

    #[test]
    fn all_weight_tables_sum_to_one() {
        let profile = ScoringProfile::default();
        for qt in QuestionType::ALL {
            let sum: f64 = profile.weights(qt).unwrap().values().sum();
            assert!((sum - 1.0).abs() <= WEIGHT_SUM_TOLERANCE, "{qt}: {sum}");
        }
    }

    #[test]
    fn dimension_sets_follow_question_type() {
        let profile = ScoringProfile::default();
        let technical: Vec<String> = profile
            .dimensions_for(QuestionType::Technical)
            .unwrap()
            .iter()
            .map(|d| d.to_string())
            .collect();
        assert_eq!(technical, vec!["depth", "relevance", "structure"]);
        let behavioral = profile.dimensions_for(QuestionType::Behavioral).unwrap();
        assert!(behavioral.contains(&Dimension::from("self-reflection")));
    }

    #[test]
    fn rejects_weights_not_summing_to_one() {
        let toml = r#"
[question_types.technical]
depth = 0.5
relevance = 0.4

[dimensions.depth]
tags = { quantified-claim = 20.0 }

[dimensions.relevance]
tags = { question-keyword = 20.0 }
"#;
        let err = parse(toml).unwrap_err();
        assert!(format!("{err:#}").contains("sum to"), "{err:#}");
    }

    #[test]
    fn rejects_undefined_dimension() {
        let toml = r#"
[question_types.technical]
depth = 1.0
"#;
        let err = parse(toml).unwrap_err();
        assert!(format!("{err:#}").contains("undefined dimension"), "{err:#}");
    }

    #[test]
    fn rejects_unknown_question_type() {
        let toml = r#"
[question_types.riddle]
depth = 1.0

[dimensions.depth]
tags = { quantified-claim = 20.0 }
"#;
        let err = parse(toml).unwrap_err();
        let engine_err = err.downcast_ref::<EngineError>().unwrap();
        assert!(matches!(engine_err, EngineError::InvalidQuestionType(_)));
    }

    #[test]
    fn rejects_unknown_tag() {
        let toml = r#"
[question_types.technical]
depth = 1.0

[dimensions.depth]
tags = { charisma = 20.0 }
"#;
        let err = parse(toml).unwrap_err();
        assert!(format!("{err:#}").contains("unknown evidence tag"), "{err:#}");
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let mut profile = ScoringProfile::default();
        profile.thresholds.weakness = 80.0;
        assert!(matches!(
            profile.validate(),
            Err(EngineError::InvalidProfile(_))
        ));
    }

    #[test]
    fn partial_profile_warns_about_missing_types() {
        let toml = r#"
[question_types.technical]
depth = 1.0

[dimensions.depth]
tags = { quantified-claim = 20.0 }

[dimensions.unused]
"#;
        let profile = parse(toml).unwrap();
        assert_eq!(profile.thresholds, SummaryThresholds::default());
        let warnings = profile.warnings();
        assert!(warnings.iter().any(|w| w.message.contains("'behavioral'")));
        assert!(warnings.iter().any(|w| w.message.contains("no question type uses it")));
        assert!(warnings.iter().any(|w| w.message.contains("no contributing tags")));
        assert!(matches!(
            profile.weights(QuestionType::Situational),
            Err(EngineError::InvalidQuestionType(_))
        ));
    }

    #[test]
    fn load_profile_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.toml");
        std::fs::write(&path, DEFAULT_PROFILE_TOML).unwrap();
        let profile = load_profile(&path).unwrap();
        assert_eq!(profile.saturation_rate, 0.5);
        assert!(load_profile(&dir.path().join("missing.toml")).is_err());
    }
}
