//! Prompt construction and output parsing shared by the model providers.
//!
//! Models are asked for a JSON object mapping each requested dimension to a
//! score and confidence. Output is accepted inside a ```json fence, a bare
//! fence, or as the outermost `{...}` in free text.

use std::collections::BTreeMap;

use serde::Deserialize;

use candor_core::model::Dimension;
use candor_core::traits::{DimensionEstimate, DimensionScores, ScoringRequest};

use crate::error::ProviderError;

pub const SYSTEM_PROMPT: &str = "You evaluate candidate responses from structured job interviews. \
Score the response on each requested dimension from 0 (absent) to 100 (exemplary), judging only \
what the response says. Give each score a confidence from 0.0 to 1.0 reflecting how much \
evidence the response offers. Respond ONLY with a JSON object of the form \
{\"scores\": {\"<dimension>\": {\"score\": <number>, \"confidence\": <number>}}}.";

/// Confidence assumed when a model returns a score without one.
const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Evidence lines included in a prompt.
const MAX_PROMPT_SIGNALS: usize = 20;

/// Build the user message for a scoring request.
pub fn build_prompt(request: &ScoringRequest) -> String {
    let mut prompt = format!(
        "Question type: {}\nQuestion: {}\n\nResponse ({} words):\n\"\"\"\n{}\n\"\"\"\n",
        request.question_type,
        request.question_text,
        request.metadata.word_count,
        request.response_text
    );

    if !request.evidence.is_empty() {
        prompt.push_str("\nSignals detected in the response:\n");
        for span in request.evidence.iter().take(MAX_PROMPT_SIGNALS) {
            prompt.push_str(&format!(
                "- {}: \"{}\"\n",
                span.tag,
                span.excerpt(&request.response_text)
            ));
        }
    }

    let dims: Vec<&str> = request.dimensions.iter().map(|d| d.as_str()).collect();
    prompt.push_str(&format!("\nDimensions to score: {}\n", dims.join(", ")));
    prompt
}

/// Extract the JSON payload from a model response.
pub fn extract_json(content: &str) -> Option<String> {
    let mut in_block = false;
    let mut usable = false;
    let mut block = String::new();

    for line in content.lines() {
        let trimmed = line.trim();
        if !in_block && trimmed.starts_with("```") {
            let lang = trimmed.trim_start_matches('`').trim().to_lowercase();
            in_block = true;
            usable = lang.is_empty() || lang == "json";
            block.clear();
            continue;
        }
        if in_block && trimmed == "```" {
            if usable && block.trim_start().starts_with('{') {
                return Some(block);
            }
            in_block = false;
            continue;
        }
        if in_block {
            if !block.is_empty() {
                block.push('\n');
            }
            block.push_str(line);
        }
    }

    // Unclosed fence: take what was accumulated.
    if in_block && usable && block.trim_start().starts_with('{') {
        return Some(block);
    }

    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (start < end).then(|| content[start..=end].to_string())
}

#[derive(Deserialize)]
struct ScoreEnvelope {
    scores: BTreeMap<String, RawEstimate>,
}

#[derive(Deserialize)]
struct RawEstimate {
    score: f64,
    #[serde(default = "default_confidence")]
    confidence: f64,
}

fn default_confidence() -> f64 {
    DEFAULT_CONFIDENCE
}

/// Parse model output into raw dimension scores.
///
/// Values are returned as given; range clamping and dropping of undeclared
/// dimensions happen in the analyzer. Output that mentions none of the
/// requested dimensions is rejected.
pub fn parse_scores(
    content: &str,
    requested: &[Dimension],
) -> Result<DimensionScores, ProviderError> {
    let json = extract_json(content)
        .ok_or_else(|| ProviderError::MalformedOutput("no JSON object in output".into()))?;

    let raw: BTreeMap<String, RawEstimate> = match serde_json::from_str::<ScoreEnvelope>(&json) {
        Ok(envelope) => envelope.scores,
        Err(_) => serde_json::from_str(&json)
            .map_err(|e| ProviderError::MalformedOutput(format!("unexpected JSON shape: {e}")))?,
    };

    let scores: DimensionScores = raw
        .into_iter()
        .map(|(name, est)| {
            (
                Dimension::new(name.trim().to_lowercase()),
                DimensionEstimate {
                    score: est.score,
                    confidence: est.confidence,
                },
            )
        })
        .collect();

    if !requested.iter().any(|d| scores.contains_key(d)) {
        return Err(ProviderError::MalformedOutput(
            "output scores none of the requested dimensions".into(),
        ));
    }
    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candor_core::evidence::extract_for_question;
    use candor_core::model::QuestionType;
    use candor_core::traits::ResponseMetadata;

    fn dims() -> Vec<Dimension> {
        ["depth", "relevance", "structure"]
            .into_iter()
            .map(Dimension::from)
            .collect()
    }

    #[test]
    fn prompt_lists_question_dimensions_and_signals() {
        let question = "How would you reduce latency?";
        let response = "Because reads dominate, I would add a cache; p99 fell 40%.";
        let request = ScoringRequest {
            question_type: QuestionType::Technical,
            question_text: question.into(),
            response_text: response.into(),
            metadata: ResponseMetadata::measure(response, None),
            evidence: extract_for_question(response, QuestionType::Technical, question),
            dimensions: dims(),
        };
        let prompt = build_prompt(&request);
        assert!(prompt.contains("Question type: technical"));
        assert!(prompt.contains(question));
        assert!(prompt.contains("quantified-claim: \"40%\""));
        assert!(prompt.contains("Dimensions to score: depth, relevance, structure"));
    }

    #[test]
    fn parses_fenced_json() {
        let content = "Here you go:\n```json\n{\"scores\": {\"depth\": {\"score\": 72, \"confidence\": 0.8}}}\n```\n";
        let scores = parse_scores(content, &dims()).unwrap();
        let depth = scores[&Dimension::from("depth")];
        assert_eq!(depth.score, 72.0);
        assert_eq!(depth.confidence, 0.8);
    }

    #[test]
    fn parses_bare_object_in_prose() {
        let content = r#"My assessment: {"Depth": {"score": 40}, "structure": {"score": 55, "confidence": 0.3}} Thanks."#;
        let scores = parse_scores(content, &dims()).unwrap();
        assert_eq!(scores[&Dimension::from("depth")].confidence, DEFAULT_CONFIDENCE);
        assert_eq!(scores.len(), 2);
    }

    #[test]
    fn skips_non_json_fences() {
        let content = "```python\nprint('hi')\n```\n```\n{\"scores\": {\"relevance\": {\"score\": 90}}}\n```";
        assert_eq!(
            extract_json(content).unwrap(),
            "{\"scores\": {\"relevance\": {\"score\": 90}}}"
        );
    }

    #[test]
    fn rejects_output_without_json() {
        let err = parse_scores("I think the candidate did well.", &dims()).unwrap_err();
        assert!(matches!(err, ProviderError::MalformedOutput(_)));
    }

    #[test]
    fn rejects_unrelated_dimensions() {
        let err = parse_scores(r#"{"scores": {"charisma": {"score": 99}}}"#, &dims()).unwrap_err();
        assert!(err.to_string().contains("none of the requested"));
    }
}
