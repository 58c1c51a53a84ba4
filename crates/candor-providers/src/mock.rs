//! Mock scoring strategy for testing.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use candor_core::traits::{DimensionEstimate, DimensionScores, ScoringRequest, ScoringStrategy};

use crate::error::ProviderError;
use crate::prompt::parse_scores;

enum Behavior {
    /// Parse this text as if a model had returned it.
    Output(String),
    /// Give every requested dimension the same estimate.
    Uniform(DimensionEstimate),
    /// Return this error message.
    Fail(String),
}

/// A scoring strategy that replays canned model output, for exercising the
/// analysis pipeline without real API calls.
pub struct MockStrategy {
    behavior: Behavior,
    delay: Option<Duration>,
    call_count: AtomicU32,
    last_request: Mutex<Option<ScoringRequest>>,
}

impl MockStrategy {
    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            delay: None,
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// A mock whose "model" always answers with `output`.
    pub fn with_fixed_output(output: &str) -> Self {
        Self::with_behavior(Behavior::Output(output.to_string()))
    }

    /// A mock that scores every requested dimension with the same values.
    pub fn uniform(score: f64, confidence: f64) -> Self {
        Self::with_behavior(Behavior::Uniform(DimensionEstimate { score, confidence }))
    }

    /// A mock whose calls always fail.
    pub fn failing(message: &str) -> Self {
        Self::with_behavior(Behavior::Fail(message.to_string()))
    }

    /// Wait this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of calls made to this strategy.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// The last request made to this strategy.
    pub fn last_request(&self) -> Option<ScoringRequest> {
        self.last_request.lock().ok().and_then(|r| r.clone())
    }
}

#[async_trait]
impl ScoringStrategy for MockStrategy {
    fn name(&self) -> &str {
        "mock"
    }

    async fn score(&self, request: &ScoringRequest) -> anyhow::Result<DimensionScores> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request.clone());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.behavior {
            Behavior::Fail(message) => Err(ProviderError::NetworkError(message.clone()).into()),
            Behavior::Uniform(estimate) => Ok(request
                .dimensions
                .iter()
                .map(|d| (d.clone(), *estimate))
                .collect()),
            Behavior::Output(output) => Ok(parse_scores(output, &request.dimensions)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candor_core::model::{Dimension, QuestionType};
    use candor_core::traits::ResponseMetadata;

    fn request() -> ScoringRequest {
        ScoringRequest {
            question_type: QuestionType::Technical,
            question_text: "Explain a B-tree.".into(),
            response_text: "A balanced tree with wide nodes.".into(),
            metadata: ResponseMetadata::default(),
            evidence: vec![],
            dimensions: vec![Dimension::from("depth"), Dimension::from("relevance")],
        }
    }

    #[tokio::test]
    async fn fixed_output() {
        let strategy = MockStrategy::with_fixed_output(r#"{"depth": {"score": 33}}"#);
        let scores = strategy.score(&request()).await.unwrap();
        assert_eq!(scores[&Dimension::from("depth")].score, 33.0);
        assert_eq!(strategy.call_count(), 1);
        assert_eq!(strategy.last_request().unwrap().question_text, "Explain a B-tree.");
    }

    #[tokio::test]
    async fn uniform_scores_every_requested_dimension() {
        let strategy = MockStrategy::uniform(88.0, 0.9);
        let scores = strategy.score(&request()).await.unwrap();
        assert_eq!(scores.len(), 2);
        assert!(scores.values().all(|e| e.score == 88.0 && e.confidence == 0.9));
    }

    #[tokio::test]
    async fn failing_mock() {
        let strategy = MockStrategy::failing("boom");
        let err = strategy.score(&request()).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}
