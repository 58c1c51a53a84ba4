//! Anthropic API scoring strategy.

use std::time::Instant;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use candor_core::traits::{DimensionScores, ScoringRequest, ScoringStrategy};

use crate::error::{check_status, ProviderError};
use crate::prompt::{build_prompt, parse_scores, SYSTEM_PROMPT};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const MAX_TOKENS: u32 = 1024;

/// Scores responses with an Anthropic model.
pub struct AnthropicStrategy {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl AnthropicStrategy {
    pub fn new(api_key: &str, model: &str, base_url: Option<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            client,
        })
    }
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    system: &'a str,
    messages: Vec<AnthropicMessage>,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl ScoringStrategy for AnthropicStrategy {
    fn name(&self) -> &str {
        "anthropic"
    }

    #[instrument(skip(self, request), fields(model = %self.model))]
    async fn score(&self, request: &ScoringRequest) -> anyhow::Result<DimensionScores> {
        let start = Instant::now();

        let body = AnthropicRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            temperature: 0.0,
            system: SYSTEM_PROMPT,
            messages: vec![AnthropicMessage {
                role: "user",
                content: build_prompt(request),
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(e, DEFAULT_TIMEOUT_SECS))?;

        let response = check_status(response, &self.model).await?;
        let api_response: AnthropicResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status: 0,
                message: format!("failed to parse response: {e}"),
            })?;

        let content: String = api_response
            .content
            .iter()
            .map(|c| c.text.as_str())
            .collect();
        debug!(latency_ms = start.elapsed().as_millis() as u64, "model responded");

        Ok(parse_scores(&content, &request.dimensions)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candor_core::model::{Dimension, QuestionType};
    use candor_core::traits::ResponseMetadata;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> ScoringRequest {
        let response = "First I would measure, then cache the hot keys.";
        ScoringRequest {
            question_type: QuestionType::Technical,
            question_text: "How would you speed up a slow endpoint?".into(),
            response_text: response.into(),
            metadata: ResponseMetadata::measure(response, None),
            evidence: vec![],
            dimensions: vec![Dimension::from("depth"), Dimension::from("relevance")],
        }
    }

    #[tokio::test]
    async fn successful_scoring() {
        let server = MockServer::start().await;

        let response_body = serde_json::json!({
            "content": [{"type": "text", "text": "```json\n{\"scores\": {\"depth\": {\"score\": 64, \"confidence\": 0.7}, \"relevance\": {\"score\": 81, \"confidence\": 0.9}}}\n```"}],
            "model": DEFAULT_MODEL,
            "usage": {"input_tokens": 310, "output_tokens": 42}
        });

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&response_body))
            .mount(&server)
            .await;

        let strategy = AnthropicStrategy::new("test-key", DEFAULT_MODEL, Some(server.uri())).unwrap();
        let scores = strategy.score(&request()).await.unwrap();
        assert_eq!(scores[&Dimension::from("depth")].score, 64.0);
        assert_eq!(scores[&Dimension::from("relevance")].confidence, 0.9);
    }

    #[tokio::test]
    async fn authentication_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let strategy = AnthropicStrategy::new("bad-key", DEFAULT_MODEL, Some(server.uri())).unwrap();
        let err = strategy.score(&request()).await.unwrap_err();
        assert!(err.to_string().contains("authentication"));
    }

    #[tokio::test]
    async fn rate_limiting() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "5"))
            .mount(&server)
            .await;

        let strategy = AnthropicStrategy::new("test-key", DEFAULT_MODEL, Some(server.uri())).unwrap();
        let err = strategy.score(&request()).await.unwrap_err();
        let provider_err = err.downcast_ref::<ProviderError>().unwrap();
        assert!(matches!(
            provider_err,
            ProviderError::RateLimited { retry_after_ms: 5000 }
        ));
    }

    #[tokio::test]
    async fn prose_only_answer_is_malformed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [{"type": "text", "text": "The candidate seems strong."}]
            })))
            .mount(&server)
            .await;

        let strategy = AnthropicStrategy::new("test-key", DEFAULT_MODEL, Some(server.uri())).unwrap();
        let err = strategy.score(&request()).await.unwrap_err();
        assert!(err.to_string().contains("malformed"));
    }
}
