use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::prompts::{PromptTemplate, PromptVariables};

/// Renders a prompt template and returns the model's text output.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(
        &self,
        template: PromptTemplate,
        variables: &PromptVariables,
    ) -> GatewayResult<String>;
}

/// Google Gemini over the `generateContent` REST endpoint.
pub struct GeminiClient {
    client: reqwest::Client,
    config: LlmConfig,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(config: LlmConfig) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    fn build_request_body(&self, template: PromptTemplate, prompt: &str) -> serde_json::Value {
        let mut body = serde_json::json!({
            "contents": [
                { "role": "user", "parts": [ { "text": prompt } ] }
            ],
            "generationConfig": {
                "temperature": self.config.temperature,
            },
        });

        if let Some(schema) = template.response_schema() {
            body["generationConfig"]["responseMimeType"] = serde_json::json!("application/json");
            body["generationConfig"]["responseSchema"] = schema;
        }

        body
    }
}

/// Concatenates the text parts of the first candidate.
fn extract_text(response: GenerateResponse) -> GatewayResult<String> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if text.is_empty() {
        Err(GatewayError::EmptyResponse)
    } else {
        Ok(text)
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn complete(
        &self,
        template: PromptTemplate,
        variables: &PromptVariables,
    ) -> GatewayResult<String> {
        let prompt = template.render(variables)?;
        debug!(
            template = template.id(),
            model = %self.config.model,
            prompt_chars = prompt.chars().count(),
            "calling language model"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&self.build_request_body(template, &prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response.json().await?;
        extract_text(parsed)
    }
}
