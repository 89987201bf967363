//! Query embedding through an Ollama server.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::EmbeddingConfig;
use crate::error::{GatewayError, GatewayResult};

/// Turns text into a dense vector comparable with the stored document embeddings.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_query(&self, text: &str) -> GatewayResult<Vec<f32>>;

    fn model(&self) -> &str;
}

pub struct OllamaEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url(),
            model: config.model.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/embed", self.base_url)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed_query(&self, text: &str) -> GatewayResult<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });

        let response = self.client.post(self.endpoint()).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EmbedResponse = response.json().await?;
        let embedding = first_embedding(parsed)?;
        debug!(model = %self.model, dims = embedding.len(), "query embedded");
        Ok(embedding)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn first_embedding(response: EmbedResponse) -> GatewayResult<Vec<f32>> {
    match response.embeddings.into_iter().next() {
        Some(embedding) if !embedding.is_empty() => Ok(embedding),
        _ => Err(GatewayError::Embedding(
            "server returned no embedding".to_string(),
        )),
    }
}

/// Serializes an embedding as a pgvector literal (`[0.1,0.2,...]`).
pub fn to_vector_literal(embedding: &[f32]) -> String {
    let parts: Vec<String> = embedding.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_uses_configured_host() {
        let config = EmbeddingConfig {
            host: "ollama".to_string(),
            ..Default::default()
        };
        let embedder = OllamaEmbedder::new(&config).unwrap();
        assert_eq!(embedder.endpoint(), "http://ollama:11434/api/embed");
        assert_eq!(embedder.model(), "nomic-embed-text");
    }

    #[test]
    fn test_first_embedding() {
        let parsed: EmbedResponse =
            serde_json::from_str(r#"{"model":"m","embeddings":[[0.5,-1.0],[9.0]]}"#).unwrap();
        assert_eq!(first_embedding(parsed).unwrap(), vec![0.5, -1.0]);

        let empty: EmbedResponse = serde_json::from_str(r#"{"embeddings":[]}"#).unwrap();
        assert!(matches!(
            first_embedding(empty),
            Err(GatewayError::Embedding(_))
        ));

        let missing: EmbedResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(first_embedding(missing).is_err());
    }

    #[test]
    fn test_vector_literal() {
        assert_eq!(to_vector_literal(&[0.5, -1.0, 2.0]), "[0.5,-1,2]");
        assert_eq!(to_vector_literal(&[]), "[]");
    }
}
