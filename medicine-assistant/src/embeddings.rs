use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error};

use crate::config::Settings;
use crate::error::{AssistantError, Result};

/// Turns text into dense vectors for similarity search.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// One vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// Embeddings endpoint of OpenRouter (OpenAI-compatible).
pub struct OpenRouterEmbedder {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenRouterEmbedder {
    pub fn new(
        client: Client,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            Client::new(),
            &settings.openrouter_api_key,
            &settings.openrouter_base_url,
            &settings.embedding_model,
        )
    }
}

#[async_trait]
impl Embedder for OpenRouterEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let payload = json!({
            "model": self.model,
            "input": texts,
        });

        debug!(model = %self.model, inputs = texts.len(), "Requesting embeddings");

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url.trim_end_matches('/')))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(%status, "Embedding request failed: {}", body);
            return Err(AssistantError::TransientService(format!(
                "embedding request failed: {status}"
            )));
        }

        let parsed: EmbeddingResponse = response.json().await?;
        order_embeddings(parsed, texts.len())
    }
}

fn order_embeddings(mut response: EmbeddingResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
    if response.data.len() != expected {
        return Err(AssistantError::TransientService(format!(
            "embedding service returned {} vectors for {} inputs",
            response.data.len(),
            expected
        )));
    }
    response.data.sort_by_key(|d| d.index);
    Ok(response.data.into_iter().map(|d| d.embedding).collect())
}
