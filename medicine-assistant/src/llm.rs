use async_trait::async_trait;
use rig::{client::CompletionClient, completion::Prompt, providers::openrouter};
use tracing::{debug, error};

use crate::config::Settings;
use crate::error::{AssistantError, Result};

/// A hosted text-completion model.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// One completion call: `system` is the fixed instruction, `prompt` the user turn.
    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;
}

/// Completion model served through OpenRouter.
///
/// Holds one rig client for the life of the process.
pub struct OpenRouterCompletion {
    client: openrouter::Client,
    model: String,
    temperature: f64,
}

impl OpenRouterCompletion {
    pub fn new(api_key: &str, base_url: &str, model: impl Into<String>) -> Result<Self> {
        let client = openrouter::Client::builder(api_key)
            .base_url(base_url)
            .build()
            .map_err(|e| AssistantError::service("failed to build completion client", e))?;

        Ok(Self {
            client,
            model: model.into(),
            temperature: 0.7,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(
            &settings.openrouter_api_key,
            &settings.openrouter_base_url,
            &settings.model_name,
        )
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionModel for OpenRouterCompletion {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let agent = self
            .client
            .agent(&self.model)
            .preamble(system)
            .temperature(self.temperature)
            .build();

        debug!(model = %self.model, prompt_chars = prompt.len(), "Calling completion model");

        agent.prompt(prompt).await.map_err(|e| {
            error!(model = %self.model, "Completion call failed: {}", e);
            AssistantError::service("completion request failed", e)
        })
    }
}

/// Remove a surrounding Markdown code fence (```json ... ```), if any.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// The outermost `{...}` span of a model reply.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let text = strip_code_fences(text);
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}
