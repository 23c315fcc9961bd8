use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AssistantError, Result};

pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "openai/gpt-5-mini";
pub const DEFAULT_EMBEDDING_MODEL: &str = "openai/text-embedding-3-small";
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "mistralai/voxtral-small-24b-2507";
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";

/// How the intake stage turns free text into a patient record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMode {
    /// Ask the completion model for a JSON record.
    Model,
    /// Keep the raw text as clinical notes.
    Raw,
}

impl FromStr for ExtractionMode {
    type Err = AssistantError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "model" => Ok(ExtractionMode::Model),
            "raw" => Ok(ExtractionMode::Raw),
            other => Err(AssistantError::Configuration(format!(
                "PATIENT_EXTRACTION must be 'model' or 'raw', got '{other}'"
            ))),
        }
    }
}

/// Runtime settings, read from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub openrouter_api_key: String,
    pub openrouter_base_url: String,
    pub model_name: String,
    pub embedding_model: String,
    pub transcription_model: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k_results: usize,
    pub qdrant_url: String,
    pub qdrant_api_key: Option<String>,
    pub collection_name: String,
    pub max_workers: usize,
    pub ingest_batch_size: usize,
    pub extraction_mode: ExtractionMode,
    pub request_timeout: Duration,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_map(values: &HashMap<String, String>) -> Result<Self> {
        Self::from_lookup(|key| values.get(key).cloned())
    }

    /// Build settings from any key lookup and validate them.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let settings = Self {
            openrouter_api_key: text("OPENROUTER_API_KEY", ""),
            openrouter_base_url: text("OPENROUTER_BASE_URL", OPENROUTER_BASE_URL),
            model_name: text("MODEL_NAME", DEFAULT_MODEL),
            embedding_model: text("EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL),
            transcription_model: text("TRANSCRIPTION_MODEL", DEFAULT_TRANSCRIPTION_MODEL),
            chunk_size: number(&lookup, "CHUNK_SIZE", 1000)?,
            chunk_overlap: number(&lookup, "CHUNK_OVERLAP", 200)?,
            top_k_results: number(&lookup, "TOP_K_RESULTS", 5)?,
            qdrant_url: text("QDRANT_URL", DEFAULT_QDRANT_URL),
            qdrant_api_key: Some(text("QDRANT_API_KEY", "")).filter(|k| !k.is_empty()),
            collection_name: text("COLLECTION_NAME", "medicine_docs"),
            max_workers: number(&lookup, "MAX_WORKERS", 10)?,
            ingest_batch_size: number(&lookup, "INGEST_BATCH_SIZE", 64)?,
            extraction_mode: text("PATIENT_EXTRACTION", "model").parse()?,
            request_timeout: Duration::from_secs(number(&lookup, "REQUEST_TIMEOUT_SECS", 120)?),
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.openrouter_api_key.is_empty() {
            return Err(AssistantError::Configuration(
                "OPENROUTER_API_KEY environment variable is required. \
                 Please set it in your environment."
                    .to_string(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(AssistantError::Configuration(
                "CHUNK_SIZE must be greater than zero".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(AssistantError::Configuration(format!(
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k_results == 0 || self.max_workers == 0 || self.ingest_batch_size == 0 {
            return Err(AssistantError::Configuration(
                "TOP_K_RESULTS, MAX_WORKERS and INGEST_BATCH_SIZE must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_qdrant_url(mut self, url: impl Into<String>) -> Self {
        self.qdrant_url = url.into();
        self
    }
}

fn number<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| {
            AssistantError::Configuration(format!("{key} must be a number, got '{raw}'"))
        }),
    }
}
