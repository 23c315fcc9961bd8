use thiserror::Error;

/// Errors raised by the assistant's components.
#[derive(Debug, Error)]
pub enum AssistantError {
    /// A required setting is missing or invalid. Fatal at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The document store was queried before anything was ingested.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network, auth or rate-limit failure of a hosted model call.
    #[error("Service error: {0}")]
    TransientService(String),

    /// Free-text patient extraction did not yield a usable record.
    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AssistantError>;

impl AssistantError {
    pub fn service(context: &str, err: impl std::fmt::Display) -> Self {
        AssistantError::TransientService(format!("{context}: {err}"))
    }
}

impl From<reqwest::Error> for AssistantError {
    fn from(err: reqwest::Error) -> Self {
        AssistantError::TransientService(err.to_string())
    }
}
