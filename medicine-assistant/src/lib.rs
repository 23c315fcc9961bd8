pub mod agent;
pub mod chunker;
pub mod collaborators;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extraction;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod patient;
pub mod reports;
pub mod retrieval;
pub mod store;
pub mod tasks;
pub mod telemetry;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;

pub use agent::{MedicineAssistant, open_store};
pub use config::{ExtractionMode, Settings};
pub use error::{AssistantError, Result};
pub use models::*;
pub use patient::{Medication, Medications, PatientInput, PatientRecord};
pub use consult_flow::{CancellationToken, RunOptions};
