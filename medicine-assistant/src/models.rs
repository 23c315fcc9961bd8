use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AssistantError;
use crate::patient::{PatientInput, PatientRecord};

/// Everything one consult accumulates while moving through the tasks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineState {
    pub message: String,
    pub patient_input: Option<PatientInput>,
    pub patient_record: Option<PatientRecord>,
    pub context: Option<String>,
    pub physician_report: Option<String>,
    pub patient_report: Option<String>,
}

impl PipelineState {
    pub fn new(message: impl Into<String>, patient_input: Option<PatientInput>) -> Self {
        Self {
            message: message.into(),
            patient_input,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultReport {
    pub physician_report: String,
    pub patient_report: String,
    pub patient_record: PatientRecord,
    pub context: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Intake,
    Retrieval,
    PhysicianReport,
    PatientReport,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineStage::Intake => "intake",
            PipelineStage::Retrieval => "retrieval",
            PipelineStage::PhysicianReport => "physician_report",
            PipelineStage::PatientReport => "patient_report",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Configuration,
    NotFound,
    TransientService,
    Extraction,
    Cancelled,
    DeadlineExceeded,
    Internal,
}

impl From<&AssistantError> for FailureKind {
    fn from(err: &AssistantError) -> Self {
        match err {
            AssistantError::Configuration(_) => FailureKind::Configuration,
            AssistantError::NotFound(_) => FailureKind::NotFound,
            AssistantError::TransientService(_) => FailureKind::TransientService,
            AssistantError::Extraction(_) => FailureKind::Extraction,
            AssistantError::Io(_) | AssistantError::Serialization(_) => FailureKind::Internal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultFailure {
    pub stage: PipelineStage,
    pub kind: FailureKind,
    pub message: String,
    /// The record as far as intake got, if it got that far.
    pub patient_record: Option<PatientRecord>,
}

/// Result of one consult. Expected failures are values, not errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConsultOutcome {
    Completed(ConsultReport),
    Failed(ConsultFailure),
}

impl ConsultOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, ConsultOutcome::Completed(_))
    }

    pub fn report(&self) -> Option<&ConsultReport> {
        match self {
            ConsultOutcome::Completed(report) => Some(report),
            ConsultOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&ConsultFailure> {
        match self {
            ConsultOutcome::Completed(_) => None,
            ConsultOutcome::Failed(failure) => Some(failure),
        }
    }
}
