use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::config::ExtractionMode;
use crate::error::{AssistantError, Result};
use crate::llm::{CompletionModel, extract_json_object};
use crate::patient::PatientRecord;

pub const EXTRACTION_SYSTEM_PROMPT: &str = "You extract structured patient data from clinical free text. \
Return a single JSON object and nothing else, using only these keys: patient_id, name, age, gender, \
height_cm, weight_kg, diabetes_type, duration_years, comorbidities, latest_hba1c, blood_glucose, \
blood_pressure, egfr, lipid_panel, current_meds, allergies, symptoms_notes, treatment_adjustments.

Rules:
- Numbers without units for age, height_cm, weight_kg, duration_years, latest_hba1c and egfr.
- current_meds is a JSON array of objects with name, dose and frequency (dose and frequency may be null).
- Put symptoms and any remaining clinical remarks in symptoms_notes.
- Use null for anything the text does not state. Never guess values.";

/// Turns free text into a [`PatientRecord`].
pub struct PatientExtractor {
    model: Arc<dyn CompletionModel>,
    mode: ExtractionMode,
}

impl PatientExtractor {
    pub fn new(model: Arc<dyn CompletionModel>, mode: ExtractionMode) -> Self {
        Self { model, mode }
    }

    pub fn mode(&self) -> ExtractionMode {
        self.mode
    }

    pub async fn extract(&self, text: &str) -> Result<PatientRecord> {
        if self.mode == ExtractionMode::Raw {
            return Ok(PatientRecord::from_notes(text));
        }

        let reply = self.model.complete(EXTRACTION_SYSTEM_PROMPT, text).await?;
        debug!(reply_chars = reply.len(), "Extraction reply received");

        let record = parse_extraction(&reply)?;
        info!(
            age = ?record.age,
            egfr = ?record.egfr,
            hba1c = ?record.latest_hba1c,
            has_medications = record.has_medications(),
            "Extracted patient record"
        );
        Ok(record)
    }
}

/// Parse a model reply into a record, tolerating code fences and chatter.
pub fn parse_extraction(reply: &str) -> Result<PatientRecord> {
    let json = extract_json_object(reply)
        .ok_or_else(|| AssistantError::Extraction("reply contains no JSON object".to_string()))?;

    let value: Value = serde_json::from_str(json)
        .map_err(|e| AssistantError::Extraction(format!("invalid JSON in reply: {e}")))?;

    let record = PatientRecord::from_value(&value);
    if record.is_empty() {
        return Err(AssistantError::Extraction(
            "reply contained no patient fields".to_string(),
        ));
    }
    Ok(record)
}
