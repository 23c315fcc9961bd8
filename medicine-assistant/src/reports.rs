use std::sync::Arc;

use tracing::info;

use crate::error::Result;
use crate::llm::CompletionModel;
use crate::patient::{PatientRecord, format_patient_sections};

pub const PHYSICIAN_SYSTEM_PROMPT: &str = "You are a specialist medical assistant focused on diabetes care \
(type 1, type 2 and related metabolic disorders). You help clinicians select antidiabetic medications, \
insulin regimens, dosing adjustments, monitoring plans and patient education.

Write a physician report with these sections:
1. Clinical Summary
2. Assessment (glycemic control, renal function, cardiovascular risk)
3. Medication Recommendations (drug, dose range, titration steps)
4. Contraindications, Interactions and Hypoglycemia Risk
5. Monitoring Plan (glucose, HbA1c, renal function)
6. Supporting Evidence

Base recommendations on the retrieved guideline context and cite it by source and page for each \
recommendation. Tailor dosing to age, weight, renal function, comorbidities and current medications. \
If the context is empty or does not cover a point, say so and give general evidence-based guidance that \
must be verified against authoritative guidelines. Remind the clinician that final decisions rest with a \
qualified healthcare professional.";

pub const PATIENT_SYSTEM_PROMPT: &str = "You are a diabetes educator writing for a patient. \
Rewrite the physician report you are given as a short, friendly explanation in plain language.

Cover: what the results mean, what changes to medicines are suggested and why, how and when to take them, \
warning signs of low or high blood sugar and when to seek help, and simple daily habits that help.

Use short sentences and avoid medical jargon; explain any unavoidable term. Do not add recommendations \
that are not in the physician report. Remind the patient to discuss any change with their doctor before \
acting on it.";

/// Produces the physician report and the patient report derived from it.
pub struct ReportGenerator {
    model: Arc<dyn CompletionModel>,
}

impl ReportGenerator {
    pub fn new(model: Arc<dyn CompletionModel>) -> Self {
        Self { model }
    }

    pub async fn generate_physician_report(
        &self,
        context: &str,
        record: &PatientRecord,
    ) -> Result<String> {
        let context = if context.trim().is_empty() {
            "No guideline passages were retrieved."
        } else {
            context
        };

        let prompt = format!(
            "## Patient Data\n{}\n\n## Retrieved Guideline Context\n{}\n\n\
             Write the physician report for this patient.",
            format_patient_sections(record),
            context
        );

        info!(context_chars = context.len(), "Generating physician report");
        self.model.complete(PHYSICIAN_SYSTEM_PROMPT, &prompt).await
    }

    /// Never consults the document store; works from the physician report only.
    pub async fn generate_patient_report(
        &self,
        physician_report: &str,
        record: &PatientRecord,
    ) -> Result<String> {
        let prompt = format!(
            "## Patient Data\n{}\n\n## Physician Report\n{}\n\n\
             Write the patient-friendly report.",
            format_patient_sections(record),
            physician_report
        );

        info!(report_chars = physician_report.len(), "Generating patient report");
        self.model.complete(PATIENT_SYSTEM_PROMPT, &prompt).await
    }
}
