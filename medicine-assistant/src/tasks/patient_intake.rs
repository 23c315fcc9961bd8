use std::sync::Arc;

use async_trait::async_trait;
use consult_flow::{Context, NextAction, Result, Task, TaskResult};
use tracing::{info, warn};

use super::types::{load_state, save_state, session_id};
use crate::extraction::PatientExtractor;
use crate::patient::{PatientInput, PatientRecord};

/// Resolves the supplied patient input (or the message) into a record.
pub struct PatientIntakeTask {
    extractor: Arc<PatientExtractor>,
}

impl PatientIntakeTask {
    pub fn new(extractor: Arc<PatientExtractor>) -> Self {
        Self { extractor }
    }

    async fn extract_or_degrade(&self, text: &str) -> PatientRecord {
        match self.extractor.extract(text).await {
            Ok(record) => record,
            Err(e) => {
                warn!("Patient extraction failed, keeping raw text as notes: {}", e);
                PatientRecord::from_notes(text)
            }
        }
    }
}

#[async_trait]
impl Task for PatientIntakeTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let session_id = session_id(&context).await;
        let mut state = load_state(&context).await?;

        info!(session_id = %session_id, task_id = %self.id(), "Starting patient intake");

        let record = match state.patient_input.as_ref() {
            Some(PatientInput::Structured(map)) => {
                let record = PatientRecord::from_map(map);
                if record.is_empty() {
                    self.extract_or_degrade(&state.message).await
                } else {
                    record
                }
            }
            Some(PatientInput::Raw(text)) if !text.trim().is_empty() => {
                self.extract_or_degrade(text).await
            }
            _ => self.extract_or_degrade(&state.message).await,
        };

        info!(
            session_id = %session_id,
            age = ?record.age,
            egfr = ?record.egfr,
            hba1c = ?record.latest_hba1c,
            "Patient record resolved"
        );

        state.patient_record = Some(record);
        save_state(&context, &state).await;

        Ok(TaskResult::new_with_status(
            None,
            NextAction::Continue,
            Some("Patient record resolved".to_string()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractionMode;
    use crate::models::PipelineState;
    use crate::tasks::session_keys;
    use crate::testing::ScriptedModel;
    use serde_json::json;

    async fn run_intake(model: Arc<ScriptedModel>, state: PipelineState) -> PatientRecord {
        let task = PatientIntakeTask::new(Arc::new(PatientExtractor::new(model, ExtractionMode::Model)));
        let context = Context::new();
        context.set(session_keys::STATE, &state).await;

        task.run(context.clone()).await.unwrap();

        load_state(&context).await.unwrap().patient_record.unwrap()
    }

    #[tokio::test]
    async fn structured_input_is_used_verbatim() {
        let model = ScriptedModel::replying("{\"age\": 99}");
        let serde_json::Value::Object(map) = json!({"age": 58, "egfr": "72"}) else {
            unreachable!()
        };
        let state = PipelineState::new("review please", Some(PatientInput::Structured(map)));

        let record = run_intake(model.clone(), state).await;

        assert_eq!(record.age, Some(58));
        assert_eq!(record.egfr, Some(72.0));
        assert!(model.calls().is_empty());
    }

    #[tokio::test]
    async fn raw_input_is_extracted() {
        let model = ScriptedModel::replying("{\"age\": 47}");
        let state = PipelineState::new("review", Some(PatientInput::Raw("47 y/o".into())));

        let record = run_intake(model.clone(), state).await;

        assert_eq!(record.age, Some(47));
        assert_eq!(model.calls()[0].1, "47 y/o");
    }

    #[tokio::test]
    async fn missing_input_extracts_from_message() {
        let model = ScriptedModel::replying("{\"latest_hba1c\": 8.4}");
        let state = PipelineState::new("HbA1c 8.4, what now?", None);

        let record = run_intake(model.clone(), state).await;

        assert_eq!(record.latest_hba1c, Some(8.4));
        assert_eq!(model.calls()[0].1, "HbA1c 8.4, what now?");
    }

    #[tokio::test]
    async fn extraction_failure_degrades_to_notes() {
        let model = ScriptedModel::replying("I am not sure what you mean.");
        let state = PipelineState::new("tired all the time", None);

        let record = run_intake(model, state).await;

        assert_eq!(record.symptoms_notes.as_deref(), Some("tired all the time"));
        assert_eq!(record.age, None);
    }
}
