use std::sync::Arc;

use async_trait::async_trait;
use consult_flow::{Context, GraphError, NextAction, Result, Task, TaskResult};
use tracing::{error, info};

use super::types::{load_state, save_state, session_id};
use crate::reports::ReportGenerator;

/// Rewrites the physician report for the patient. Ends the run.
pub struct PatientReportTask {
    reports: Arc<ReportGenerator>,
}

impl PatientReportTask {
    pub fn new(reports: Arc<ReportGenerator>) -> Self {
        Self { reports }
    }
}

#[async_trait]
impl Task for PatientReportTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let session_id = session_id(&context).await;
        let mut state = load_state(&context).await?;

        let physician_report = state
            .physician_report
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .ok_or_else(|| {
                GraphError::ContextError("physician report missing; refusing to derive patient report".to_string())
            })?;
        let record = state.patient_record.clone().unwrap_or_default();

        let report = self
            .reports
            .generate_patient_report(physician_report, &record)
            .await
            .map_err(|e| {
                error!(session_id = %session_id, "Patient report failed: {}", e);
                GraphError::task_failed(self.id(), e)
            })?;

        info!(session_id = %session_id, report_chars = report.len(), "Patient report generated");

        state.patient_report = Some(report.clone());
        save_state(&context, &state).await;

        Ok(TaskResult::new_with_status(
            Some(report),
            NextAction::End,
            Some("Consult complete".to_string()),
        ))
    }
}
