use std::sync::Arc;

use async_trait::async_trait;
use consult_flow::{Context, GraphError, NextAction, Result, Task, TaskResult};
use tracing::{error, info};

use super::types::{load_state, save_state, session_id};
use crate::reports::ReportGenerator;

pub struct PhysicianReportTask {
    reports: Arc<ReportGenerator>,
}

impl PhysicianReportTask {
    pub fn new(reports: Arc<ReportGenerator>) -> Self {
        Self { reports }
    }
}

#[async_trait]
impl Task for PhysicianReportTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let session_id = session_id(&context).await;
        let mut state = load_state(&context).await?;

        let record = state
            .patient_record
            .as_ref()
            .ok_or_else(|| GraphError::ContextError("patient record not resolved".to_string()))?;
        let retrieved = state
            .context
            .as_deref()
            .ok_or_else(|| GraphError::ContextError("retrieval context missing".to_string()))?;

        let report = self
            .reports
            .generate_physician_report(retrieved, record)
            .await
            .map_err(|e| {
                error!(session_id = %session_id, "Physician report failed: {}", e);
                GraphError::task_failed(self.id(), e)
            })?;

        info!(session_id = %session_id, report_chars = report.len(), "Physician report generated");

        state.physician_report = Some(report);
        save_state(&context, &state).await;

        Ok(TaskResult::new_with_status(
            None,
            NextAction::Continue,
            Some("Physician report generated".to_string()),
        ))
    }
}
