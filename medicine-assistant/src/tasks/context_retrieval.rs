use std::sync::Arc;

use async_trait::async_trait;
use consult_flow::{Context, GraphError, NextAction, Result, Task, TaskResult};
use tracing::{error, info};

use super::types::{load_state, save_state, session_id};
use crate::retrieval::Retriever;

/// Looks up guideline passages for the resolved patient record.
pub struct ContextRetrievalTask {
    retriever: Arc<Retriever>,
}

impl ContextRetrievalTask {
    pub fn new(retriever: Arc<Retriever>) -> Self {
        Self { retriever }
    }
}

#[async_trait]
impl Task for ContextRetrievalTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let session_id = session_id(&context).await;
        let mut state = load_state(&context).await?;

        let record = state
            .patient_record
            .as_ref()
            .ok_or_else(|| GraphError::ContextError("patient record not resolved".to_string()))?;

        let retrieved = self
            .retriever
            .retrieve(record, &state.message)
            .await
            .map_err(|e| {
                error!(session_id = %session_id, "Context retrieval failed: {}", e);
                GraphError::task_failed(self.id(), e)
            })?;

        info!(
            session_id = %session_id,
            task_id = %self.id(),
            chunks = retrieved.chunks.len(),
            "Context retrieved"
        );

        state.context = Some(retrieved.formatted);
        save_state(&context, &state).await;

        Ok(TaskResult::new_with_status(
            None,
            NextAction::Continue,
            Some(format!("Retrieved {} passages", retrieved.chunks.len())),
        ))
    }
}
