//! The consult orchestrator.

use std::sync::Arc;

use chrono::Utc;
use consult_flow::{FlowRunner, GraphError, RunOptions, Session};
use tracing::{error, info};

use crate::config::Settings;
use crate::embeddings::OpenRouterEmbedder;
use crate::error::{AssistantError, Result};
use crate::extraction::PatientExtractor;
use crate::llm::{CompletionModel, OpenRouterCompletion};
use crate::models::{
    ConsultFailure, ConsultOutcome, ConsultReport, FailureKind, PipelineStage, PipelineState,
};
use crate::patient::PatientInput;
use crate::reports::ReportGenerator;
use crate::retrieval::Retriever;
use crate::store::{DocumentStore, QdrantStore};
use crate::tasks::types::load_state;
use crate::workflow::{build_consult_workflow, create_consult_session, create_flow_runner, stage_for_task};

/// Runs consults: intake, retrieval, physician report, patient report.
///
/// Holds no per-consult state, so one instance can be shared behind an `Arc`
/// by concurrent callers.
pub struct MedicineAssistant {
    runner: FlowRunner,
    model: Arc<dyn CompletionModel>,
    store: Arc<dyn DocumentStore>,
}

impl MedicineAssistant {
    pub fn new(
        model: Arc<dyn CompletionModel>,
        store: Arc<dyn DocumentStore>,
        settings: &Settings,
    ) -> Self {
        let extractor = Arc::new(PatientExtractor::new(
            Arc::clone(&model),
            settings.extraction_mode,
        ));
        let retriever = Arc::new(Retriever::new(Arc::clone(&store), settings.top_k_results));
        let reports = Arc::new(ReportGenerator::new(Arc::clone(&model)));

        let runner = create_flow_runner(build_consult_workflow(extractor, retriever, reports));

        Self {
            runner,
            model,
            store,
        }
    }

    /// Production wiring: OpenRouter completion and embeddings, Qdrant store.
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        settings.validate()?;
        let model: Arc<dyn CompletionModel> = Arc::new(OpenRouterCompletion::from_settings(settings)?);
        let store = open_store(settings).await?;
        Ok(Self::new(model, store, settings))
    }

    pub fn model(&self) -> Arc<dyn CompletionModel> {
        Arc::clone(&self.model)
    }

    pub fn store(&self) -> Arc<dyn DocumentStore> {
        Arc::clone(&self.store)
    }

    /// Run one consult. Expected failures come back as [`ConsultOutcome::Failed`].
    pub async fn run(
        &self,
        message: &str,
        patient_input: Option<PatientInput>,
        options: RunOptions,
    ) -> ConsultOutcome {
        let mut session = create_consult_session(PipelineState::new(message, patient_input)).await;

        info!(session_id = %session.id, "Starting consult");

        match self.runner.run(&mut session, &options).await {
            Ok(_) => completed(&session).await,
            Err(e) => failed(&session, e).await,
        }
    }
}

/// Connect to the configured Qdrant collection with OpenRouter embeddings.
pub async fn open_store(settings: &Settings) -> Result<Arc<dyn DocumentStore>> {
    let embedder = Arc::new(OpenRouterEmbedder::from_settings(settings));
    let store = QdrantStore::connect(
        &settings.qdrant_url,
        settings.qdrant_api_key.clone(),
        &settings.collection_name,
        embedder,
    )
    .await?;
    Ok(Arc::new(store))
}

async fn completed(session: &Session) -> ConsultOutcome {
    let state = match load_state(&session.context).await {
        Ok(state) => state,
        Err(e) => return internal_failure(PipelineStage::PatientReport, e.to_string(), None),
    };

    match state {
        PipelineState {
            patient_record: Some(patient_record),
            context: Some(context),
            physician_report: Some(physician_report),
            patient_report: Some(patient_report),
            ..
        } => {
            info!(session_id = %session.id, "Consult completed");
            ConsultOutcome::Completed(ConsultReport {
                physician_report,
                patient_report,
                patient_record,
                context,
                generated_at: Utc::now(),
            })
        }
        state => internal_failure(
            PipelineStage::PatientReport,
            "consult finished without both reports".to_string(),
            state.patient_record,
        ),
    }
}

async fn failed(session: &Session, err: GraphError) -> ConsultOutcome {
    let stage = stage_for_task(&session.current_task_id).unwrap_or(PipelineStage::Intake);

    let (kind, message) = match err.source_as::<AssistantError>() {
        Some(source) => (FailureKind::from(source), source.to_string()),
        None => match &err {
            GraphError::Cancelled => (FailureKind::Cancelled, err.to_string()),
            GraphError::DeadlineExceeded => (FailureKind::DeadlineExceeded, err.to_string()),
            _ => (FailureKind::Internal, err.to_string()),
        },
    };

    let patient_record = load_state(&session.context)
        .await
        .ok()
        .and_then(|state| state.patient_record);

    error!(
        session_id = %session.id,
        stage = %stage,
        kind = ?kind,
        "Consult failed: {}",
        message
    );

    ConsultOutcome::Failed(ConsultFailure {
        stage,
        kind,
        message,
        patient_record,
    })
}

fn internal_failure(
    stage: PipelineStage,
    message: String,
    patient_record: Option<crate::patient::PatientRecord>,
) -> ConsultOutcome {
    error!(stage = %stage, "Consult failed: {}", message);
    ConsultOutcome::Failed(ConsultFailure {
        stage,
        kind: FailureKind::Internal,
        message,
        patient_record,
    })
}
