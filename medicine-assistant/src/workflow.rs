use std::any::type_name;
use std::sync::Arc;

use consult_flow::{FlowRunner, Graph, GraphBuilder, Session, Task};

use crate::extraction::PatientExtractor;
use crate::models::{PipelineStage, PipelineState};
use crate::reports::ReportGenerator;
use crate::retrieval::Retriever;
use crate::tasks::*;

pub const CONSULT_WORKFLOW_ID: &str = "consult_workflow";

/// intake -> retrieval -> physician report -> patient report
pub fn build_consult_workflow(
    extractor: Arc<PatientExtractor>,
    retriever: Arc<Retriever>,
    reports: Arc<ReportGenerator>,
) -> Graph {
    let intake_task = Arc::new(PatientIntakeTask::new(extractor));
    let intake_id = intake_task.id().to_string();

    let retrieval_task = Arc::new(ContextRetrievalTask::new(retriever));
    let retrieval_id = retrieval_task.id().to_string();

    let physician_task = Arc::new(PhysicianReportTask::new(Arc::clone(&reports)));
    let physician_id = physician_task.id().to_string();

    let patient_task = Arc::new(PatientReportTask::new(reports));
    let patient_id = patient_task.id().to_string();

    GraphBuilder::new(CONSULT_WORKFLOW_ID)
        .add_task(intake_task)
        .add_task(retrieval_task)
        .add_task(physician_task)
        .add_task(patient_task)
        .add_edge(&intake_id, &retrieval_id)
        .add_edge(&retrieval_id, &physician_id)
        .add_edge(&physician_id, &patient_id)
        .build()
}

/// Session positioned on the intake task with a fresh pipeline state.
pub async fn create_consult_session(state: PipelineState) -> Session {
    let session = Session::start(CONSULT_WORKFLOW_ID, type_name::<PatientIntakeTask>());
    session.context.set(session_keys::SESSION_ID, &session.id).await;
    session.context.set(session_keys::STATE, state).await;
    session
}

pub fn create_flow_runner(graph: Graph) -> FlowRunner {
    FlowRunner::new(Arc::new(graph))
}

pub fn stage_for_task(task_id: &str) -> Option<PipelineStage> {
    [
        (type_name::<PatientIntakeTask>(), PipelineStage::Intake),
        (type_name::<ContextRetrievalTask>(), PipelineStage::Retrieval),
        (type_name::<PhysicianReportTask>(), PipelineStage::PhysicianReport),
        (type_name::<PatientReportTask>(), PipelineStage::PatientReport),
    ]
    .into_iter()
    .find(|(id, _)| *id == task_id)
    .map(|(_, stage)| stage)
}
