// Consult pipeline tasks, in execution order
pub mod patient_intake;
pub mod context_retrieval;
pub mod physician_report;
pub mod patient_report;

pub mod types;

pub use context_retrieval::ContextRetrievalTask;
pub use patient_intake::PatientIntakeTask;
pub use patient_report::PatientReportTask;
pub use physician_report::PhysicianReportTask;

pub use types::session_keys;
