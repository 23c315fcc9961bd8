use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Context;

/// One execution of a graph: where it is and what it has accumulated so far.
///
/// Sessions live for a single run and are never persisted; the context is
/// skipped when a session is serialized for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub graph_id: String,
    pub current_task_id: String,
    pub status_message: Option<String>,
    #[serde(skip)]
    pub context: Context,
}

impl Session {
    pub fn new_from_task(sid: String, task_name: &str) -> Self {
        Self {
            id: sid,
            graph_id: "default".to_string(),
            current_task_id: task_name.to_string(),
            status_message: None,
            context: Context::new(),
        }
    }

    /// Fresh session with a random id, positioned on `task_name`.
    pub fn start(graph_id: impl Into<String>, task_name: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            graph_id: graph_id.into(),
            current_task_id: task_name.to_string(),
            status_message: None,
            context: Context::new(),
        }
    }
}
