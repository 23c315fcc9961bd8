use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{context::Context, error::Result};

/// What a task hands back to the graph after one step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// Text produced by the task, if any
    pub response: Option<String>,
    /// Whether the run moves on or stops here
    pub next_action: NextAction,
    /// Human-readable progress note
    pub status_message: Option<String>,
    /// Filled in by the graph with the id of the task that produced this result
    #[serde(default)]
    pub task_id: String,
}

impl TaskResult {
    pub fn new(response: Option<String>, next_action: NextAction) -> Self {
        Self {
            response,
            next_action,
            status_message: None,
            task_id: String::new(),
        }
    }

    pub fn new_with_status(
        response: Option<String>,
        next_action: NextAction,
        status_message: Option<String>,
    ) -> Self {
        Self {
            response,
            next_action,
            status_message,
            task_id: String::new(),
        }
    }
}

/// Defines what should happen after a task completes.
///
/// Graphs are linear: a task either hands over to the next one along its
/// outgoing edge or ends the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NextAction {
    /// Hand over along the outgoing edge
    Continue,
    /// Stop the run; this result is final
    End,
}

/// One step of a consult graph.
#[async_trait]
pub trait Task: Send + Sync {
    /// Key the graph stores this task under. Defaults to the type name.
    fn id(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Run the step against the shared run context.
    async fn run(&self, context: Context) -> Result<TaskResult>;
}
