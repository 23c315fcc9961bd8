use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    context::Context,
    error::{GraphError, Result},
    session::Session,
    task::{NextAction, Task, TaskResult},
};

/// Edge between tasks in the graph
#[derive(Debug, Clone)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

/// A linear graph of tasks: every task has at most one outgoing edge.
pub struct Graph {
    pub id: String,
    tasks: DashMap<String, Arc<dyn Task>>,
    edges: Vec<Edge>,
    start_task_id: Option<String>,
}

impl Graph {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tasks: DashMap::new(),
            edges: Vec::new(),
            start_task_id: None,
        }
    }

    /// Add a task to the graph; the first task added becomes the start task
    pub fn add_task(&mut self, task: Arc<dyn Task>) -> &mut Self {
        let task_id = task.id().to_string();
        if self.tasks.is_empty() {
            self.start_task_id = Some(task_id.clone());
        }
        self.tasks.insert(task_id, task);
        self
    }

    /// Add an edge between tasks. A second edge from the same task replaces the first.
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) -> &mut Self {
        let from = from.into();
        let to = to.into();
        if let Some(existing) = self.edges.iter_mut().find(|edge| edge.from == from) {
            warn!(graph = %self.id, from = %from, replaced = %existing.to, to = %to, "Replacing outgoing edge");
            existing.to = to;
        } else {
            self.edges.push(Edge { from, to });
        }
        self
    }

    /// Execute the session's current task and move the session along its edge.
    pub async fn execute_session(&self, session: &mut Session) -> Result<ExecutionResult> {
        let result = self
            .execute_single_task(&session.current_task_id, session.context.clone())
            .await?;

        session.status_message = result.status_message.clone();

        match result.next_action {
            NextAction::Continue => {
                let next_task_id = self
                    .find_next_task(&result.task_id)
                    .ok_or_else(|| GraphError::NoOutgoingEdge(result.task_id.clone()))?;
                debug!(from = %result.task_id, to = %next_task_id, "Advancing session");
                session.current_task_id = next_task_id;
                Ok(ExecutionResult {
                    response: result.response,
                    status: ExecutionStatus::Advanced,
                })
            }
            NextAction::End => {
                session.current_task_id = result.task_id.clone();
                Ok(ExecutionResult {
                    response: result.response,
                    status: ExecutionStatus::Completed,
                })
            }
        }
    }

    async fn execute_single_task(&self, task_id: &str, context: Context) -> Result<TaskResult> {
        let task = self
            .get_task(task_id)
            .ok_or_else(|| GraphError::TaskNotFound(task_id.to_string()))?;

        let mut result = task.run(context).await?;
        result.task_id = task_id.to_string();
        Ok(result)
    }

    pub fn find_next_task(&self, current_task_id: &str) -> Option<String> {
        self.edges
            .iter()
            .find(|edge| edge.from == current_task_id)
            .map(|edge| edge.to.clone())
    }

    pub fn start_task_id(&self) -> Option<String> {
        self.start_task_id.clone()
    }

    pub fn get_task(&self, task_id: &str) -> Option<Arc<dyn Task>> {
        self.tasks.get(task_id).map(|entry| entry.clone())
    }

    /// Task ids in execution order, following edges from the start task.
    pub fn task_order(&self) -> Vec<String> {
        let mut order = Vec::new();
        let mut current = self.start_task_id.clone();
        while let Some(task_id) = current {
            if order.contains(&task_id) {
                break;
            }
            current = self.find_next_task(&task_id);
            order.push(task_id);
        }
        order
    }
}

/// Builder for creating graphs
pub struct GraphBuilder {
    graph: Graph,
}

impl GraphBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            graph: Graph::new(id),
        }
    }

    pub fn add_task(mut self, task: Arc<dyn Task>) -> Self {
        self.graph.add_task(task);
        self
    }

    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.graph.add_edge(from, to);
        self
    }

    pub fn build(self) -> Graph {
        self.graph
    }
}

/// Outcome of executing one step
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub response: Option<String>,
    pub status: ExecutionStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// The session moved on to the next task
    Advanced,
    /// The graph finished
    Completed,
}
