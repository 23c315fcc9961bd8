use thiserror::Error;

/// Boxed error raised inside a task, kept intact so callers can downcast it.
pub type TaskSource = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Task {task_id} failed: {source}")]
    TaskFailed {
        task_id: String,
        #[source]
        source: TaskSource,
    },

    #[error("Context error: {0}")]
    ContextError(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Task {0} continued but has no outgoing edge")]
    NoOutgoingEdge(String),

    #[error("Execution cancelled")]
    Cancelled,

    #[error("Execution deadline exceeded")]
    DeadlineExceeded,
}

impl GraphError {
    /// Wrap a typed task error, keeping it reachable through `source_as`.
    pub fn task_failed(
        task_id: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        GraphError::TaskFailed {
            task_id: task_id.into(),
            source: Box::new(source),
        }
    }

    /// Downcast the wrapped task error, if this is a `TaskFailed`.
    pub fn source_as<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            GraphError::TaskFailed { source, .. } => source.downcast_ref::<E>(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("store is empty")]
    struct EmptyStore;

    #[test]
    fn task_failed_keeps_typed_source() {
        let err = GraphError::task_failed("retrieval", EmptyStore);
        assert!(err.source_as::<EmptyStore>().is_some());
        assert_eq!(err.to_string(), "Task retrieval failed: store is empty");
    }

    #[test]
    fn other_variants_have_no_source() {
        let err = GraphError::Cancelled;
        assert!(err.source_as::<EmptyStore>().is_none());
    }
}
