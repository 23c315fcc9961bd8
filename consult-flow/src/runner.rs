//! FlowRunner – drives a session through a graph until it completes.
//!
//! Each step is awaited on its own and raced against the run's deadline and
//! cancellation token, so an outstanding network call inside a task is dropped
//! as soon as either fires. Steps never overlap: a task only starts once the
//! previous one has returned.

use std::future::{self, Future};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::{
    error::{GraphError, Result},
    graph::{ExecutionResult, ExecutionStatus, Graph},
    session::Session,
};

/// Cooperative cancellation shared between a caller and a running flow.
#[derive(Clone, Debug)]
pub struct CancellationToken {
    state: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }

    pub fn cancel(&self) {
        self.state.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.state.borrow()
    }

    /// Resolves once `cancel` has been called on any clone.
    pub async fn cancelled(&self) {
        let mut rx = self.state.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Limits applied to a whole run.
#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    pub deadline: Option<Instant>,
    pub cancellation: Option<CancellationToken>,
}

impl RunOptions {
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    fn check(&self) -> Result<()> {
        if self
            .cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
        {
            return Err(GraphError::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(GraphError::DeadlineExceeded);
        }
        Ok(())
    }
}

/// Executes a graph step by step until a task ends the run.
#[derive(Clone)]
pub struct FlowRunner {
    graph: Arc<Graph>,
}

impl FlowRunner {
    pub fn new(graph: Arc<Graph>) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }

    /// Run `session` to completion. On error the session stays positioned on
    /// the task that failed.
    pub async fn run(&self, session: &mut Session, options: &RunOptions) -> Result<ExecutionResult> {
        loop {
            options.check()?;

            let task_id = session.current_task_id.clone();
            let step = guarded(self.graph.execute_session(session), options).await;
            let result = match step {
                Ok(result) => result,
                Err(e) => {
                    warn!(session_id = %session.id, task_id = %task_id, error = %e, "Flow step failed");
                    return Err(e);
                }
            };

            if result.status == ExecutionStatus::Completed {
                info!(session_id = %session.id, graph = %self.graph.id, "Flow completed");
                return Ok(result);
            }
        }
    }
}

async fn guarded<F>(step: F, options: &RunOptions) -> Result<ExecutionResult>
where
    F: Future<Output = Result<ExecutionResult>>,
{
    tokio::select! {
        result = step => result,
        _ = wait_for_cancellation(options.cancellation.as_ref()) => Err(GraphError::Cancelled),
        _ = wait_for_deadline(options.deadline) => Err(GraphError::DeadlineExceeded),
    }
}

async fn wait_for_cancellation(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => future::pending().await,
    }
}

async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Context, GraphBuilder, NextAction, Task, TaskResult};
    use async_trait::async_trait;
    use std::time::Duration;

    struct Step {
        id: &'static str,
        next: NextAction,
        delay: Duration,
    }

    #[async_trait]
    impl Task for Step {
        fn id(&self) -> &str {
            self.id
        }

        async fn run(&self, context: Context) -> Result<TaskResult> {
            tokio::time::sleep(self.delay).await;
            let mut seen: Vec<String> = context.get("seen").await.unwrap_or_default();
            seen.push(self.id.to_string());
            context.set("seen", seen).await;
            Ok(TaskResult::new(Some(self.id.to_string()), self.next))
        }
    }

    fn runner(delay: Duration) -> FlowRunner {
        let graph = GraphBuilder::new("pipeline")
            .add_task(Arc::new(Step {
                id: "a",
                next: NextAction::Continue,
                delay: Duration::ZERO,
            }))
            .add_task(Arc::new(Step {
                id: "b",
                next: NextAction::Continue,
                delay,
            }))
            .add_task(Arc::new(Step {
                id: "c",
                next: NextAction::End,
                delay: Duration::ZERO,
            }))
            .add_edge("a", "b")
            .add_edge("b", "c")
            .build();
        FlowRunner::new(Arc::new(graph))
    }

    #[tokio::test]
    async fn runs_every_step_in_order() {
        let runner = runner(Duration::ZERO);
        let mut session = Session::new_from_task("s".to_string(), "a");

        let result = runner.run(&mut session, &RunOptions::default()).await.unwrap();

        assert_eq!(result.status, ExecutionStatus::Completed);
        assert_eq!(result.response.as_deref(), Some("c"));
        let seen: Vec<String> = session.context.get("seen").await.unwrap();
        assert_eq!(seen, vec!["a", "b", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_interrupts_a_slow_step() {
        let runner = runner(Duration::from_secs(60));
        let mut session = Session::new_from_task("s".to_string(), "a");
        let options = RunOptions::default().with_deadline(Instant::now() + Duration::from_secs(1));

        let err = runner.run(&mut session, &options).await.unwrap_err();

        assert!(matches!(err, GraphError::DeadlineExceeded));
        assert_eq!(session.current_task_id, "b");
        let seen: Vec<String> = session.context.get("seen").await.unwrap();
        assert_eq!(seen, vec!["a"]);
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_first_step() {
        let runner = runner(Duration::ZERO);
        let mut session = Session::new_from_task("s".to_string(), "a");
        let token = CancellationToken::new();
        token.cancel();

        let err = runner
            .run(&mut session, &RunOptions::default().with_cancellation(token))
            .await
            .unwrap_err();

        assert!(matches!(err, GraphError::Cancelled));
        assert!(session.context.get::<Vec<String>>("seen").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_step_drops_it() {
        let runner = runner(Duration::from_secs(60));
        let mut session = Session::new_from_task("s".to_string(), "a");
        let token = CancellationToken::new();
        let options = RunOptions::default().with_cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            token.cancel();
        });

        let err = runner.run(&mut session, &options).await.unwrap_err();
        canceller.await.unwrap();

        assert!(matches!(err, GraphError::Cancelled));
        assert_eq!(session.current_task_id, "b");
    }
}
