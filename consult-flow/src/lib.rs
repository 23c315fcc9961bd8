pub mod context;
pub mod error;
pub mod graph;
pub mod runner;
pub mod session;
pub mod task;

pub use context::Context;
pub use error::{GraphError, Result};
pub use graph::{ExecutionResult, ExecutionStatus, Graph, GraphBuilder};
pub use runner::{CancellationToken, FlowRunner, RunOptions};
pub use session::Session;
pub use task::{NextAction, Task, TaskResult};
