use consult_flow::{Context, GraphError, Result};

use crate::models::PipelineState;

pub mod session_keys {
    pub const STATE: &str = "consult_state";
    pub const SESSION_ID: &str = "session_id";
}

pub async fn load_state(context: &Context) -> Result<PipelineState> {
    context
        .get(session_keys::STATE)
        .await
        .ok_or_else(|| GraphError::ContextError("consult state not found in context".to_string()))
}

pub async fn save_state(context: &Context, state: &PipelineState) {
    context.set(session_keys::STATE, state).await;
}

pub async fn session_id(context: &Context) -> String {
    context
        .get::<String>(session_keys::SESSION_ID)
        .await
        .unwrap_or_else(|| "unknown".to_string())
}
