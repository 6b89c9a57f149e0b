pub mod invocation;
pub mod subprocess;

use crate::shared::errors::OrchestratorError;
use crate::workflow::model::Provider;
use std::path::Path;

/// One event emitted by an assistant while executing a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssistantEvent {
    Assistant { content: String },
    Tool { tool_name: String, tool_input: Option<serde_json::Value> },
    Result { session_id: Option<String> },
}

/// The Assistant interface consumed by the step/loop/parallel executors.
/// Implementations return an iterator so callers can process chunks as
/// they arrive instead of waiting for the whole query to finish.
pub trait Assistant: Send + Sync {
    fn send_query(
        &self,
        prompt: &str,
        cwd: &Path,
        resume_session_id: Option<&str>,
    ) -> Result<Box<dyn Iterator<Item = AssistantEvent> + Send>, OrchestratorError>;
}

/// Picks the concrete assistant binary behind the `Provider` the workflow
/// declared — providers are selected via a factory.
pub fn binary_for_provider(provider: Provider) -> &'static str {
    match provider {
        Provider::Claude => "claude",
        Provider::Codex => "codex",
    }
}
