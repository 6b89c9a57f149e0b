pub mod stdio_platform;
pub mod test_platform;

use crate::shared::errors::OrchestratorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamingMode {
    Stream,
    Batch,
}

/// The interface consumed by the core dispatcher. Concrete adapters
/// (real Slack/GitHub/Telegram bots) are out of scope; this crate ships
/// `TestPlatform` and `StdioPlatform` only, modeled as one struct per
/// channel implementing this small interface.
pub trait Platform: Send + Sync {
    fn send_message(&self, conversation_id: &str, text: &str) -> Result<(), OrchestratorError>;

    fn ensure_thread(&self, conversation_id: &str) -> Result<String, OrchestratorError> {
        Ok(conversation_id.to_string())
    }

    fn streaming_mode(&self) -> StreamingMode;

    /// `github`/`telegram`/`slack`/`discord`/`test` are the recognized
    /// values; `github` has semantic meaning to the step/loop/artifact
    /// executors.
    fn platform_type(&self) -> &str;
}
