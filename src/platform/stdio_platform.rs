//! Local REPL `Platform` driving one conversation over stdin/stdout.

use crate::platform::{Platform, StreamingMode};
use crate::shared::errors::OrchestratorError;
use std::io::Write;
use std::sync::Mutex;

pub struct StdioPlatform {
    streaming_mode: StreamingMode,
    out: Mutex<std::io::Stdout>,
}

impl StdioPlatform {
    pub fn new(streaming_mode: StreamingMode) -> Self {
        Self {
            streaming_mode,
            out: Mutex::new(std::io::stdout()),
        }
    }
}

impl Default for StdioPlatform {
    fn default() -> Self {
        Self::new(StreamingMode::Stream)
    }
}

impl Platform for StdioPlatform {
    fn send_message(&self, conversation_id: &str, text: &str) -> Result<(), OrchestratorError> {
        let mut out = self.out.lock().expect("stdio platform mutex poisoned");
        writeln!(out, "[{conversation_id}] {text}")
            .map_err(|e| OrchestratorError::PlatformDelivery(e.to_string()))?;
        out.flush()
            .map_err(|e| OrchestratorError::PlatformDelivery(e.to_string()))
    }

    fn streaming_mode(&self) -> StreamingMode {
        self.streaming_mode
    }

    fn platform_type(&self) -> &str {
        "local"
    }
}
