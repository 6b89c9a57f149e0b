//! In-memory `Platform` used by this crate's own test suite to assert on
//! sent messages and streaming mode, backed by hand-written fakes rather
//! than a mocking framework.

use crate::platform::{Platform, StreamingMode};
use crate::shared::errors::OrchestratorError;
use std::sync::Mutex;

pub struct TestPlatform {
    sent: Mutex<Vec<(String, String)>>,
    streaming_mode: StreamingMode,
    platform_type: String,
    fail_next_sends: Mutex<usize>,
}

impl TestPlatform {
    pub fn new(streaming_mode: StreamingMode, platform_type: impl Into<String>) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            streaming_mode,
            platform_type: platform_type.into(),
            fail_next_sends: Mutex::new(0),
        }
    }

    pub fn streaming() -> Self {
        Self::new(StreamingMode::Stream, "test")
    }

    pub fn batch() -> Self {
        Self::new(StreamingMode::Batch, "test")
    }

    pub fn sent_messages(&self) -> Vec<(String, String)> {
        self.sent.lock().expect("test platform mutex poisoned").clone()
    }

    /// Causes the next `n` sends to fail, simulating transient delivery
    /// drops for the error-taxonomy tests.
    pub fn fail_next(&self, n: usize) {
        *self.fail_next_sends.lock().expect("mutex poisoned") = n;
    }
}

impl Platform for TestPlatform {
    fn send_message(&self, conversation_id: &str, text: &str) -> Result<(), OrchestratorError> {
        {
            let mut remaining = self.fail_next_sends.lock().expect("mutex poisoned");
            if *remaining > 0 {
                *remaining -= 1;
                return Err(OrchestratorError::PlatformDelivery(
                    "simulated transient failure".to_string(),
                ));
            }
        }
        self.sent
            .lock()
            .expect("test platform mutex poisoned")
            .push((conversation_id.to_string(), text.to_string()));
        Ok(())
    }

    fn streaming_mode(&self) -> StreamingMode {
        self.streaming_mode
    }

    fn platform_type(&self) -> &str {
        &self.platform_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_sent_messages() {
        let platform = TestPlatform::streaming();
        platform.send_message("conv-1", "hello").expect("send");
        assert_eq!(
            platform.sent_messages(),
            vec![("conv-1".to_string(), "hello".to_string())]
        );
    }

    #[test]
    fn fail_next_simulates_transient_drops() {
        let platform = TestPlatform::streaming();
        platform.fail_next(1);
        assert!(platform.send_message("conv-1", "drop me").is_err());
        platform.send_message("conv-1", "through").expect("send");
        assert_eq!(platform.sent_messages().len(), 1);
    }
}
