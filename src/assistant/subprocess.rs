//! Streaming subprocess `Assistant`. Spawns the provider CLI and decodes
//! its stdout one line at a time, bridging to the driving thread over an
//! `mpsc::Receiver` (which is itself an `Iterator`). Uses a
//! spawn/poll/timeout structure, but reading is genuinely line-by-line
//! instead of `read_to_string`-to-completion, with lenient multi-shape
//! field probing for decoding each line.

use crate::assistant::invocation::build_invocation;
use crate::assistant::{Assistant, AssistantEvent};
use crate::shared::errors::OrchestratorError;
use crate::workflow::model::Provider;
use serde_json::Value;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

pub struct SubprocessAssistant {
    provider: Provider,
    model: Option<String>,
    binary: String,
    timeout: Duration,
}

impl SubprocessAssistant {
    pub fn new(provider: Provider, model: Option<String>) -> Self {
        Self {
            binary: crate::assistant::binary_for_provider(provider).to_string(),
            provider,
            model,
            timeout: Duration::from_secs(30 * 60),
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Assistant for SubprocessAssistant {
    fn send_query(
        &self,
        prompt: &str,
        cwd: &Path,
        resume_session_id: Option<&str>,
    ) -> Result<Box<dyn Iterator<Item = AssistantEvent> + Send>, OrchestratorError> {
        let spec = build_invocation(
            self.provider,
            &self.binary,
            self.model.as_deref(),
            prompt,
            resume_session_id,
        );

        let mut command = Command::new(&spec.binary);
        command
            .current_dir(cwd)
            .args(&spec.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(OrchestratorError::Assistant(format!(
                    "provider binary `{}` not found",
                    spec.binary
                )))
            }
            Err(err) => {
                return Err(OrchestratorError::io(cwd.display().to_string(), err));
            }
        };

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| OrchestratorError::Assistant("missing stdout pipe".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| OrchestratorError::Assistant("missing stderr pipe".to_string()))?;

        let (tx, rx) = mpsc::channel::<AssistantEvent>();
        let timeout = self.timeout;
        let cwd_owned: PathBuf = cwd.to_path_buf();

        thread::spawn(move || {
            let stderr_drain = thread::spawn(move || {
                let mut buf = String::new();
                let mut reader = BufReader::new(stderr);
                use std::io::Read;
                let _ = reader.read_to_string(&mut buf);
                buf
            });

            let reader = BufReader::new(stdout);
            for line in reader.lines() {
                let Ok(line) = line else { break };
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if let Some(event) = decode_line(trimmed) {
                    if tx.send(event).is_err() {
                        break;
                    }
                }
            }

            let start = std::time::Instant::now();
            loop {
                match child.try_wait() {
                    Ok(Some(_)) => break,
                    Ok(None) => {
                        if start.elapsed() > timeout {
                            let _ = child.kill();
                            let _ = child.wait();
                            tracing::warn!(cwd = %cwd_owned.display(), "assistant process timed out");
                            break;
                        }
                        thread::sleep(Duration::from_millis(10));
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "failed to poll assistant process");
                        break;
                    }
                }
            }
            let stderr_text = stderr_drain.join().unwrap_or_default();
            if !stderr_text.trim().is_empty() {
                tracing::debug!(stderr = %stderr_text, "assistant stderr output");
            }
        });

        Ok(Box::new(rx.into_iter()))
    }
}

/// Decodes one JSONL line into an `AssistantEvent`, probing a few
/// plausible field shapes, generalized here to per-line streaming.
fn decode_line(line: &str) -> Option<AssistantEvent> {
    let value: Value = serde_json::from_str(line).ok()?;
    let event_type = value.get("type").and_then(Value::as_str)?;

    match event_type {
        "assistant" | "text" => extract_text(&value).map(|content| AssistantEvent::Assistant { content }),
        "tool" | "tool_use" => {
            let tool_name = value
                .get("tool_name")
                .or_else(|| value.get("toolName"))
                .or_else(|| value.get("name"))
                .and_then(Value::as_str)?
                .to_string();
            let tool_input = value
                .get("tool_input")
                .or_else(|| value.get("toolInput"))
                .or_else(|| value.get("input"))
                .cloned();
            Some(AssistantEvent::Tool {
                tool_name,
                tool_input,
            })
        }
        "result" => {
            let session_id = value
                .get("session_id")
                .or_else(|| value.get("sessionId"))
                .and_then(Value::as_str)
                .map(|s| s.to_string());
            Some(AssistantEvent::Result { session_id })
        }
        _ => None,
    }
}

fn extract_text(value: &Value) -> Option<String> {
    if let Some(text) = value.get("content").and_then(Value::as_str) {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }
    if let Some(message) = value.get("message") {
        if let Some(content) = message.get("content") {
            if let Some(array) = content.as_array() {
                let mut lines = Vec::new();
                for entry in array {
                    if let Some(text) = entry.get("text").and_then(Value::as_str) {
                        let trimmed = text.trim();
                        if !trimmed.is_empty() {
                            lines.push(trimmed.to_string());
                        }
                    }
                }
                if !lines.is_empty() {
                    return Some(lines.join("\n"));
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_assistant_chunk_from_plain_content_field() {
        let event = decode_line(r#"{"type":"assistant","content":"hello"}"#).expect("decoded");
        assert_eq!(event, AssistantEvent::Assistant { content: "hello".to_string() });
    }

    #[test]
    fn decodes_tool_event() {
        let event = decode_line(r#"{"type":"tool","tool_name":"bash","tool_input":{"cmd":"ls"}}"#)
            .expect("decoded");
        match event {
            AssistantEvent::Tool { tool_name, tool_input } => {
                assert_eq!(tool_name, "bash");
                assert_eq!(tool_input.unwrap()["cmd"], "ls");
            }
            _ => panic!("expected tool event"),
        }
    }

    #[test]
    fn decodes_result_with_session_id() {
        let event = decode_line(r#"{"type":"result","session_id":"sess-1"}"#).expect("decoded");
        assert_eq!(
            event,
            AssistantEvent::Result {
                session_id: Some("sess-1".to_string())
            }
        );
    }

    #[test]
    fn unknown_event_types_are_skipped() {
        assert!(decode_line(r#"{"type":"system","info":"booting"}"#).is_none());
    }
}
