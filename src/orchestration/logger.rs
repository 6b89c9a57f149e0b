//! Structured JSONL Logger. Uses an append-only-file idiom
//! (`OpenOptions::append(true)`, create-parent-on-demand), generalized to
//! one JSON object per line and a "warn once per process" failure policy
//! via `OnceLock`/`AtomicBool`.

use serde::Serialize;
use serde_json::{Map, Value};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

fn warned_once() -> &'static AtomicBool {
    static WARNED: OnceLock<AtomicBool> = OnceLock::new();
    WARNED.get_or_init(|| AtomicBool::new(false))
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
#[serde(rename_all = "snake_case")]
pub enum LogEvent {
    WorkflowStart { workflow_name: String, content: String },
    WorkflowComplete,
    WorkflowError { error: String },
    StepStart { step: String, step_index: String },
    StepComplete { step: String, step_index: String },
    StepError { step: String, step_index: String, error: String },
    Assistant { content: String },
    Tool { tool_name: String, tool_input: Option<Value> },
    ParallelBlockStart { block_index: u32, steps: Vec<String> },
    ParallelBlockComplete { block_index: u32, results: Vec<ParallelStepResult> },
}

#[derive(Debug, Clone, Serialize)]
pub struct ParallelStepResult {
    pub command: String,
    pub success: bool,
}

/// Consumed by the executors; kept as a trait so tests can substitute a
/// capturing fake instead of touching the filesystem.
pub trait EventLogger: Send + Sync {
    fn log(&self, workflow_id: &str, event: LogEvent);
}

pub struct JsonlEventLogger {
    log_dir: PathBuf,
}

impl JsonlEventLogger {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
        }
    }

    fn log_path(&self, run_id: &str) -> PathBuf {
        self.log_dir.join(format!("{run_id}.jsonl"))
    }

    fn try_log(&self, workflow_id: &str, event: &LogEvent) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.log_dir)?;
        let mut record = Map::new();
        record.insert("workflow_id".to_string(), Value::from(workflow_id));
        record.insert(
            "ts".to_string(),
            Value::from(chrono::Utc::now().to_rfc3339()),
        );
        let event_value = serde_json::to_value(event).unwrap_or(Value::Null);
        if let Value::Object(fields) = event_value {
            for (key, value) in fields {
                record.insert(key, value);
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path(workflow_id))?;
        writeln!(file, "{}", Value::Object(record))?;
        Ok(())
    }
}

impl EventLogger for JsonlEventLogger {
    fn log(&self, workflow_id: &str, event: LogEvent) {
        if let Err(err) = self.try_log(workflow_id, &event) {
            if !warned_once().swap(true, Ordering::SeqCst) {
                tracing::warn!(error = %err, "structured event log write failed; suppressing further warnings this process");
            }
        }
    }
}

pub fn default_log_dir(working_dir: &Path) -> PathBuf {
    working_dir.join(".archon").join("logs")
}
