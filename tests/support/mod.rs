//! Shared test fakes for the integration suite: hand-written fakes plus
//! `tempdir()` rather than a mocking framework.

use archon::assistant::{Assistant, AssistantEvent};
use archon::orchestration::logger::{EventLogger, LogEvent};
use archon::orchestration::run_store::{
    CreateWorkflowRunParams, RunStore, WorkflowRun, WorkflowRunUpdate,
};
use archon::shared::errors::OrchestratorError;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub prompt: String,
    pub resume_session_id: Option<String>,
}

/// One scripted outcome for a single `send_query` call.
pub enum ScriptedOutcome {
    Events(Vec<AssistantEvent>),
    Error(String),
}

/// Scripted `Assistant`: each `send_query` call pops the next queued
/// outcome and records the prompt/resume id it was invoked with.
pub struct FakeAssistant {
    scripts: Mutex<VecDeque<ScriptedOutcome>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl FakeAssistant {
    pub fn new(scripts: Vec<Vec<AssistantEvent>>) -> Self {
        Self::with_outcomes(scripts.into_iter().map(ScriptedOutcome::Events).collect())
    }

    pub fn with_outcomes(scripts: Vec<ScriptedOutcome>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("mutex poisoned").clone()
    }
}

impl Assistant for FakeAssistant {
    fn send_query(
        &self,
        prompt: &str,
        _cwd: &Path,
        resume_session_id: Option<&str>,
    ) -> Result<Box<dyn Iterator<Item = AssistantEvent> + Send>, OrchestratorError> {
        self.calls.lock().expect("mutex poisoned").push(RecordedCall {
            prompt: prompt.to_string(),
            resume_session_id: resume_session_id.map(str::to_string),
        });
        match self.scripts.lock().expect("mutex poisoned").pop_front() {
            Some(ScriptedOutcome::Events(events)) => Ok(Box::new(events.into_iter())),
            Some(ScriptedOutcome::Error(message)) => Err(OrchestratorError::Assistant(message)),
            None => Ok(Box::new(std::iter::empty())),
        }
    }
}

/// Scripted `Assistant` keyed by a substring of the rendered prompt
/// (the prompt file content is distinct per command, so this gives
/// deterministic per-command outcomes regardless of the order in which
/// concurrent parallel-block sub-steps happen to call `send_query`).
pub struct KeyedFakeAssistant {
    outcomes: Vec<(String, Mutex<Option<ScriptedOutcome>>)>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl KeyedFakeAssistant {
    pub fn new(outcomes: Vec<(&str, ScriptedOutcome)>) -> Self {
        Self {
            outcomes: outcomes
                .into_iter()
                .map(|(key, outcome)| (key.to_string(), Mutex::new(Some(outcome))))
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("mutex poisoned").clone()
    }
}

impl Assistant for KeyedFakeAssistant {
    fn send_query(
        &self,
        prompt: &str,
        _cwd: &Path,
        resume_session_id: Option<&str>,
    ) -> Result<Box<dyn Iterator<Item = AssistantEvent> + Send>, OrchestratorError> {
        self.calls.lock().expect("mutex poisoned").push(RecordedCall {
            prompt: prompt.to_string(),
            resume_session_id: resume_session_id.map(str::to_string),
        });
        let matched = self
            .outcomes
            .iter()
            .find(|(key, _)| prompt.contains(key.as_str()))
            .unwrap_or_else(|| panic!("no scripted outcome matches prompt: {prompt}"));
        let outcome = matched
            .1
            .lock()
            .expect("mutex poisoned")
            .take()
            .unwrap_or_else(|| panic!("outcome for `{}` already consumed", matched.0));
        match outcome {
            ScriptedOutcome::Events(events) => Ok(Box::new(events.into_iter())),
            ScriptedOutcome::Error(message) => Err(OrchestratorError::Assistant(message)),
        }
    }
}

pub fn text_then_result(chunks: &[&str], session_id: Option<&str>) -> Vec<AssistantEvent> {
    let mut events: Vec<AssistantEvent> = chunks
        .iter()
        .map(|chunk| AssistantEvent::Assistant {
            content: chunk.to_string(),
        })
        .collect();
    events.push(AssistantEvent::Result {
        session_id: session_id.map(str::to_string),
    });
    events
}

/// Captures every logged event as its snake_case event-kind name, in
/// order, so integration tests can assert on the JSONL event sequence
/// without touching the filesystem.
#[derive(Default)]
pub struct CapturingLogger {
    events: Mutex<Vec<(String, String)>>,
}

impl CapturingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_kinds(&self) -> Vec<String> {
        self.events
            .lock()
            .expect("mutex poisoned")
            .iter()
            .map(|(_, kind)| kind.clone())
            .collect()
    }

    pub fn events_for(&self, run_id: &str) -> Vec<String> {
        self.events
            .lock()
            .expect("mutex poisoned")
            .iter()
            .filter(|(id, _)| id == run_id)
            .map(|(_, kind)| kind.clone())
            .collect()
    }
}

fn event_kind(event: &LogEvent) -> &'static str {
    match event {
        LogEvent::WorkflowStart { .. } => "workflow_start",
        LogEvent::WorkflowComplete => "workflow_complete",
        LogEvent::WorkflowError { .. } => "workflow_error",
        LogEvent::StepStart { .. } => "step_start",
        LogEvent::StepComplete { .. } => "step_complete",
        LogEvent::StepError { .. } => "step_error",
        LogEvent::Assistant { .. } => "assistant",
        LogEvent::Tool { .. } => "tool",
        LogEvent::ParallelBlockStart { .. } => "parallel_block_start",
        LogEvent::ParallelBlockComplete { .. } => "parallel_block_complete",
    }
}

impl EventLogger for CapturingLogger {
    fn log(&self, workflow_id: &str, event: LogEvent) {
        self.events
            .lock()
            .expect("mutex poisoned")
            .push((workflow_id.to_string(), event_kind(&event).to_string()));
    }
}

/// Wraps a `RunStore` and records the id of every run it creates, so
/// tests can find the run a dispatch produced without the store exposing
/// a "list all runs" operation.
pub struct RecordingRunStore<S: RunStore> {
    inner: S,
    created: Mutex<Vec<String>>,
}

impl<S: RunStore> RecordingRunStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn created_run_ids(&self) -> Vec<String> {
        self.created.lock().expect("mutex poisoned").clone()
    }

    pub fn last_created_run_id(&self) -> Option<String> {
        self.created.lock().expect("mutex poisoned").last().cloned()
    }
}

impl<S: RunStore> RunStore for RecordingRunStore<S> {
    fn create_workflow_run(
        &self,
        params: CreateWorkflowRunParams,
        now: i64,
    ) -> Result<WorkflowRun, OrchestratorError> {
        let run = self.inner.create_workflow_run(params, now)?;
        self.created.lock().expect("mutex poisoned").push(run.id.clone());
        Ok(run)
    }

    fn get_active_workflow_run(
        &self,
        conversation_id: &str,
    ) -> Result<Option<WorkflowRun>, OrchestratorError> {
        self.inner.get_active_workflow_run(conversation_id)
    }

    fn load_run(&self, run_id: &str) -> Result<WorkflowRun, OrchestratorError> {
        self.inner.load_run(run_id)
    }

    fn update_workflow_run(
        &self,
        run_id: &str,
        update: WorkflowRunUpdate,
    ) -> Result<(), OrchestratorError> {
        self.inner.update_workflow_run(run_id, update)
    }

    fn update_workflow_activity(&self, run_id: &str, now: i64) -> Result<(), OrchestratorError> {
        self.inner.update_workflow_activity(run_id, now)
    }

    fn complete_workflow_run(&self, run_id: &str, now: i64) -> Result<(), OrchestratorError> {
        self.inner.complete_workflow_run(run_id, now)
    }

    fn fail_workflow_run(&self, run_id: &str, error: &str, now: i64) -> Result<(), OrchestratorError> {
        self.inner.fail_workflow_run(run_id, error, now)
    }
}
