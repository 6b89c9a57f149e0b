//! Run Store interface and `WorkflowRun` data model.
//!
//! The storage schema is an implementation detail; only the columns
//! needed to satisfy the `WorkflowRun` invariants are defined. The default
//! backend is `rusqlite`, chosen for structured persistent state.

use crate::shared::errors::OrchestratorError;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Running,
    Completed,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }

    fn as_str(self) -> &'static str {
        match self {
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "running" => Some(RunState::Running),
            "completed" => Some(RunState::Completed),
            "failed" => Some(RunState::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: String,
    pub workflow_name: String,
    pub conversation_id: String,
    pub codebase_id: Option<String>,
    pub current_step_index: u32,
    pub status: RunState,
    pub user_message: String,
    pub metadata: Map<String, Value>,
    pub started_at: i64,
    pub completed_at: Option<i64>,
    pub last_activity_at: Option<i64>,
}

impl WorkflowRun {
    /// `last_activity_at` falls back to `started_at` when no chunk has
    /// been observed yet.
    pub fn last_activity_or_started(&self) -> i64 {
        self.last_activity_at.unwrap_or(self.started_at)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CreateWorkflowRunParams {
    pub workflow_name: String,
    pub conversation_id: String,
    pub codebase_id: Option<String>,
    pub user_message: String,
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Default)]
pub struct WorkflowRunUpdate {
    pub current_step_index: Option<u32>,
    pub status: Option<RunState>,
    /// Merged shallowly into the existing metadata map.
    pub metadata: Option<Map<String, Value>>,
}

/// The Run Store interface consumed by the executor. The backing
/// schema is an implementation detail; implementations only need to honor these
/// semantics, including the at-most-one-active-run-per-conversation
/// invariant enforced by callers via `get_active_workflow_run`.
pub trait RunStore: Send + Sync {
    fn create_workflow_run(
        &self,
        params: CreateWorkflowRunParams,
        now: i64,
    ) -> Result<WorkflowRun, OrchestratorError>;

    fn get_active_workflow_run(
        &self,
        conversation_id: &str,
    ) -> Result<Option<WorkflowRun>, OrchestratorError>;

    fn load_run(&self, run_id: &str) -> Result<WorkflowRun, OrchestratorError>;

    fn update_workflow_run(
        &self,
        run_id: &str,
        update: WorkflowRunUpdate,
    ) -> Result<(), OrchestratorError>;

    fn update_workflow_activity(&self, run_id: &str, now: i64) -> Result<(), OrchestratorError>;

    fn complete_workflow_run(&self, run_id: &str, now: i64) -> Result<(), OrchestratorError>;

    fn fail_workflow_run(
        &self,
        run_id: &str,
        error: &str,
        now: i64,
    ) -> Result<(), OrchestratorError>;
}

/// Default `RunStore` backed by a local sqlite database
/// (`<cwd>/.archon/run_store.sqlite3`).
pub struct SqliteRunStore {
    conn: Mutex<Connection>,
}

impl SqliteRunStore {
    pub fn open(path: &Path) -> Result<Self, OrchestratorError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| OrchestratorError::io(parent.display().to_string(), e))?;
        }
        let conn = Connection::open(path)
            .map_err(|e| OrchestratorError::RunStore(format!("failed to open {}: {e}", path.display())))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, OrchestratorError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| OrchestratorError::RunStore(format!("failed to open in-memory db: {e}")))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&self) -> Result<(), OrchestratorError> {
        let conn = self.conn.lock().expect("run store mutex poisoned");
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS workflow_runs (
                id TEXT PRIMARY KEY,
                workflow_name TEXT NOT NULL,
                conversation_id TEXT NOT NULL,
                codebase_id TEXT,
                current_step_index INTEGER NOT NULL,
                status TEXT NOT NULL,
                user_message TEXT NOT NULL,
                metadata TEXT NOT NULL,
                started_at INTEGER NOT NULL,
                completed_at INTEGER,
                last_activity_at INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_workflow_runs_conversation
                ON workflow_runs (conversation_id, status);",
        )
        .map_err(|e| OrchestratorError::RunStore(e.to_string()))
    }

    fn row_to_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorkflowRun> {
        let status_raw: String = row.get("status")?;
        let metadata_raw: String = row.get("metadata")?;
        let metadata: Map<String, Value> = serde_json::from_str(&metadata_raw).unwrap_or_default();
        Ok(WorkflowRun {
            id: row.get("id")?,
            workflow_name: row.get("workflow_name")?,
            conversation_id: row.get("conversation_id")?,
            codebase_id: row.get("codebase_id")?,
            current_step_index: row.get::<_, i64>("current_step_index")? as u32,
            status: RunState::parse(&status_raw).unwrap_or(RunState::Running),
            user_message: row.get("user_message")?,
            metadata,
            started_at: row.get("started_at")?,
            completed_at: row.get("completed_at")?,
            last_activity_at: row.get("last_activity_at")?,
        })
    }
}

impl RunStore for SqliteRunStore {
    fn create_workflow_run(
        &self,
        params: CreateWorkflowRunParams,
        now: i64,
    ) -> Result<WorkflowRun, OrchestratorError> {
        let run = WorkflowRun {
            id: crate::shared::ids::generate_run_id(&params.workflow_name),
            workflow_name: params.workflow_name,
            conversation_id: params.conversation_id,
            codebase_id: params.codebase_id,
            current_step_index: 0,
            status: RunState::Running,
            user_message: params.user_message,
            metadata: params.metadata,
            started_at: now,
            completed_at: None,
            last_activity_at: None,
        };
        let conn = self.conn.lock().expect("run store mutex poisoned");
        conn.execute(
            "INSERT INTO workflow_runs (
                id, workflow_name, conversation_id, codebase_id, current_step_index,
                status, user_message, metadata, started_at, completed_at, last_activity_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                run.id,
                run.workflow_name,
                run.conversation_id,
                run.codebase_id,
                run.current_step_index,
                run.status.as_str(),
                run.user_message,
                serde_json::to_string(&run.metadata).unwrap_or_default(),
                run.started_at,
                run.completed_at,
                run.last_activity_at,
            ],
        )
        .map_err(|e| OrchestratorError::RunStore(e.to_string()))?;
        Ok(run)
    }

    fn get_active_workflow_run(
        &self,
        conversation_id: &str,
    ) -> Result<Option<WorkflowRun>, OrchestratorError> {
        let conn = self.conn.lock().expect("run store mutex poisoned");
        conn.query_row(
            "SELECT * FROM workflow_runs WHERE conversation_id = ?1 AND status = 'running'
             ORDER BY started_at DESC LIMIT 1",
            params![conversation_id],
            Self::row_to_run,
        )
        .optional()
        .map_err(|e| OrchestratorError::RunStore(e.to_string()))
    }

    fn load_run(&self, run_id: &str) -> Result<WorkflowRun, OrchestratorError> {
        let conn = self.conn.lock().expect("run store mutex poisoned");
        conn.query_row(
            "SELECT * FROM workflow_runs WHERE id = ?1",
            params![run_id],
            Self::row_to_run,
        )
        .optional()
        .map_err(|e| OrchestratorError::RunStore(e.to_string()))?
        .ok_or_else(|| OrchestratorError::UnknownRunId {
            run_id: run_id.to_string(),
        })
    }

    fn update_workflow_run(
        &self,
        run_id: &str,
        update: WorkflowRunUpdate,
    ) -> Result<(), OrchestratorError> {
        let mut run = self.load_run(run_id)?;
        if let Some(index) = update.current_step_index {
            run.current_step_index = index;
        }
        if let Some(status) = update.status {
            run.status = status;
        }
        if let Some(metadata) = update.metadata {
            for (key, value) in metadata {
                run.metadata.insert(key, value);
            }
        }
        let conn = self.conn.lock().expect("run store mutex poisoned");
        conn.execute(
            "UPDATE workflow_runs SET current_step_index = ?1, status = ?2, metadata = ?3 WHERE id = ?4",
            params![
                run.current_step_index,
                run.status.as_str(),
                serde_json::to_string(&run.metadata).unwrap_or_default(),
                run_id,
            ],
        )
        .map_err(|e| OrchestratorError::RunStore(e.to_string()))?;
        Ok(())
    }

    fn update_workflow_activity(&self, run_id: &str, now: i64) -> Result<(), OrchestratorError> {
        let conn = self.conn.lock().expect("run store mutex poisoned");
        let changed = conn
            .execute(
                "UPDATE workflow_runs SET last_activity_at = ?1 WHERE id = ?2",
                params![now, run_id],
            )
            .map_err(|e| OrchestratorError::RunStore(e.to_string()))?;
        if changed == 0 {
            return Err(OrchestratorError::UnknownRunId {
                run_id: run_id.to_string(),
            });
        }
        Ok(())
    }

    fn complete_workflow_run(&self, run_id: &str, now: i64) -> Result<(), OrchestratorError> {
        let conn = self.conn.lock().expect("run store mutex poisoned");
        conn.execute(
            "UPDATE workflow_runs SET status = 'completed', completed_at = ?1 WHERE id = ?2",
            params![now, run_id],
        )
        .map_err(|e| OrchestratorError::RunStore(e.to_string()))?;
        Ok(())
    }

    fn fail_workflow_run(
        &self,
        run_id: &str,
        error: &str,
        now: i64,
    ) -> Result<(), OrchestratorError> {
        let conn = self.conn.lock().expect("run store mutex poisoned");
        conn.execute(
            "UPDATE workflow_runs SET status = 'failed', completed_at = ?1 WHERE id = ?2",
            params![now, run_id],
        )
        .map_err(|e| OrchestratorError::RunStore(e.to_string()))?;
        drop(conn);
        tracing::warn!(run_id, error, "workflow run marked failed");
        Ok(())
    }
}
