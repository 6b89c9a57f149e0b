//! Executor Dispatcher. A cycle-driven dispatch loop over the three
//! workflow shapes (step/loop/parallel) with conversation-scoped
//! at-most-one-active-run enforcement, built around the `RunState`
//! transition discipline in `run_store.rs`.

use crate::assistant::Assistant;
use crate::orchestration::context::ExecutorContext;
use crate::orchestration::error_taxonomy::send_critical_message;
use crate::orchestration::logger::{EventLogger, LogEvent};
use crate::orchestration::run_store::{CreateWorkflowRunParams, RunStore};
use crate::platform::Platform;
use crate::workflow::model::{WorkflowDefinition, WorkflowStep};
use serde_json::Map;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

const STALENESS_THRESHOLD_SECS: i64 = 15 * 60;

/// Per-conversation locks guarding the preflight-check-then-create window,
/// so the in-memory `WorkflowRun` is owned by exactly one task at a time.
/// Scoped per conversation id rather than a single global mutex
/// so unrelated conversations keep dispatching concurrently; released
/// before the workflow body actually executes.
fn conversation_locks() -> &'static Mutex<HashMap<String, Arc<Mutex<()>>>> {
    static LOCKS: OnceLock<Mutex<HashMap<String, Arc<Mutex<()>>>>> = OnceLock::new();
    LOCKS.get_or_init(|| Mutex::new(HashMap::new()))
}

fn lock_for_conversation(conversation_id: &str) -> Arc<Mutex<()>> {
    let mut locks = conversation_locks()
        .lock()
        .expect("conversation lock registry poisoned");
    locks
        .entry(conversation_id.to_string())
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone()
}

pub struct Dispatcher<'a> {
    pub platform: &'a dyn Platform,
    pub assistant: &'a dyn Assistant,
    pub run_store: &'a dyn RunStore,
    pub logger: &'a dyn EventLogger,
    pub working_dir: &'a Path,
    pub command_folders: Vec<PathBuf>,
}

impl<'a> Dispatcher<'a> {
    pub fn dispatch(
        &self,
        workflow: &WorkflowDefinition,
        conversation_id: &str,
        codebase_id: Option<&str>,
        user_message: &str,
        issue_context: Option<&str>,
    ) -> bool {
        let ctx = ExecutorContext {
            platform: self.platform,
            assistant: self.assistant,
            run_store: self.run_store,
            logger: self.logger,
            working_dir: self.working_dir,
            command_folders: &self.command_folders,
        };
        dispatch_user_message(&ctx, workflow, conversation_id, codebase_id, user_message, issue_context)
    }
}

fn steps_summary(workflow: &WorkflowDefinition) -> String {
    match workflow {
        WorkflowDefinition::Loop(loop_workflow) => format!(
            "loop until \"{}\" (max {} iterations)",
            loop_workflow.loop_config.until, loop_workflow.loop_config.max_iterations
        ),
        WorkflowDefinition::Step(step_workflow) => step_workflow
            .steps
            .iter()
            .map(|step| match step {
                WorkflowStep::Single(single) => format!("`{}`", single.command),
                WorkflowStep::Parallel(block) => format!("[{} parallel]", block.steps.len()),
            })
            .collect::<Vec<_>>()
            .join(" → "),
    }
}

/// Runs the full pre-flight → dispatch → recovery cycle for one incoming
/// user message already routed to `workflow`.
pub fn dispatch_user_message(
    ctx: &ExecutorContext,
    workflow: &WorkflowDefinition,
    conversation_id: &str,
    codebase_id: Option<&str>,
    user_message: &str,
    issue_context: Option<&str>,
) -> bool {
    let now = crate::shared::ids::now_secs();

    // Preflight-check-then-create is the window where two concurrent
    // dispatches for the same conversation could both observe "no active
    // run" and both create one; guard it with a per-conversation lock so
    // that race is closed in-process, without serializing dispatches
    // for unrelated conversations.
    let conversation_lock = lock_for_conversation(conversation_id);
    let _guard = conversation_lock.lock().expect("conversation lock poisoned");

    let active_run = match ctx.run_store.get_active_workflow_run(conversation_id) {
        Ok(run) => run,
        Err(_) => {
            send_critical_message(
                ctx.platform,
                conversation_id,
                "Unable to verify workflow state, please try again",
                "dispatch_preflight_query",
                3,
            );
            return false;
        }
    };

    if let Some(active) = active_run {
        let inactive_for = now - active.last_activity_or_started();
        if inactive_for > STALENESS_THRESHOLD_SECS {
            let minutes = inactive_for / 60;
            let reason = format!("timed out after {minutes} minutes of inactivity");
            if ctx
                .run_store
                .fail_workflow_run(&active.id, &reason, now)
                .is_err()
            {
                send_critical_message(
                    ctx.platform,
                    conversation_id,
                    "Workflow blocked, try `/workflow cancel` first",
                    "dispatch_staleness_cleanup_failed",
                    3,
                );
                return false;
            }
        } else {
            send_critical_message(
                ctx.platform,
                conversation_id,
                &format!(
                    "⚠️ Workflow already running: {} ({})",
                    active.workflow_name,
                    &active.id[..active.id.len().min(8)]
                ),
                "dispatch_already_running",
                3,
            );
            return false;
        }
    }

    let run = match ctx.run_store.create_workflow_run(
        CreateWorkflowRunParams {
            workflow_name: workflow.name().to_string(),
            conversation_id: conversation_id.to_string(),
            codebase_id: codebase_id.map(str::to_string),
            user_message: user_message.to_string(),
            metadata: Map::new(),
        },
        now,
    ) {
        Ok(run) => run,
        Err(_) => {
            send_critical_message(
                ctx.platform,
                conversation_id,
                "Unable to start workflow (database error)",
                "dispatch_create_run_failed",
                3,
            );
            return false;
        }
    };

    // The run now exists with status=running, so it is itself the source
    // of truth for "already running" from here on; release the
    // conversation lock before running the (potentially long) workflow
    // body so unrelated dispatches for this conversation aren't blocked
    // on it, only correctly told the workflow is already running.
    drop(_guard);

    ctx.logger.log(
        &run.id,
        LogEvent::WorkflowStart {
            workflow_name: workflow.name().to_string(),
            content: user_message.to_string(),
        },
    );

    send_critical_message(
        ctx.platform,
        conversation_id,
        &format!("🚀 Starting workflow `{}`: {}", workflow.name(), steps_summary(workflow)),
        "dispatch_startup",
        2,
    );

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| match workflow {
        WorkflowDefinition::Step(step_workflow) => crate::orchestration::step_executor::execute_step_workflow(
            ctx,
            &run.id,
            conversation_id,
            step_workflow,
            user_message,
            issue_context,
        ),
        WorkflowDefinition::Loop(loop_workflow) => crate::orchestration::loop_executor::execute_loop_workflow(
            ctx,
            &run.id,
            conversation_id,
            loop_workflow,
            user_message,
            issue_context,
        ),
    }));

    match outcome {
        Ok(success) => success,
        Err(_) => {
            let _ = ctx.run_store.fail_workflow_run(&run.id, "unhandled executor panic", now);
            ctx.logger.log(
                &run.id,
                LogEvent::WorkflowError {
                    error: "unhandled executor panic".to_string(),
                },
            );
            send_critical_message(
                ctx.platform,
                conversation_id,
                "❌ Workflow failed due to an internal error",
                "dispatch_top_level_recovery",
                3,
            );
            false
        }
    }
}
