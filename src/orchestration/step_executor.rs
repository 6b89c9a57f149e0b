//! Step Executor. Follows an `execute_step_attempt` structure (prompt
//! render -> provider invocation -> result evaluation), trimmed of
//! output-contract/memory/workspace-access concerns and extended with
//! session continuity and streaming delivery.

use crate::assistant::AssistantEvent;
use crate::orchestration::context::ExecutorContext;
use crate::orchestration::error_taxonomy::{failure_hint, safe_send_message, send_critical_message};
use crate::orchestration::logger::LogEvent;
use crate::orchestration::run_store::WorkflowRunUpdate;
use crate::platform::StreamingMode;
use crate::workflow::command_resolver::{load_command_prompt, LoadCommandResult};
use crate::workflow::model::{SingleStep, StepWorkflow, WorkflowStep};
use crate::workflow::substitution::render_prompt_with_context;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepResult {
    Success {
        command_name: String,
        session_id: Option<String>,
    },
    Failure {
        command_name: String,
        error: String,
    },
}

impl StepResult {
    pub fn is_success(&self) -> bool {
        matches!(self, StepResult::Success { .. })
    }
}

fn format_tool_call(tool_name: &str, tool_input: Option<&serde_json::Value>) -> String {
    match tool_input {
        Some(input) => format!("🔧 `{tool_name}`({input})"),
        None => format!("🔧 `{tool_name}`"),
    }
}

/// Executes one `SingleStep` labeled `step_label` (a plain index for a
/// top-level step, or a hierarchical `block.sub` id for a step inside a
/// `parallel:` block) of `workflow_id`, streaming/accumulating
/// delivery per the platform's mode.
#[allow(clippy::too_many_arguments)]
pub fn execute_single_step(
    ctx: &ExecutorContext,
    run_id: &str,
    conversation_id: &str,
    step_label: &str,
    step: &SingleStep,
    resume_session_id: Option<&str>,
    user_message: &str,
    issue_context: Option<&str>,
) -> StepResult {
    let resolved = load_command_prompt(ctx.working_dir, ctx.command_folders, &step.command);
    let template = match resolved {
        LoadCommandResult::Success { content } => content,
        LoadCommandResult::Failure { message, .. } => {
            send_critical_message(
                ctx.platform,
                conversation_id,
                &format!("❌ Workflow failed at step: `{}` — {message}", step.command),
                "step_prompt_resolution",
                3,
            );
            return StepResult::Failure {
                command_name: step.command.clone(),
                error: message,
            };
        }
    };

    let prompt = render_prompt_with_context(&template, run_id, user_message, issue_context);

    ctx.logger.log(
        run_id,
        LogEvent::StepStart {
            step: step.command.clone(),
            step_index: step_label.to_string(),
        },
    );

    let events = match ctx
        .assistant
        .send_query(&prompt, ctx.working_dir, resume_session_id)
    {
        Ok(events) => events,
        Err(err) => {
            return fail_step(ctx, run_id, conversation_id, step_label, &step.command, &err.to_string());
        }
    };

    let streaming = ctx.platform.streaming_mode() == StreamingMode::Stream;
    let mut batched = String::new();
    let mut dropped = 0u32;
    let mut session_id = None;

    for event in events {
        match event {
            AssistantEvent::Assistant { content } => {
                ctx.logger.log(run_id, LogEvent::Assistant { content: content.clone() });
                let _ = ctx.run_store.update_workflow_activity(run_id, crate::shared::ids::now_secs());
                if streaming {
                    if let Ok(false) = safe_send_message(ctx.platform, conversation_id, &content, "step_chunk") {
                        dropped += 1;
                    }
                } else {
                    batched.push_str(&content);
                }
            }
            AssistantEvent::Tool { tool_name, tool_input } => {
                ctx.logger.log(
                    run_id,
                    LogEvent::Tool {
                        tool_name: tool_name.clone(),
                        tool_input: tool_input.clone(),
                    },
                );
                if streaming {
                    let rendered = format_tool_call(&tool_name, tool_input.as_ref());
                    if let Ok(false) = safe_send_message(ctx.platform, conversation_id, &rendered, "step_tool_call") {
                        dropped += 1;
                    }
                }
            }
            AssistantEvent::Result { session_id: id } => {
                session_id = id;
            }
        }
    }

    if !streaming && !batched.is_empty() {
        if let Ok(false) = safe_send_message(ctx.platform, conversation_id, &batched, "step_batch") {
            dropped += 1;
        }
    }

    if dropped > 0 {
        safe_send_message(
            ctx.platform,
            conversation_id,
            &format!("⚠️ {dropped} message(s) could not be delivered during this step"),
            "step_drop_warning",
        )
        .ok();
    }

    ctx.logger.log(
        run_id,
        LogEvent::StepComplete {
            step: step.command.clone(),
            step_index: step_label.to_string(),
        },
    );

    StepResult::Success {
        command_name: step.command.clone(),
        session_id,
    }
}

fn fail_step(
    ctx: &ExecutorContext,
    run_id: &str,
    conversation_id: &str,
    step_label: &str,
    command_name: &str,
    error: &str,
) -> StepResult {
    let hint = failure_hint(error).map(|h| format!(" ({h})")).unwrap_or_default();
    ctx.logger.log(
        run_id,
        LogEvent::StepError {
            step: command_name.to_string(),
            step_index: step_label.to_string(),
            error: error.to_string(),
        },
    );
    send_critical_message(
        ctx.platform,
        conversation_id,
        &format!("❌ Workflow failed at step: `{command_name}` — {error}{hint}"),
        "step_failure",
        3,
    );
    StepResult::Failure {
        command_name: command_name.to_string(),
        error: error.to_string(),
    }
}

/// Drives every top-level `WorkflowStep` of a `StepWorkflow` in order,
/// carrying the session id between non-`clearContext` steps and
/// delegating `ParallelBlock`s to the parallel block executor.
pub fn execute_step_workflow(
    ctx: &ExecutorContext,
    run_id: &str,
    conversation_id: &str,
    workflow: &StepWorkflow,
    user_message: &str,
    issue_context: Option<&str>,
) -> bool {
    let mut carried_session_id: Option<String> = None;
    let total = workflow.steps.len() as u32;

    for (index, step) in workflow.steps.iter().enumerate() {
        let index = index as u32;
        if total > 1 {
            let label = match step {
                WorkflowStep::Single(s) => format!("`{}`", s.command),
                WorkflowStep::Parallel(p) => format!(
                    "[{} parallel]",
                    p.steps.len()
                ),
            };
            safe_send_message(
                ctx.platform,
                conversation_id,
                &format!("⏳ **Step {}/{total}**: {label}", index + 1),
                "step_notification",
            )
            .ok();
        }

        let result = match step {
            WorkflowStep::Single(single) => {
                let fresh = single.clear_context || index == 0;
                let resume = if fresh { None } else { carried_session_id.as_deref() };
                execute_single_step(
                    ctx,
                    run_id,
                    conversation_id,
                    &index.to_string(),
                    single,
                    resume,
                    user_message,
                    issue_context,
                )
            }
            WorkflowStep::Parallel(block) => {
                let aggregate = crate::orchestration::parallel_executor::execute_parallel_block(
                    ctx,
                    run_id,
                    conversation_id,
                    index,
                    block,
                    user_message,
                    issue_context,
                );
                carried_session_id = None;
                if !aggregate.all_succeeded() {
                    let _ = ctx.run_store.fail_workflow_run(run_id, &aggregate.failure_message(), crate::shared::ids::now_secs());
                    crate::orchestration::artifact_committer::finalize_working_tree(
                        ctx.platform,
                        conversation_id,
                        ctx.working_dir,
                        &workflow.name,
                    );
                    return false;
                }
                let _ = ctx.run_store.update_workflow_run(
                    run_id,
                    WorkflowRunUpdate {
                        current_step_index: Some(index + 1),
                        status: None,
                        metadata: None,
                    },
                );
                continue;
            }
        };

        match result {
            StepResult::Success { session_id, .. } => {
                carried_session_id = session_id;
                let _ = ctx.run_store.update_workflow_run(
                    run_id,
                    WorkflowRunUpdate {
                        current_step_index: Some(index + 1),
                        status: None,
                        metadata: None,
                    },
                );
            }
            StepResult::Failure { error, .. } => {
                let _ = ctx.run_store.fail_workflow_run(run_id, &error, crate::shared::ids::now_secs());
                crate::orchestration::artifact_committer::finalize_working_tree(
                    ctx.platform,
                    conversation_id,
                    ctx.working_dir,
                    &workflow.name,
                );
                return false;
            }
        }
    }

    let _ = ctx.run_store.complete_workflow_run(run_id, crate::shared::ids::now_secs());
    ctx.logger.log(run_id, LogEvent::WorkflowComplete);
    crate::orchestration::artifact_committer::finalize_working_tree(
        ctx.platform,
        conversation_id,
        ctx.working_dir,
        &workflow.name,
    );
    if ctx.platform.platform_type() != "github" {
        send_critical_message(
            ctx.platform,
            conversation_id,
            &format!("✅ Workflow complete: {}", workflow.name),
            "workflow_complete",
            3,
        );
    }
    true
}
