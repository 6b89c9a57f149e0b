//! Loop Executor, Ralph-style iterate-until-signal execution. Uses
//! `regex` for the preferred `<promise>SIGNAL</promise>` wrapped form
//! (escaped via `regex::escape`), and a hand-rolled plain-text fallback
//! scan for the bare-signal case, where a simple scan suffices and full
//! regex would be overkill.

use crate::assistant::AssistantEvent;
use crate::orchestration::context::ExecutorContext;
use crate::orchestration::error_taxonomy::{safe_send_message, send_critical_message};
use crate::orchestration::logger::LogEvent;
use crate::orchestration::run_store::WorkflowRunUpdate;
use crate::platform::StreamingMode;
use crate::workflow::model::LoopWorkflow;
use crate::workflow::substitution::render_prompt_with_context;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};

const PUNCTUATION_TAIL: [char; 6] = ['.', ',', ';', ':', '!', '?'];

fn matches_primary(output: &str, signal: &str) -> bool {
    let pattern = format!(r"(?is)<promise>\s*{}\s*</promise>", regex::escape(signal));
    regex::Regex::new(&pattern)
        .map(|re| re.is_match(output))
        .unwrap_or(false)
}

fn matches_plain_fallback(output: &str, signal: &str) -> bool {
    if signal.is_empty() {
        return false;
    }
    if let Some(idx) = output.rfind(signal) {
        let after = &output[idx + signal.len()..];
        if after
            .chars()
            .all(|c| c.is_whitespace() || PUNCTUATION_TAIL.contains(&c))
        {
            return true;
        }
    }
    output.lines().any(|line| line.trim() == signal)
}

pub fn detect_completion_signal(output: &str, signal: &str) -> bool {
    matches_primary(output, signal) || matches_plain_fallback(output, signal)
}

fn iteration_metadata(iteration: u32, max_iterations: u32) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("iteration_count".to_string(), Value::from(iteration));
    metadata.insert("max_iterations".to_string(), Value::from(max_iterations));
    metadata
}

pub fn execute_loop_workflow(
    ctx: &ExecutorContext,
    run_id: &str,
    conversation_id: &str,
    workflow: &LoopWorkflow,
    user_message: &str,
    issue_context: Option<&str>,
) -> bool {
    let max_iterations = workflow.loop_config.max_iterations;
    let signal = &workflow.loop_config.until;
    let warned_progress_tracking = AtomicBool::new(false);
    let mut session_id: Option<String> = None;

    for iteration in 1..=max_iterations {
        if ctx
            .run_store
            .update_workflow_run(
                run_id,
                WorkflowRunUpdate {
                    current_step_index: Some(iteration),
                    status: None,
                    metadata: Some(iteration_metadata(iteration, max_iterations)),
                },
            )
            .is_err()
            && !warned_progress_tracking.swap(true, Ordering::SeqCst)
        {
            safe_send_message(
                ctx.platform,
                conversation_id,
                "⚠️ progress tracking unavailable — workflow continues",
                "loop_progress_tracking",
            )
            .ok();
        }

        safe_send_message(
            ctx.platform,
            conversation_id,
            &format!("⏳ **Iteration {iteration}/{max_iterations}**"),
            "loop_iteration_notification",
        )
        .ok();

        let fresh = workflow.loop_config.fresh_context || iteration == 1;
        let resume = if fresh { None } else { session_id.as_deref() };

        let prompt = render_prompt_with_context(&workflow.prompt, run_id, user_message, issue_context);

        let events = match ctx.assistant.send_query(&prompt, ctx.working_dir, resume) {
            Ok(events) => events,
            Err(err) => {
                return fail_loop(ctx, run_id, conversation_id, iteration, &err.to_string(), &workflow.name);
            }
        };

        let streaming = ctx.platform.streaming_mode() == StreamingMode::Stream;
        let mut accumulated = String::new();
        let mut dropped = 0u32;

        for event in events {
            match event {
                AssistantEvent::Assistant { content } => {
                    accumulated.push_str(&content);
                    ctx.logger.log(run_id, LogEvent::Assistant { content: content.clone() });
                    let _ = ctx.run_store.update_workflow_activity(run_id, crate::shared::ids::now_secs());
                    if streaming {
                        if let Ok(false) = safe_send_message(ctx.platform, conversation_id, &content, "loop_chunk") {
                            dropped += 1;
                        }
                    }
                }
                AssistantEvent::Tool { tool_name, tool_input } => {
                    ctx.logger.log(
                        run_id,
                        LogEvent::Tool {
                            tool_name,
                            tool_input,
                        },
                    );
                }
                AssistantEvent::Result { session_id: id } => {
                    session_id = id;
                }
            }
        }

        if !streaming && !accumulated.is_empty() {
            if let Ok(false) = safe_send_message(ctx.platform, conversation_id, &accumulated, "loop_batch") {
                dropped += 1;
            }
        }
        if dropped > 0 {
            safe_send_message(
                ctx.platform,
                conversation_id,
                &format!("⚠️ {dropped} message(s) could not be delivered during this iteration"),
                "loop_drop_warning",
            )
            .ok();
        }

        if detect_completion_signal(&accumulated, signal) {
            let _ = ctx.run_store.complete_workflow_run(run_id, crate::shared::ids::now_secs());
            ctx.logger.log(run_id, LogEvent::WorkflowComplete);
            send_critical_message(
                ctx.platform,
                conversation_id,
                &format!("✅ Loop complete: {} ({iteration} iterations)", workflow.name),
                "loop_complete",
                3,
            );
            crate::orchestration::artifact_committer::finalize_working_tree(
                ctx.platform,
                conversation_id,
                ctx.working_dir,
                &workflow.name,
            );
            return true;
        }

        ctx.logger.log(
            run_id,
            LogEvent::StepComplete {
                step: format!("iteration-{iteration}"),
                step_index: iteration.to_string(),
            },
        );
    }

    let message = format!(
        "Max iterations ({max_iterations}) reached without completion signal \"{signal}\""
    );
    let _ = ctx.run_store.fail_workflow_run(run_id, &message, crate::shared::ids::now_secs());
    ctx.logger.log(run_id, LogEvent::WorkflowError { error: message.clone() });
    send_critical_message(
        ctx.platform,
        conversation_id,
        &format!(
            "❌ Loop incomplete: {}\n\n{message}\n\nTry increasing `max_iterations`, verify the prompt drives toward the signal, or inspect the log at `.archon/logs/{run_id}.jsonl`.",
            workflow.name
        ),
        "loop_exhausted",
        3,
    );
    crate::orchestration::artifact_committer::finalize_working_tree(
        ctx.platform,
        conversation_id,
        ctx.working_dir,
        &workflow.name,
    );
    false
}

fn fail_loop(
    ctx: &ExecutorContext,
    run_id: &str,
    conversation_id: &str,
    iteration: u32,
    error: &str,
    workflow_name: &str,
) -> bool {
    let message = format!("Iteration {iteration}: {error}");
    let _ = ctx.run_store.fail_workflow_run(run_id, &message, crate::shared::ids::now_secs());
    ctx.logger.log(run_id, LogEvent::WorkflowError { error: message.clone() });
    send_critical_message(ctx.platform, conversation_id, &format!("❌ {message}"), "loop_iteration_failure", 3);
    crate::orchestration::artifact_committer::finalize_working_tree(
        ctx.platform,
        conversation_id,
        ctx.working_dir,
        workflow_name,
    );
    false
}
