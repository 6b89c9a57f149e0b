//! Parallel Block Executor. Fans a `parallel:` clause out to one worker
//! thread per sub-step with a spawn-then-join-all-before-inspecting
//! discipline, the same shape as spawning paired stdout/stderr reader
//! threads and joining both before looking at the result.

use crate::orchestration::context::ExecutorContext;
use crate::orchestration::error_taxonomy::safe_send_message;
use crate::orchestration::logger::LogEvent;
use crate::orchestration::step_executor::{execute_single_step, StepResult};
use crate::workflow::model::ParallelBlock;

pub struct ParallelAggregate {
    results: Vec<StepResult>,
}

impl ParallelAggregate {
    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(StepResult::is_success)
    }

    /// One failure line per failed sub-step — every failure is reported
    /// in one message rather than failing fast.
    pub fn failure_message(&self) -> String {
        let lines: Vec<String> = self
            .results
            .iter()
            .filter_map(|r| match r {
                StepResult::Failure { command_name, error } => {
                    Some(format!("- `{command_name}`: {error}"))
                }
                StepResult::Success { .. } => None,
            })
            .collect();
        lines.join("\n")
    }
}

/// Fans out every `SingleStep` inside one `parallel:` clause with an
/// independent, session-less assistant invocation each, waits for all of
/// them, then reports aggregated results.
pub fn execute_parallel_block(
    ctx: &ExecutorContext,
    run_id: &str,
    conversation_id: &str,
    block_index: u32,
    block: &ParallelBlock,
    user_message: &str,
    issue_context: Option<&str>,
) -> ParallelAggregate {
    let commands: Vec<String> = block.steps.iter().map(|s| s.command.clone()).collect();

    safe_send_message(
        ctx.platform,
        conversation_id,
        &format!(
            "⏳ **Parallel block** ({} steps): {}",
            commands.len(),
            commands
                .iter()
                .map(|c| format!("`{c}`"))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        "parallel_block_notification",
    )
    .ok();

    ctx.logger.log(
        run_id,
        LogEvent::ParallelBlockStart {
            block_index,
            steps: commands.clone(),
        },
    );

    let results: Vec<StepResult> = std::thread::scope(|scope| {
        let handles: Vec<_> = block
            .steps
            .iter()
            .enumerate()
            .map(|(sub_index, single_step)| {
                let step_label = format!("{block_index}.{sub_index}");
                scope.spawn(move || {
                    execute_single_step(
                        ctx,
                        run_id,
                        conversation_id,
                        &step_label,
                        single_step,
                        None,
                        user_message,
                        issue_context,
                    )
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| {
                handle.join().unwrap_or_else(|_| StepResult::Failure {
                    command_name: "unknown".to_string(),
                    error: "sub-step thread panicked".to_string(),
                })
            })
            .collect()
    });

    let log_results: Vec<crate::orchestration::logger::ParallelStepResult> = results
        .iter()
        .map(|r| match r {
            StepResult::Success { command_name, .. } => crate::orchestration::logger::ParallelStepResult {
                command: command_name.clone(),
                success: true,
            },
            StepResult::Failure { command_name, .. } => crate::orchestration::logger::ParallelStepResult {
                command: command_name.clone(),
                success: false,
            },
        })
        .collect();

    ctx.logger.log(
        run_id,
        LogEvent::ParallelBlockComplete {
            block_index,
            results: log_results,
        },
    );

    let aggregate = ParallelAggregate { results };

    if !aggregate.all_succeeded() {
        crate::orchestration::error_taxonomy::send_critical_message(
            ctx.platform,
            conversation_id,
            &format!(
                "❌ Workflow failed — parallel block had failures:\n{}",
                aggregate.failure_message()
            ),
            "parallel_block_failure",
            3,
        );
    }

    aggregate
}
