pub mod artifact_committer;
pub mod context;
pub mod dispatcher;
pub mod error_taxonomy;
pub mod loop_executor;
pub mod logger;
pub mod parallel_executor;
pub mod router;
pub mod run_store;
pub mod step_executor;

pub use artifact_committer::{commit_all_changes, finalize_working_tree, CommitOutcome};
pub use context::ExecutorContext;
pub use dispatcher::{dispatch_user_message, Dispatcher};
pub use error_taxonomy::{safe_send_message, send_critical_message, ErrorClass};
pub use logger::{EventLogger, JsonlEventLogger, LogEvent};
pub use loop_executor::{detect_completion_signal, execute_loop_workflow};
pub use parallel_executor::{execute_parallel_block, ParallelAggregate};
pub use router::{build_routing_prompt, parse_invoke_directive, RouteResult, RoutingContext};
pub use run_store::{
    CreateWorkflowRunParams, RunState, RunStore, SqliteRunStore, WorkflowRun, WorkflowRunUpdate,
};
pub use step_executor::{execute_single_step, execute_step_workflow, StepResult};
