pub mod command_resolver;
pub mod loader;
pub mod model;
pub mod substitution;

pub use command_resolver::{load_command_prompt, LoadCommandFailureReason, LoadCommandResult};
pub use loader::{default_search_paths, load_workflows};
pub use model::{
    command_name_is_safe, LoopConfig, LoopWorkflow, ParallelBlock, Provider, SingleStep,
    StepWorkflow, WorkflowDefinition, WorkflowStep,
};
pub use substitution::{render_prompt_with_context, substitute_variables, SubstitutionResult};
