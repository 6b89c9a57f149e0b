//! Definition Model & Loader.
//!
//! Parses workflow YAML files from a set of search paths, normalizing the
//! steps/loop discriminated union and rejecting any structural violation by
//! dropping the whole offending workflow (never the whole load).

use crate::workflow::model::{
    command_name_is_safe, LoopConfig, LoopWorkflow, ParallelBlock, Provider, SingleStep,
    StepWorkflow, WorkflowDefinition, WorkflowStep,
};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct RawStep {
    command: Option<String>,
    step: Option<String>,
    #[serde(default, rename = "clearContext")]
    clear_context: Option<bool>,
    #[serde(default)]
    parallel: Option<Vec<RawStep>>,
}

#[derive(Debug, Deserialize)]
struct RawLoopConfig {
    until: Option<String>,
    #[serde(rename = "max_iterations")]
    max_iterations: Option<u32>,
    #[serde(default, rename = "fresh_context")]
    fresh_context: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawWorkflowDefinition {
    name: Option<String>,
    description: Option<String>,
    provider: Option<String>,
    model: Option<String>,
    #[serde(default)]
    steps: Option<Vec<RawStep>>,
    #[serde(rename = "loop")]
    loop_config: Option<RawLoopConfig>,
    prompt: Option<String>,
}

fn normalize_single(raw: &RawStep) -> Result<SingleStep, String> {
    let command = raw
        .command
        .clone()
        .or_else(|| raw.step.clone())
        .ok_or_else(|| "step is missing `command`".to_string())?;
    if !command_name_is_safe(&command) {
        return Err(format!("command name `{command}` is unsafe"));
    }
    Ok(SingleStep {
        command,
        clear_context: raw.clear_context.unwrap_or(false),
    })
}

fn normalize_step(raw: &RawStep, depth: usize) -> Result<WorkflowStep, String> {
    if let Some(parallel) = raw.parallel.as_ref() {
        if depth > 0 {
            return Err("nested `parallel:` blocks are not allowed".to_string());
        }
        if raw.command.is_some() || raw.step.is_some() {
            return Err("a `parallel:` entry cannot also declare `command`".to_string());
        }
        if parallel.is_empty() {
            return Err("`parallel:` block must contain at least one step".to_string());
        }
        let mut steps = Vec::with_capacity(parallel.len());
        for entry in parallel {
            if entry.parallel.is_some() {
                return Err("nested `parallel:` blocks are not allowed".to_string());
            }
            steps.push(normalize_single(entry)?);
        }
        return Ok(WorkflowStep::Parallel(ParallelBlock { steps }));
    }
    Ok(WorkflowStep::Single(normalize_single(raw)?))
}

fn normalize_provider(raw: Option<&str>) -> Provider {
    match raw {
        None => Provider::default(),
        Some(value) => Provider::parse(value).unwrap_or_default(),
    }
}

fn normalize(raw: RawWorkflowDefinition) -> Result<WorkflowDefinition, String> {
    let name = raw
        .name
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| "workflow is missing a non-empty `name`".to_string())?;
    let description = raw
        .description
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| "workflow is missing a non-empty `description`".to_string())?;

    let has_steps = raw.steps.as_ref().is_some_and(|s| !s.is_empty());
    let has_loop = raw.loop_config.is_some();

    match (has_steps, has_loop) {
        (true, true) => Err(format!(
            "workflow `{name}` declares both `steps` and `loop`; exactly one is required"
        )),
        (false, false) => Err(format!(
            "workflow `{name}` declares neither `steps` nor `loop`; exactly one is required"
        )),
        (true, false) => {
            let provider = normalize_provider(raw.provider.as_deref());
            let mut steps = Vec::new();
            for raw_step in raw.steps.unwrap_or_default() {
                steps.push(
                    normalize_step(&raw_step, 0)
                        .map_err(|reason| format!("workflow `{name}`: {reason}"))?,
                );
            }
            Ok(WorkflowDefinition::Step(StepWorkflow {
                name,
                description,
                provider,
                model: raw.model,
                steps,
            }))
        }
        (false, true) => {
            let raw_loop = raw.loop_config.expect("has_loop checked");
            let until = raw_loop
                .until
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| format!("workflow `{name}`: `loop.until` must be non-empty"))?;
            let max_iterations = raw_loop
                .max_iterations
                .filter(|n| *n >= 1)
                .ok_or_else(|| {
                    format!("workflow `{name}`: `loop.max_iterations` must be a positive integer")
                })?;
            let prompt = raw
                .prompt
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| format!("workflow `{name}`: `prompt` must be non-empty"))?;
            let provider = normalize_provider(raw.provider.as_deref());
            Ok(WorkflowDefinition::Loop(LoopWorkflow {
                name,
                description,
                provider,
                model: raw.model,
                loop_config: LoopConfig {
                    until,
                    max_iterations,
                    fresh_context: raw_loop.fresh_context.unwrap_or(false),
                },
                prompt,
            }))
        }
    }
}

fn is_workflow_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn collect_workflow_files(root: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(root) else {
        return;
    };
    let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();
    paths.sort();
    for path in paths {
        if path.is_dir() {
            collect_workflow_files(&path, out);
        } else if is_workflow_file(&path) {
            out.push(path);
        }
    }
}

/// Loads every valid workflow found across `search_paths` (each resolved
/// relative to `working_dir`). Files that fail to parse or fail structural
/// validation are logged and skipped; the rest continue loading.
/// Duplicate workflow names keep the first one loaded (see DESIGN.md).
pub fn load_workflows(working_dir: &Path, search_paths: &[PathBuf]) -> Vec<WorkflowDefinition> {
    let mut files = Vec::new();
    for search_path in search_paths {
        let root = if search_path.is_absolute() {
            search_path.clone()
        } else {
            working_dir.join(search_path)
        };
        collect_workflow_files(&root, &mut files);
    }

    let mut seen_names = HashSet::new();
    let mut workflows = Vec::new();
    for path in files {
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "failed to read workflow file");
                continue;
            }
        };
        let parsed: RawWorkflowDefinition = match serde_yaml::from_str(&raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "failed to parse workflow yaml");
                continue;
            }
        };
        match normalize(parsed) {
            Ok(workflow) => {
                if !seen_names.insert(workflow.name().to_string()) {
                    tracing::warn!(path = %path.display(), name = workflow.name(), "duplicate workflow name, keeping first loaded");
                    continue;
                }
                workflows.push(workflow);
            }
            Err(reason) => {
                tracing::warn!(path = %path.display(), reason = %reason, "rejecting invalid workflow");
            }
        }
    }
    workflows
}

/// The default workflow search path set: `.archon/workflows` (recursing
/// into subdirectories such as `defaults/`).
pub fn default_search_paths() -> Vec<PathBuf> {
    vec![PathBuf::from(".archon/workflows")]
}
