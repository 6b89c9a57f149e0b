//! The discriminated workflow definition types from the data model.
//!
//! Values here are always already-validated: construction goes through
//! `crate::workflow::loader`, which is the only place raw YAML is allowed
//! to fail validation. Once a `WorkflowDefinition` exists it satisfies
//! every structural invariant these types name.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Claude,
    Codex,
}

impl Default for Provider {
    fn default() -> Self {
        Provider::Claude
    }
}

impl Provider {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "claude" => Some(Provider::Claude),
            "codex" => Some(Provider::Codex),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleStep {
    pub command: String,
    #[serde(default)]
    pub clear_context: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParallelBlock {
    pub steps: Vec<SingleStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    Single(SingleStep),
    Parallel(ParallelBlock),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopConfig {
    pub until: String,
    pub max_iterations: u32,
    #[serde(default)]
    pub fresh_context: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepWorkflow {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub provider: Provider,
    #[serde(default)]
    pub model: Option<String>,
    pub steps: Vec<WorkflowStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopWorkflow {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub provider: Provider,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(rename = "loop")]
    pub loop_config: LoopConfig,
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowDefinition {
    Step(StepWorkflow),
    Loop(LoopWorkflow),
}

impl WorkflowDefinition {
    pub fn name(&self) -> &str {
        match self {
            WorkflowDefinition::Step(w) => &w.name,
            WorkflowDefinition::Loop(w) => &w.name,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            WorkflowDefinition::Step(w) => &w.description,
            WorkflowDefinition::Loop(w) => &w.description,
        }
    }

    pub fn provider(&self) -> Provider {
        match self {
            WorkflowDefinition::Step(w) => w.provider,
            WorkflowDefinition::Loop(w) => w.provider,
        }
    }

    pub fn model(&self) -> Option<&str> {
        match self {
            WorkflowDefinition::Step(w) => w.model.as_deref(),
            WorkflowDefinition::Loop(w) => w.model.as_deref(),
        }
    }
}

/// Command-name safety predicate: non-empty, no path separators, no
/// `..` traversal, and must not start with `.`.
pub fn command_name_is_safe(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    if name.starts_with('.') {
        return false;
    }
    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_name_safety_matches_spec_examples() {
        assert!(command_name_is_safe("foo"));
        assert!(!command_name_is_safe("../x"));
        assert!(!command_name_is_safe(".git"));
        assert!(!command_name_is_safe("a/b"));
        assert!(!command_name_is_safe("a\\b"));
        assert!(!command_name_is_safe(""));
    }

    #[test]
    fn provider_defaults_to_claude() {
        assert_eq!(Provider::default(), Provider::Claude);
    }
}
