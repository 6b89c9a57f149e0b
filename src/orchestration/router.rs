//! Router. Prompt construction builds an instruction string that embeds
//! structured context; the directive parse uses a tag-scanning style
//! generalized to a case-insensitive multiline regex, since a hand-rolled
//! scanner would just reimplement `regex` poorly.

use crate::workflow::model::WorkflowDefinition;
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Default)]
pub struct RoutingContext {
    pub platform_type: Option<String>,
    pub is_pull_request: Option<bool>,
    pub workflow_type: Option<String>,
    pub title: Option<String>,
    pub labels: Vec<String>,
    pub thread_history: Vec<String>,
}

impl RoutingContext {
    fn is_empty(&self) -> bool {
        self.platform_type.is_none()
            && self.is_pull_request.is_none()
            && self.workflow_type.is_none()
            && self.title.is_none()
            && self.labels.is_empty()
            && self.thread_history.is_empty()
    }
}

/// Builds the routing prompt listing every available workflow plus an
/// optional context section.
pub fn build_routing_prompt(workflows: &[WorkflowDefinition], context: &RoutingContext) -> String {
    let mut sections = Vec::new();

    let mut workflow_lines = String::new();
    for workflow in workflows {
        workflow_lines.push_str(&format!("**{}**\n", workflow.name()));
        for line in workflow.description().lines() {
            workflow_lines.push_str("  ");
            workflow_lines.push_str(line);
            workflow_lines.push('\n');
        }
    }
    sections.push(workflow_lines.trim_end().to_string());

    if !context.is_empty() {
        let mut context_lines = vec!["Context:".to_string()];
        if let Some(platform_type) = &context.platform_type {
            context_lines.push(format!("Platform: {platform_type}"));
        }
        if context.is_pull_request == Some(true) {
            context_lines.push("Type: Pull Request".to_string());
        } else if context.is_pull_request == Some(false) {
            context_lines.push("Type: Issue".to_string());
        } else if let Some(workflow_type) = &context.workflow_type {
            context_lines.push(format!("Type: {workflow_type}"));
        }
        if let Some(title) = &context.title {
            context_lines.push(format!("Title: {title}"));
        }
        if !context.labels.is_empty() {
            context_lines.push(format!("Labels: {}", context.labels.join(", ")));
        }
        if !context.thread_history.is_empty() {
            context_lines.push("Thread history:".to_string());
            for entry in &context.thread_history {
                context_lines.push(format!("  {entry}"));
            }
        }
        sections.push(context_lines.join("\n"));
    }

    sections.push("Respond with exactly one line: /invoke-workflow <name>".to_string());
    sections.join("\n\n")
}

fn invoke_directive_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?im)^/invoke-workflow\s+(\S+)\s*$").expect("static invoke-workflow regex is valid")
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteResult {
    pub workflow_name: Option<String>,
    pub remaining_message: String,
}

/// Scans `text` for the first `/invoke-workflow <name>` directive line
/// and, if the captured name exactly matches a known workflow, returns it
/// plus the text following the matched line. Otherwise the directive is
/// ignored (and logged if the name looked like an attempt) and the
/// original text is returned unchanged.
pub fn parse_invoke_directive(text: &str, workflows: &[WorkflowDefinition]) -> RouteResult {
    let Some(captures) = invoke_directive_regex().captures(text) else {
        return RouteResult {
            workflow_name: None,
            remaining_message: text.to_string(),
        };
    };

    let full_match = captures.get(0).expect("capture group 0 always exists");
    let name = captures.get(1).expect("capture group 1 is required by the pattern").as_str();

    let known = workflows.iter().any(|workflow| workflow.name() == name);
    if !known {
        tracing::warn!(workflow_name = name, "router directive named an unknown workflow");
        return RouteResult {
            workflow_name: None,
            remaining_message: text.to_string(),
        };
    }

    let remaining_message = text[full_match.end()..].trim_start_matches('\n').to_string();
    RouteResult {
        workflow_name: Some(name.to_string()),
        remaining_message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::model::{Provider, StepWorkflow, WorkflowStep, SingleStep};

    fn workflow(name: &str) -> WorkflowDefinition {
        WorkflowDefinition::Step(StepWorkflow {
            name: name.to_string(),
            description: "does things".to_string(),
            provider: Provider::Claude,
            model: None,
            steps: vec![WorkflowStep::Single(SingleStep {
                command: "a".to_string(),
                clear_context: false,
            })],
        })
    }

    #[test]
    fn prompt_lists_workflows_with_indented_description_lines() {
        let workflows = vec![workflow("triage")];
        let prompt = build_routing_prompt(&workflows, &RoutingContext::default());
        assert!(prompt.contains("**triage**"));
        assert!(prompt.contains("  does things"));
        assert!(prompt.contains("/invoke-workflow <name>"));
        assert!(!prompt.contains("Context:"));
    }

    #[test]
    fn prompt_includes_context_section_only_when_populated() {
        let workflows = vec![workflow("triage")];
        let context = RoutingContext {
            is_pull_request: Some(true),
            labels: vec!["bug".to_string()],
            ..Default::default()
        };
        let prompt = build_routing_prompt(&workflows, &context);
        assert!(prompt.contains("Type: Pull Request"));
        assert!(prompt.contains("Labels: bug"));
    }

    #[test]
    fn parses_directive_tolerant_of_leading_analysis_lines() {
        let workflows = vec![workflow("triage")];
        let text = "Looking at this...\n/invoke-workflow triage\nfollow-up note";
        let result = parse_invoke_directive(text, &workflows);
        assert_eq!(result.workflow_name, Some("triage".to_string()));
        assert_eq!(result.remaining_message, "follow-up note");
    }

    #[test]
    fn case_insensitive_directive_still_matches() {
        let workflows = vec![workflow("triage")];
        let text = "/INVOKE-WORKFLOW triage";
        let result = parse_invoke_directive(text, &workflows);
        assert_eq!(result.workflow_name, Some("triage".to_string()));
    }

    #[test]
    fn unknown_workflow_name_is_ignored() {
        let workflows = vec![workflow("triage")];
        let text = "/invoke-workflow ghost";
        let result = parse_invoke_directive(text, &workflows);
        assert_eq!(result.workflow_name, None);
        assert_eq!(result.remaining_message, text);
    }

    #[test]
    fn parser_is_idempotent_on_remaining_message() {
        let workflows = vec![workflow("triage")];
        let first = parse_invoke_directive("/invoke-workflow triage\nrest", &workflows);
        let second = parse_invoke_directive(&first.remaining_message, &workflows);
        assert_eq!(second.workflow_name, None);
        assert_eq!(second.remaining_message, first.remaining_message);
    }

    #[test]
    fn workflow_name_match_is_case_sensitive() {
        let workflows = vec![workflow("Triage")];
        let text = "/invoke-workflow triage";
        let result = parse_invoke_directive(text, &workflows);
        assert_eq!(result.workflow_name, None);
    }
}
