//! Variable Substitution.

const CONTEXT_PLACEHOLDERS: [&str; 3] = ["$CONTEXT", "$EXTERNAL_CONTEXT", "$ISSUE_CONTEXT"];
const CONTEXT_APPEND_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutionResult {
    pub text: String,
    /// True iff a context placeholder was present in the template AND
    /// context was provided — callers must not also append raw context
    /// in that case (would duplicate it).
    pub context_substituted: bool,
}

/// Applies the fixed placeholder set to `template`. `workflow_id` and
/// `user_message` are always substituted; `issue_context` only replaces
/// `$CONTEXT`/`$EXTERNAL_CONTEXT`/`$ISSUE_CONTEXT` if at least one of them
/// is present in the template.
pub fn substitute_variables(
    template: &str,
    workflow_id: &str,
    user_message: &str,
    issue_context: Option<&str>,
) -> SubstitutionResult {
    let mut text = template.replace("$WORKFLOW_ID", workflow_id);
    text = text.replace("$USER_MESSAGE", user_message);
    text = text.replace("$ARGUMENTS", user_message);

    let template_has_context_placeholder = CONTEXT_PLACEHOLDERS
        .iter()
        .any(|placeholder| template.contains(placeholder));

    let context_substituted = template_has_context_placeholder && issue_context.is_some();

    if template_has_context_placeholder {
        let replacement = match issue_context {
            Some(context) => context,
            None => {
                tracing::debug!("context placeholder present but no context was provided");
                ""
            }
        };
        for placeholder in CONTEXT_PLACEHOLDERS {
            text = text.replace(placeholder, replacement);
        }
    }

    SubstitutionResult {
        text,
        context_substituted,
    }
}

/// Central policy enforcing "don't duplicate context": append raw context
/// only when the template did not already consume it via a placeholder.
pub fn render_prompt_with_context(
    template: &str,
    workflow_id: &str,
    user_message: &str,
    issue_context: Option<&str>,
) -> String {
    let result = substitute_variables(template, workflow_id, user_message, issue_context);
    match issue_context {
        Some(context) if !result.context_substituted => {
            format!("{}{CONTEXT_APPEND_SEPARATOR}{context}", result.text)
        }
        _ => result.text,
    }
}
