//! Provider-specific argument shapes for building a CLI invocation.

use crate::workflow::model::Provider;

#[derive(Debug, Clone)]
pub struct InvocationSpec {
    pub binary: String,
    pub args: Vec<String>,
}

pub fn build_invocation(
    provider: Provider,
    binary: &str,
    model: Option<&str>,
    prompt: &str,
    resume_session_id: Option<&str>,
) -> InvocationSpec {
    match provider {
        Provider::Claude => {
            let mut args = vec!["--dangerously-skip-permissions".to_string(), "--output-format".to_string(), "stream-json".to_string()];
            if let Some(model) = model {
                args.push("--model".to_string());
                args.push(model.to_string());
            }
            if let Some(session_id) = resume_session_id {
                args.push("--resume".to_string());
                args.push(session_id.to_string());
            }
            args.push("-p".to_string());
            args.push(prompt.to_string());
            InvocationSpec {
                binary: binary.to_string(),
                args,
            }
        }
        Provider::Codex => {
            let mut args = vec!["exec".to_string()];
            if let Some(session_id) = resume_session_id {
                args.push("resume".to_string());
                args.push(session_id.to_string());
            }
            if let Some(model) = model {
                args.push("--model".to_string());
                args.push(model.to_string());
            }
            args.push("--skip-git-repo-check".to_string());
            args.push("--dangerously-bypass-approvals-and-sandbox".to_string());
            args.push("--json".to_string());
            args.push(prompt.to_string());
            InvocationSpec {
                binary: binary.to_string(),
                args,
            }
        }
    }
}
