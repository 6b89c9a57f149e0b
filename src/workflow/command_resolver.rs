//! Command Prompt Resolver.

use crate::workflow::model::command_name_is_safe;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadCommandFailureReason {
    InvalidName,
    EmptyFile,
    NotFound,
    PermissionDenied,
    ReadError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadCommandResult {
    Success { content: String },
    Failure {
        reason: LoadCommandFailureReason,
        message: String,
    },
}

impl LoadCommandResult {
    fn failure(reason: LoadCommandFailureReason, message: impl Into<String>) -> Self {
        LoadCommandResult::Failure {
            reason,
            message: message.into(),
        }
    }
}

/// Resolves a command name to its prompt file content by searching
/// `folders` in order (each joined with `working_dir` unless already
/// absolute). The first folder that contains `<name>.md` wins; read
/// failures on a later folder never mask an earlier success because search
/// stops at the first hit.
pub fn load_command_prompt(
    working_dir: &Path,
    folders: &[PathBuf],
    command_name: &str,
) -> LoadCommandResult {
    if !command_name_is_safe(command_name) {
        return LoadCommandResult::failure(
            LoadCommandFailureReason::InvalidName,
            format!("command name `{command_name}` is not safe"),
        );
    }

    let mut searched = Vec::with_capacity(folders.len());
    for folder in folders {
        let resolved_folder = if folder.is_absolute() {
            folder.clone()
        } else {
            working_dir.join(folder)
        };
        let candidate = resolved_folder.join(format!("{command_name}.md"));
        searched.push(candidate.display().to_string());

        match std::fs::read_to_string(&candidate) {
            Ok(content) => {
                if content.trim().is_empty() {
                    return LoadCommandResult::failure(
                        LoadCommandFailureReason::EmptyFile,
                        format!("command prompt file `{}` is empty", candidate.display()),
                    );
                }
                return LoadCommandResult::Success { content };
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
            Err(err) if err.kind() == std::io::ErrorKind::PermissionDenied => {
                return LoadCommandResult::failure(
                    LoadCommandFailureReason::PermissionDenied,
                    format!("permission denied reading `{}`: {err}", candidate.display()),
                );
            }
            Err(err) => {
                return LoadCommandResult::failure(
                    LoadCommandFailureReason::ReadError,
                    format!("failed to read `{}`: {err}", candidate.display()),
                );
            }
        }
    }

    LoadCommandResult::failure(
        LoadCommandFailureReason::NotFound,
        format!(
            "command `{command_name}` not found; searched: {}",
            searched.join(", ")
        ),
    )
}
