//! Artifact Committer. Uses a generic spawn/capture/check-exit-status
//! subprocess idiom, applied here to `git status --porcelain`,
//! `git add -A`, `git commit -m`.

use crate::orchestration::error_taxonomy::send_critical_message;
use crate::platform::Platform;
use crate::shared::errors::OrchestratorError;
use std::path::Path;
use std::process::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitOutcome {
    pub committed: bool,
}

fn run_git(cwd: &Path, args: &[&str]) -> Result<std::process::Output, OrchestratorError> {
    Command::new("git")
        .current_dir(cwd)
        .args(args)
        .output()
        .map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => {
                OrchestratorError::ArtifactCommit("git binary not found".to_string())
            }
            _ => OrchestratorError::io(cwd.display().to_string(), err),
        })
}

/// Commits every uncommitted change in `cwd`, if any, under `message`.
pub fn commit_all_changes(cwd: &Path, message: &str) -> Result<CommitOutcome, OrchestratorError> {
    let status = run_git(cwd, &["status", "--porcelain"])?;
    if !status.status.success() {
        return Err(OrchestratorError::ArtifactCommit(format!(
            "git status failed: {}",
            String::from_utf8_lossy(&status.stderr)
        )));
    }
    if status.stdout.is_empty() {
        return Ok(CommitOutcome { committed: false });
    }

    let add = run_git(cwd, &["add", "-A"])?;
    if !add.status.success() {
        return Err(OrchestratorError::ArtifactCommit(format!(
            "git add failed: {}",
            String::from_utf8_lossy(&add.stderr)
        )));
    }

    let commit = run_git(cwd, &["commit", "-m", message])?;
    if !commit.status.success() {
        return Err(OrchestratorError::ArtifactCommit(format!(
            "git commit failed: {}",
            String::from_utf8_lossy(&commit.stderr)
        )));
    }

    Ok(CommitOutcome { committed: true })
}

/// The single "run-teardown" collaborator invoked from every terminal
/// path in the step/loop/parallel executors, so the commit/notify logic
/// isn't duplicated three times.
pub fn finalize_working_tree(
    platform: &dyn Platform,
    conversation_id: &str,
    cwd: &Path,
    workflow_name: &str,
) {
    let message = format!("chore: Auto-commit workflow artifacts ({workflow_name})");
    match commit_all_changes(cwd, &message) {
        Ok(outcome) if outcome.committed && platform.platform_type() != "github" => {
            send_critical_message(
                platform,
                conversation_id,
                "📦 Committed remaining workflow artifacts",
                "artifact_commit",
                2,
            );
        }
        Ok(_) => {}
        Err(err) => {
            send_critical_message(
                platform,
                conversation_id,
                &format!(
                    "⚠️ Could not auto-commit workflow artifacts in `{}`: {err}",
                    cwd.display()
                ),
                "artifact_commit",
                2,
            );
        }
    }
}
