//! A loop that completes on a detected signal, and one that exhausts
//! its iteration budget without ever emitting it.

#[path = "support/mod.rs"]
mod support;

use archon::orchestration::{Dispatcher, RunState, SqliteRunStore};
use archon::platform::test_platform::TestPlatform;
use archon::workflow::model::{LoopConfig, LoopWorkflow, Provider, WorkflowDefinition};
use support::{text_then_result, CapturingLogger, FakeAssistant, RecordingRunStore};
use tempfile::tempdir;

fn loop_workflow(name: &str, until: &str, max_iterations: u32) -> WorkflowDefinition {
    WorkflowDefinition::Loop(LoopWorkflow {
        name: name.to_string(),
        description: "ralph loop".to_string(),
        provider: Provider::Claude,
        model: None,
        loop_config: LoopConfig {
            until: until.to_string(),
            max_iterations,
            fresh_context: false,
        },
        prompt: "do the thing".to_string(),
    })
}

#[test]
fn loop_completes_when_signal_is_detected_and_records_iteration_count() {
    let dir = tempdir().expect("tempdir");
    let workflow = loop_workflow("ralph", "COMPLETE", 10);

    let assistant = FakeAssistant::new(vec![
        text_then_result(&["working..."], Some("s1")),
        text_then_result(&["still working..."], Some("s2")),
        text_then_result(&["All done <promise>COMPLETE</promise>"], Some("s3")),
    ]);
    let platform = TestPlatform::streaming();
    let run_store = RecordingRunStore::new(SqliteRunStore::open_in_memory().expect("open store"));
    let logger = CapturingLogger::new();

    let dispatcher = Dispatcher {
        platform: &platform,
        assistant: &assistant,
        run_store: &run_store,
        logger: &logger,
        working_dir: dir.path(),
        command_folders: vec![],
    };

    let success = dispatcher.dispatch(&workflow, "conv-loop-1", None, "go", None);
    assert!(success);
    assert_eq!(assistant.calls().len(), 3);

    let run_id = run_store.last_created_run_id().expect("a run was created");
    let run = run_store.load_run(&run_id).expect("load run");
    assert_eq!(run.status, RunState::Completed);
    assert_eq!(
        run.metadata.get("iteration_count").and_then(|v| v.as_u64()),
        Some(3)
    );
    assert_eq!(
        run.metadata.get("max_iterations").and_then(|v| v.as_u64()),
        Some(10)
    );
}

#[test]
fn loop_exhaustion_fails_after_exactly_max_iterations_with_remediation_hints() {
    let dir = tempdir().expect("tempdir");
    let workflow = loop_workflow("ralph", "COMPLETE", 3);

    let assistant = FakeAssistant::new(vec![
        text_then_result(&["working..."], Some("s1")),
        text_then_result(&["still working..."], Some("s2")),
        text_then_result(&["almost..."], Some("s3")),
    ]);
    let platform = TestPlatform::streaming();
    let run_store = RecordingRunStore::new(SqliteRunStore::open_in_memory().expect("open store"));
    let logger = CapturingLogger::new();

    let dispatcher = Dispatcher {
        platform: &platform,
        assistant: &assistant,
        run_store: &run_store,
        logger: &logger,
        working_dir: dir.path(),
        command_folders: vec![],
    };

    let success = dispatcher.dispatch(&workflow, "conv-loop-2", None, "go", None);
    assert!(!success);
    assert_eq!(assistant.calls().len(), 3);

    let run_id = run_store.last_created_run_id().expect("a run was created");
    let run = run_store.load_run(&run_id).expect("load run");
    assert_eq!(run.status, RunState::Failed);

    let sent = platform.sent_messages();
    let exhaustion_message = sent
        .iter()
        .find(|(_, text)| text.contains("Loop incomplete"))
        .expect("exhaustion message sent");
    assert!(exhaustion_message.1.contains("max_iterations"));
    assert!(exhaustion_message.1.contains("COMPLETE"));
    assert!(exhaustion_message.1.contains(&format!("{run_id}.jsonl")));
}

#[test]
fn plain_signal_detection_does_not_fire_on_negated_mentions() {
    assert!(!archon::orchestration::detect_completion_signal(
        "The task is not COMPLETE yet.",
        "COMPLETE"
    ));
    assert!(archon::orchestration::detect_completion_signal(
        "All done COMPLETE",
        "COMPLETE"
    ));
}
