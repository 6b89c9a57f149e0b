//! An active run whose last activity is more than 15 minutes old is
//! reclaimed as stale and a new run proceeds in its place.

#[path = "support/mod.rs"]
mod support;

use archon::orchestration::run_store::CreateWorkflowRunParams;
use archon::orchestration::{Dispatcher, RunState, RunStore, SqliteRunStore};
use archon::platform::test_platform::TestPlatform;
use archon::workflow::model::{Provider, SingleStep, StepWorkflow, WorkflowDefinition, WorkflowStep};
use serde_json::Map;
use support::{text_then_result, CapturingLogger, FakeAssistant, RecordingRunStore};
use tempfile::tempdir;

#[test]
fn stale_active_run_is_reclaimed_and_a_new_run_proceeds() {
    let dir = tempdir().expect("tempdir");
    let commands_folder = dir.path().join("commands");
    std::fs::create_dir_all(&commands_folder).expect("mkdir");
    std::fs::write(commands_folder.join("a.md"), "P1").expect("write prompt");

    let store = SqliteRunStore::open_in_memory().expect("open store");
    let now = archon::shared::ids::now_secs();
    let stale_started_at = now - 20 * 60;
    let stale_run = store
        .create_workflow_run(
            CreateWorkflowRunParams {
                workflow_name: "old-wf".to_string(),
                conversation_id: "conv-stale".to_string(),
                codebase_id: None,
                user_message: "earlier message".to_string(),
                metadata: Map::new(),
            },
            stale_started_at,
        )
        .expect("seed a stale running run");

    let run_store = RecordingRunStore::new(store);
    let workflow = WorkflowDefinition::Step(StepWorkflow {
        name: "new-wf".to_string(),
        description: "one step".to_string(),
        provider: Provider::Claude,
        model: None,
        steps: vec![WorkflowStep::Single(SingleStep {
            command: "a".to_string(),
            clear_context: false,
        })],
    });

    let assistant = FakeAssistant::new(vec![text_then_result(&["ok"], Some("sess-1"))]);
    let platform = TestPlatform::streaming();
    let logger = CapturingLogger::new();

    let dispatcher = Dispatcher {
        platform: &platform,
        assistant: &assistant,
        run_store: &run_store,
        logger: &logger,
        working_dir: dir.path(),
        command_folders: vec![commands_folder],
    };

    let success = dispatcher.dispatch(&workflow, "conv-stale", None, "go again", None);
    assert!(success);

    let old_run = run_store.load_run(&stale_run.id).expect("load stale run");
    assert_eq!(old_run.status, RunState::Failed);

    let new_run_id = run_store
        .created_run_ids()
        .into_iter()
        .find(|id| id != &stale_run.id)
        .expect("a new run was created");
    let new_run = run_store.load_run(&new_run_id).expect("load new run");
    assert_eq!(new_run.status, RunState::Completed);
    assert_eq!(new_run.workflow_name, "new-wf");

    // The new run's own startup notification still went out normally —
    // reclaiming the stale run did not block the new dispatch.
    let sent = platform.sent_messages();
    assert!(sent.iter().any(|(_, text)| text.contains("Starting workflow `new-wf`")));
}
