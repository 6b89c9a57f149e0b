//! A parallel block where one sub-step fails must report every failure
//! and must not run the step that follows the block.

#[path = "support/mod.rs"]
mod support;

use archon::orchestration::{Dispatcher, RunState, SqliteRunStore};
use archon::platform::test_platform::TestPlatform;
use archon::workflow::model::{
    ParallelBlock, Provider, SingleStep, StepWorkflow, WorkflowDefinition, WorkflowStep,
};
use support::{text_then_result, CapturingLogger, KeyedFakeAssistant, RecordingRunStore, ScriptedOutcome};
use tempfile::tempdir;

fn write_prompt(folder: &std::path::Path, name: &str, content: &str) {
    std::fs::create_dir_all(folder).expect("mkdir");
    std::fs::write(folder.join(format!("{name}.md")), content).expect("write prompt");
}

#[test]
fn one_failing_sub_step_fails_the_run_and_reports_every_failure() {
    let dir = tempdir().expect("tempdir");
    let commands_folder = dir.path().join("commands");
    for name in ["scope", "r1", "r2", "r3", "agg"] {
        write_prompt(&commands_folder, name, &format!("prompt for {name}"));
    }

    let workflow = WorkflowDefinition::Step(StepWorkflow {
        name: "review".to_string(),
        description: "scope, fan out, aggregate".to_string(),
        provider: Provider::Claude,
        model: None,
        steps: vec![
            WorkflowStep::Single(SingleStep { command: "scope".to_string(), clear_context: false }),
            WorkflowStep::Parallel(ParallelBlock {
                steps: vec![
                    SingleStep { command: "r1".to_string(), clear_context: false },
                    SingleStep { command: "r2".to_string(), clear_context: false },
                    SingleStep { command: "r3".to_string(), clear_context: false },
                ],
            }),
            WorkflowStep::Single(SingleStep { command: "agg".to_string(), clear_context: false }),
        ],
    });

    let assistant = KeyedFakeAssistant::new(vec![
        ("prompt for scope", ScriptedOutcome::Events(text_then_result(&["scoped"], Some("sess-scope")))),
        ("prompt for r1", ScriptedOutcome::Events(text_then_result(&["r1 done"], Some("sess-r1")))),
        ("prompt for r2", ScriptedOutcome::Error("Step B: rate limit".to_string())),
        ("prompt for r3", ScriptedOutcome::Events(text_then_result(&["r3 done"], Some("sess-r3")))),
        ("prompt for agg", ScriptedOutcome::Events(text_then_result(&["aggregated"], Some("sess-agg")))),
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
        command_folders: vec![commands_folder],
    };

    let success = dispatcher.dispatch(&workflow, "conv-3", None, "review this", None);
    assert!(!success);

    // agg must never have been invoked.
    let calls = assistant.calls();
    assert!(calls.iter().all(|c| !c.prompt.contains("prompt for agg")));
    assert_eq!(calls.len(), 4); // scope + r1 + r2 + r3, no agg

    let run_id = run_store.last_created_run_id().expect("a run was created");
    let run = run_store.load_run(&run_id).expect("load run");
    assert_eq!(run.status, RunState::Failed);

    let sent = platform.sent_messages();
    let failure_message = sent
        .iter()
        .find(|(_, text)| text.contains("parallel block had failures"))
        .expect("failure message sent");
    assert!(failure_message.1.contains("`r2`"));
    assert!(failure_message.1.contains("rate limit"));
}
