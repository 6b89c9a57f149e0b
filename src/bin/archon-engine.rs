//! Thin CLI entry point wiring the stdio platform, the subprocess
//! assistant, and the sqlite run store into one synchronous dispatch —
//! enough to drive the whole engine by hand without a live chat/VCS
//! integration.

use archon::config::EngineConfig;
use archon::orchestration::{parse_invoke_directive, Dispatcher, JsonlEventLogger, SqliteRunStore};
use archon::platform::stdio_platform::StdioPlatform;
use archon::platform::StreamingMode;
use archon::workflow::load_workflows;
use std::path::PathBuf;
use std::process::ExitCode;

fn print_usage() {
    eprintln!(
        "usage: archon-engine [--workflow <name>] [--conversation <id>] [--context <text>] <user message>"
    );
}

struct Args {
    workflow: Option<String>,
    conversation_id: String,
    context: Option<String>,
    user_message: String,
}

fn parse_args(argv: Vec<String>) -> Option<Args> {
    let mut workflow = None;
    let mut conversation_id = None;
    let mut context = None;
    let mut rest = Vec::new();

    let mut iter = argv.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--workflow" => workflow = iter.next(),
            "--conversation" => conversation_id = iter.next(),
            "--context" => context = iter.next(),
            other => rest.push(other.to_string()),
        }
    }

    if rest.is_empty() {
        return None;
    }

    Some(Args {
        workflow,
        conversation_id: conversation_id.unwrap_or_else(|| "cli".to_string()),
        context,
        user_message: rest.join(" "),
    })
}

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_target(false).init();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let Some(args) = parse_args(argv) else {
        print_usage();
        return ExitCode::FAILURE;
    };

    let working_dir = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(err) => {
            eprintln!("failed to determine working directory: {err}");
            return ExitCode::FAILURE;
        }
    };

    let config_path = working_dir.join(".archon").join("config.yaml");
    let config = if config_path.exists() {
        match EngineConfig::load(&config_path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("failed to load {}: {err}", config_path.display());
                return ExitCode::FAILURE;
            }
        }
    } else {
        EngineConfig::default()
    };

    let workflows = load_workflows(&working_dir, &config.workflow_search_paths);
    if workflows.is_empty() {
        eprintln!(
            "no workflows found under {:?} (searched {:?})",
            working_dir, config.workflow_search_paths
        );
        return ExitCode::FAILURE;
    }

    // With no explicit `--workflow`, fall back to routing: the user
    // message may itself already carry a `/invoke-workflow <name>`
    // directive (e.g. pasted from a router response); otherwise default
    // to the first loaded workflow so the CLI stays usable standalone.
    let routed = parse_invoke_directive(&args.user_message, &workflows);
    let Some(workflow) = args
        .workflow
        .as_deref()
        .and_then(|name| workflows.iter().find(|w| w.name() == name))
        .or_else(|| {
            routed
                .workflow_name
                .as_deref()
                .and_then(|name| workflows.iter().find(|w| w.name() == name))
        })
        .or_else(|| workflows.first())
    else {
        eprintln!("workflow `{:?}` not found", args.workflow);
        return ExitCode::FAILURE;
    };
    let user_message = if routed.workflow_name.is_some() {
        routed.remaining_message
    } else {
        args.user_message
    };

    let platform = StdioPlatform::new(StreamingMode::Stream);
    let assistant = archon::assistant::subprocess::SubprocessAssistant::new(workflow.provider(), workflow.model().map(str::to_string));
    let run_store_path = working_dir.join(".archon").join("run_store.sqlite3");
    let run_store = match SqliteRunStore::open(&run_store_path) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("failed to open run store at {}: {err}", run_store_path.display());
            return ExitCode::FAILURE;
        }
    };
    let logger = JsonlEventLogger::new(archon::orchestration::logger::default_log_dir(&working_dir));
    let command_folders: Vec<PathBuf> = config.command_folders(&working_dir);

    let dispatcher = Dispatcher {
        platform: &platform,
        assistant: &assistant,
        run_store: &run_store,
        logger: &logger,
        working_dir: &working_dir,
        command_folders,
    };

    let success = dispatcher.dispatch(
        workflow,
        &args.conversation_id,
        None,
        &user_message,
        args.context.as_deref(),
    );

    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
