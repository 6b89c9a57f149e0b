//! Shared wiring passed down into the step/parallel/loop sub-executors;
//! bundles the external collaborators the dispatcher already holds so
//! they don't need threading through every function signature
//! individually.

use crate::assistant::Assistant;
use crate::orchestration::logger::EventLogger;
use crate::orchestration::run_store::RunStore;
use crate::platform::Platform;
use std::path::{Path, PathBuf};

pub struct ExecutorContext<'a> {
    pub platform: &'a dyn Platform,
    pub assistant: &'a dyn Assistant,
    pub run_store: &'a dyn RunStore,
    pub logger: &'a dyn EventLogger,
    pub working_dir: &'a Path,
    pub command_folders: &'a [PathBuf],
}
