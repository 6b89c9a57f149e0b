/// The single error type threaded through loader, router, executor and
/// run-store boundaries. Modeled as one flat enum-of-variants, matching
/// the shape every module-local error type in this crate follows.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("workflow run `{run_id}` not found")]
    UnknownRunId { run_id: String },
    #[error("assistant invocation failed: {0}")]
    Assistant(String),
    #[error("platform delivery failed: {0}")]
    PlatformDelivery(String),
    #[error("git artifact commit failed: {0}")]
    ArtifactCommit(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("json error at {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("run store error: {0}")]
    RunStore(String),
}

impl OrchestratorError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}
