use thiserror::Error;

/// A convenience `Result` alias using [`MetatoolsError`].
pub type MetatoolsResult<T> = Result<T, MetatoolsError>;

/// Top-level error type for metatools.
///
/// Per-item degradations (a schema that cannot be normalized, a result that
/// cannot be stringified) never surface here; they fall back to an empty
/// value at the call site.
#[derive(Error, Debug)]
pub enum MetatoolsError {
    /// Discovery is missing or the agent identity is incomplete.
    #[error("Misconfigured agent: {0}")]
    MisconfiguredAgent(String),

    /// No execution backend is attached to the agent.
    #[error("Runner not configured")]
    NoRunner,

    /// A tool, task, handler or route that does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The caller sent something the operation cannot accept.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A collaborator (discovery, runner backend, task store) failed.
    #[error("Upstream failure: {0}")]
    Upstream(String),

    /// A tool registration was rejected.
    #[error("Registry error: {0}")]
    Registry(String),

    /// Configuration could not be loaded or is invalid.
    #[error("Config error: {0}")]
    Config(String),

    /// The HTTP listener failed to start or crashed while serving.
    #[error("Server error: {0}")]
    Server(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MetatoolsError {
    /// True for errors caused by how this process is set up rather than by
    /// the request, so callers should report them as a server-side fault.
    pub fn is_server_fault(&self) -> bool {
        matches!(
            self,
            MetatoolsError::MisconfiguredAgent(_)
                | MetatoolsError::NoRunner
                | MetatoolsError::Config(_)
                | MetatoolsError::Server(_)
                | MetatoolsError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_fault_classification() {
        assert!(MetatoolsError::NoRunner.is_server_fault());
        assert!(MetatoolsError::MisconfiguredAgent("x".into()).is_server_fault());
        assert!(!MetatoolsError::NotFound("x".into()).is_server_fault());
        assert!(!MetatoolsError::Upstream("x".into()).is_server_fault());
        assert!(!MetatoolsError::InvalidRequest("x".into()).is_server_fault());
    }
}
