//! Error taxonomy for the engine.

use thiserror::Error;

/// Errors surfaced by the orchestrator, queue and service glue.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Request fields missing or malformed. Non-retryable.
    #[error("{0}")]
    Validation(String),

    /// Clone/pull/diff/file listing failed after all fallbacks
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// No files could be parsed
    #[error("parse failed: {0}")]
    Parse(String),

    /// An analysis agent failed; fatal for the scan
    #[error("stage {stage}: {message}")]
    Analysis { stage: String, message: String },

    /// Repository cache failure
    #[error("cache error: {0}")]
    Cache(String),

    /// Authentication rejected by the remote
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The scan was cancelled between stages; no report is produced
    #[error("scan cancelled")]
    Cancelled,

    /// No job or report under the given id
    #[error("not found: {0}")]
    NotFound(String),

    /// Unclassified failure caught at a stage boundary
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Wrap an agent error for a named stage.
    #[must_use]
    pub fn analysis(stage: &str, err: &agents::AgentError) -> Self {
        Self::Analysis {
            stage: stage.to_string(),
            message: err.to_string(),
        }
    }
}
