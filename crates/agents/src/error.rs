//! Error type shared by all agent contracts.

use thiserror::Error;

/// Errors raised by agent implementations.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Diff/file listing failed
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// The remote rejected our credentials
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The repository cache could not produce a working tree
    #[error("cache error: {0}")]
    Cache(String),

    /// No files could be parsed
    #[error("parse failed: {0}")]
    Parse(String),

    /// Static/impact/project analysis failed
    #[error("analysis failed: {0}")]
    Analysis(String),

    /// LLM request failed
    #[error("llm request failed: {0}")]
    Llm(String),

    /// Report assembly failed
    #[error("report generation failed: {0}")]
    Report(String),
}

impl From<store::StoreError> for AgentError {
    fn from(err: store::StoreError) -> Self {
        match err {
            store::StoreError::Auth { url } => {
                Self::Auth(format!("remote rejected credentials: {url}"))
            }
            store::StoreError::UnknownProject(id) => {
                Self::Fetch(format!("unknown project: {id}"))
            }
            other => Self::Cache(other.to_string()),
        }
    }
}
