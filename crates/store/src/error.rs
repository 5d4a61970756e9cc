//! Error types for the store crate.

use thiserror::Error;

use crate::project::ProjectId;

/// Errors raised by the registry, vault and cache.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The project id is not registered
    #[error("unknown project: {0}")]
    UnknownProject(ProjectId),

    /// Token vault failure (key material, encryption)
    #[error("token vault error: {0}")]
    Vault(String),

    /// Cache bookkeeping or disk failure
    #[error("cache error: {0}")]
    Cache(String),

    /// The remote rejected our credentials
    #[error("authentication rejected by remote: {url}")]
    Auth { url: String },

    /// A git subprocess failed
    #[error("git {op} failed: {detail}")]
    Git { op: String, detail: String },

    /// The remote HEAD probe failed
    #[error("remote probe failed: {0}")]
    Probe(String),

    /// Filesystem failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
