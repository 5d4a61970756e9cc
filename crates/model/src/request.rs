//! Scan request types and validation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of scan a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
    /// Review of a single pull request diff
    Pr,
    /// Review of a full repository snapshot
    Project,
}

impl ScanType {
    /// Wire string for this scan type ("pr" or "project").
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pr => "pr",
            Self::Project => "project",
        }
    }
}

impl std::fmt::Display for ScanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced while validating a scan request.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The repository URL is missing or blank
    #[error("Repository URL is required")]
    MissingRepoUrl,
}

/// An incoming request to review a pull request or a full repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRequest {
    /// Repository URL (https)
    pub repo_url: String,
    /// Kind of scan to run
    pub scan_type: ScanType,
    /// Pull request number, for PR scans
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_id: Option<u64>,
    /// Source branch of the pull request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_branch: Option<String>,
    /// Target branch of the pull request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_branch: Option<String>,
    /// Branch to scan, for project scans
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Opaque per-request options, passed through to agents
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl ScanRequest {
    /// Build a PR scan request.
    #[must_use]
    pub fn pr(repo_url: impl Into<String>, pr_id: u64) -> Self {
        Self {
            repo_url: repo_url.into(),
            scan_type: ScanType::Pr,
            pr_id: Some(pr_id),
            source_branch: None,
            target_branch: None,
            branch: None,
            options: serde_json::Map::new(),
        }
    }

    /// Build a project scan request.
    #[must_use]
    pub fn project(repo_url: impl Into<String>) -> Self {
        Self {
            repo_url: repo_url.into(),
            scan_type: ScanType::Project,
            pr_id: None,
            source_branch: None,
            target_branch: None,
            branch: None,
            options: serde_json::Map::new(),
        }
    }

    /// Validate the request fields.
    ///
    /// # Errors
    /// Returns `RequestError::MissingRepoUrl` when the repository URL is
    /// empty or blank.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.repo_url.trim().is_empty() {
            return Err(RequestError::MissingRepoUrl);
        }
        Ok(())
    }
}
