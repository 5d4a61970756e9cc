//! The typed state threaded through every stage of one scan.

use std::collections::BTreeMap;

use agents::{ImpactedEntity, ParsedFile, ProjectScanResult, ReportBundle};
use model::{Finding, ScanRequest};
use serde::{Deserialize, Serialize};

/// Named nodes of the workflow graph plus the terminal/routing tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    StartScan,
    FetchCode,
    ParseCode,
    StaticAnalysis,
    ImpactAnalysis,
    ProjectScanning,
    LlmAnalysis,
    Reporting,
    HandleError,
    Completed,
    Error,
    ErrorHandled,
}

impl Stage {
    /// Wire string of the stage tag.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StartScan => "start_scan",
            Self::FetchCode => "fetch_code",
            Self::ParseCode => "parse_code",
            Self::StaticAnalysis => "static_analysis",
            Self::ImpactAnalysis => "impact_analysis",
            Self::ProjectScanning => "project_scanning",
            Self::LlmAnalysis => "llm_analysis",
            Self::Reporting => "reporting",
            Self::HandleError => "handle_error",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::ErrorHandled => "error_handled",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single value threaded through all stages of one scan.
///
/// Mutated in place by the orchestrator; stages run sequentially, so the
/// state is never shared across concurrent stages within one scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphState {
    /// The originating request, immutable after creation
    pub request: ScanRequest,
    /// Resolved repository URL
    pub repo_url: String,
    /// Resolved pull request id
    pub pr_id: Option<u64>,
    /// Full project files, for project scans and fallback mode
    pub project_code: BTreeMap<String, String>,
    /// Unified diff, for PR scans
    pub pr_diff: Option<String>,
    /// Parse results keyed by path (or the synthetic diff entry)
    pub parsed_asts: BTreeMap<String, ParsedFile>,
    /// Ordered static findings
    pub static_findings: Vec<Finding>,
    /// LLM insight text; empty means "no LLM analysis"
    pub llm_insights: String,
    /// Populated only for project scans
    pub project_scan_result: Option<ProjectScanResult>,
    /// Populated only when a diff was analyzed
    pub impact_result: Option<Vec<ImpactedEntity>>,
    /// Final report bundle (data, markdown, json)
    pub report: Option<ReportBundle>,
    /// Non-empty iff a stage failed
    pub error: Option<String>,
    /// Tag identifying the next edge to take
    pub current_step: Stage,
    /// Cross-stage breadcrumbs (changed files, fallback flag, timestamps)
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl GraphState {
    /// Fresh state positioned at the start node.
    #[must_use]
    pub fn new(request: ScanRequest) -> Self {
        Self {
            repo_url: request.repo_url.clone(),
            pr_id: request.pr_id,
            request,
            project_code: BTreeMap::new(),
            pr_diff: None,
            parsed_asts: BTreeMap::new(),
            static_findings: Vec::new(),
            llm_insights: String::new(),
            project_scan_result: None,
            impact_result: None,
            report: None,
            error: None,
            current_step: Stage::StartScan,
            metadata: BTreeMap::new(),
        }
    }

    /// Set a metadata breadcrumb.
    pub fn set_meta(&mut self, key: &str, value: impl Into<serde_json::Value>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    /// Read a boolean breadcrumb, defaulting to false.
    #[must_use]
    pub fn meta_flag(&self, key: &str) -> bool {
        self.metadata
            .get(key)
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }

    /// Read a string breadcrumb.
    #[must_use]
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(serde_json::Value::as_str)
    }

    /// Whether the scan reached a terminal step.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self.current_step, Stage::Completed | Stage::ErrorHandled)
    }
}
