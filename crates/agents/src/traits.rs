//! Contracts the orchestrator speaks to analysis agents through.
//!
//! Implementations may use whatever concurrency they like internally; to the
//! orchestrator each operation is a plain async call.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::{Finding, ReportDetail, ScanStatus, ScanType};
use serde::{Deserialize, Serialize};

use crate::diff::changed_files_from_diff;
use crate::error::AgentError;

/// What a parsed entry was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseKind {
    /// A source file
    Source,
    /// A synthetic entry summarizing a unified diff
    Diff,
}

/// Structural outline of one parsed entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuralSummary {
    pub classes: Vec<String>,
    pub functions: Vec<String>,
    pub imports: Vec<String>,
}

/// A parsed entry: the analyzed text plus its structural summary.
///
/// The text stands in for the opaque tree handle; the analyzer re-scans it
/// with its own rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedFile {
    pub kind: ParseKind,
    /// The text the summary was derived from
    pub source: String,
    pub summary: StructuralSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ParsedFile {
    /// The synthetic entry used when a diff cannot be split into files.
    #[must_use]
    pub fn diff_summary(diff: &str) -> Self {
        Self {
            kind: ParseKind::Diff,
            source: diff.to_string(),
            summary: StructuralSummary::default(),
            note: Some("unified diff; individual files were not extracted".to_string()),
        }
    }
}

/// Key under which the synthetic diff entry is stored in the parse map.
pub const DIFF_SUMMARY_KEY: &str = "diff_summary";

/// Fetches diffs and file trees for a repository.
#[async_trait]
pub trait CodeFetcher: Send + Sync {
    /// Unified diff of a pull request.
    async fn get_pr_diff(
        &self,
        repo_url: &str,
        pr_id: u64,
        target_branch: Option<&str>,
        source_branch: Option<&str>,
    ) -> Result<String, AgentError>;

    /// Full file map of a repository at a branch.
    async fn get_project_files(
        &self,
        repo_url: &str,
        branch: Option<&str>,
    ) -> Result<BTreeMap<String, String>, AgentError>;

    /// Paths touched by a unified diff, in order of appearance.
    fn get_changed_files_from_diff(&self, diff: &str) -> Vec<String> {
        changed_files_from_diff(diff)
    }
}

/// Parses source files into structural summaries.
#[async_trait]
pub trait AstParser: Send + Sync {
    /// Parse a file map. Binary and unsupported files are skipped, never
    /// failing the batch.
    async fn parse(
        &self,
        files: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, ParsedFile>, AgentError>;
}

/// Runs static rules over parsed entries.
#[async_trait]
pub trait StaticAnalyzer: Send + Sync {
    /// May return an empty list; rule ids are stable strings.
    async fn analyze(
        &self,
        parsed: &BTreeMap<String, ParsedFile>,
    ) -> Result<Vec<Finding>, AgentError>;
}

/// Produces natural-language review insights.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Review a PR diff. An empty return means "no LLM analysis".
    async fn analyze_pr_diff(&self, diff: &str, findings: &[Finding])
        -> Result<String, AgentError>;

    /// Review a set of project files.
    async fn analyze_code(
        &self,
        files: &BTreeMap<String, String>,
        findings: &[Finding],
    ) -> Result<String, AgentError>;
}

/// Result of a project-wide scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectScanResult {
    pub complexity_metrics: risk::CodeMetrics,
    pub risk_assessment: risk::RiskAssessment,
    pub recommendations: Vec<risk::Recommendation>,
    pub architectural_analysis: String,
}

/// Scans a whole project for metrics, risk and architecture.
#[async_trait]
pub trait ProjectScanner: Send + Sync {
    async fn scan_entire_project(
        &self,
        files: &BTreeMap<String, String>,
        findings: &[Finding],
    ) -> Result<ProjectScanResult, AgentError>;
}

/// How far a change propagated to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ImpactLevel {
    Direct,
    Indirect,
}

/// An entity affected by a change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactedEntity {
    pub name: String,
    /// Entity kind ("file" for the built-in analyzer)
    pub kind: String,
    pub level: ImpactLevel,
    /// First (shortest) path the impact was discovered through
    pub propagation_path: Vec<String>,
}

/// Dependency edges between files: key depends-on nothing here; the map goes
/// from a file to the files that depend on it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencyGraph {
    dependents: BTreeMap<String, Vec<String>>,
}

impl DependencyGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `dependent` depends on `file`.
    pub fn add_dependent(&mut self, file: impl Into<String>, dependent: impl Into<String>) {
        let dependent = dependent.into();
        let entry = self.dependents.entry(file.into()).or_default();
        if !entry.contains(&dependent) {
            entry.push(dependent);
        }
    }

    /// Files that depend on `file`.
    #[must_use]
    pub fn dependents_of(&self, file: &str) -> &[String] {
        self.dependents.get(file).map_or(&[], Vec::as_slice)
    }

    /// Build edges from parsed structural summaries by resolving import
    /// names against file stems and dotted module paths.
    #[must_use]
    pub fn from_summaries(parsed: &BTreeMap<String, ParsedFile>) -> Self {
        let mut keys: BTreeMap<String, String> = BTreeMap::new();
        for path in parsed.keys() {
            for key in module_keys(path) {
                keys.entry(key).or_insert_with(|| path.clone());
            }
        }

        let mut graph = Self::new();
        for (path, entry) in parsed {
            for import in &entry.summary.imports {
                let target = keys
                    .get(import)
                    .or_else(|| {
                        let last = import
                            .rsplit(|c| c == '.' || c == ':' || c == '/')
                            .next()
                            .unwrap_or(import);
                        keys.get(last)
                    })
                    .cloned();
                if let Some(target) = target {
                    if &target != path {
                        graph.add_dependent(target, path.clone());
                    }
                }
            }
        }
        graph
    }
}

/// Module-name keys a file can be imported under.
fn module_keys(path: &str) -> Vec<String> {
    let without_ext = path.rsplit_once('.').map_or(path, |(stem, _)| stem);
    let mut keys = vec![without_ext.replace('/', ".")];
    if let Some(stem) = without_ext.rsplit('/').next() {
        keys.push(stem.to_string());
    }
    keys
}

/// Analyzes change impact over a dependency graph.
#[async_trait]
pub trait ImpactAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        diff: &str,
        graph: &DependencyGraph,
        changed_files: &[String],
    ) -> Result<Vec<ImpactedEntity>, AgentError>;
}

/// Everything the reporter needs besides findings and insights.
#[derive(Debug, Clone)]
pub struct ScanDetails {
    pub scan_id: String,
    pub repository: String,
    pub pr_id: Option<u64>,
    pub branch: Option<String>,
    pub scan_type: ScanType,
    pub scan_status: ScanStatus,
    pub error_message: Option<String>,
    pub agent_versions: BTreeMap<String, String>,
    pub total_files_analyzed: usize,
    pub successful_parses: usize,
    /// Structural summaries for diagram generation, when available
    pub structural_summaries: BTreeMap<String, StructuralSummary>,
    /// Timestamp stamped into the report; passing it in keeps generation pure
    pub generated_at: DateTime<Utc>,
}

/// A generated report in all three forms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportBundle {
    pub report: ReportDetail,
    pub markdown: String,
    pub json: String,
}

/// Renders the final report.
#[async_trait]
pub trait Reporter: Send + Sync {
    /// Must succeed on empty inputs.
    async fn generate(
        &self,
        findings: &[Finding],
        insights: &str,
        details: &ScanDetails,
    ) -> Result<ReportBundle, AgentError>;
}
