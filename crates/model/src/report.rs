//! Report DTOs returned to callers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::finding::Finding;
use crate::request::ScanType;

/// Version string stamped into every generated report.
pub const REPORT_VERSION: &str = "1.0.0";

/// Lifecycle status of a scan as seen by report consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Pending,
    InProgress,
    Completed,
    Error,
    Cancelled,
}

/// Identity block of a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanInfo {
    /// Scan identifier
    pub scan_id: String,
    /// Repository URL
    pub repository: String,
    /// Pull request number, for PR scans
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_id: Option<u64>,
    /// Branch that was scanned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Kind of scan
    pub scan_type: ScanType,
    /// When the report was generated
    pub timestamp: DateTime<Utc>,
    /// Report format version
    pub report_version: String,
}

/// Aggregated counts over the findings of one scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Total number of findings
    pub total_findings: usize,
    /// Findings per severity
    pub severity_breakdown: BTreeMap<String, usize>,
    /// Findings per category
    pub category_breakdown: BTreeMap<String, usize>,
    /// Status of the scan the report describes
    pub scan_status: ScanStatus,
    /// Whether LLM insights are present
    pub has_llm_analysis: bool,
    /// Error message, for error reports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ScanSummary {
    /// Build a summary from a findings list.
    ///
    /// The breakdown maps always sum to `findings.len()`.
    #[must_use]
    pub fn from_findings(findings: &[Finding], status: ScanStatus, has_llm: bool) -> Self {
        let mut severity_breakdown = BTreeMap::new();
        let mut category_breakdown = BTreeMap::new();
        for finding in findings {
            *severity_breakdown
                .entry(finding.severity.as_str().to_string())
                .or_insert(0) += 1;
            *category_breakdown
                .entry(finding.category.clone())
                .or_insert(0) += 1;
        }
        Self {
            total_findings: findings.len(),
            severity_breakdown,
            category_breakdown,
            scan_status: status,
            has_llm_analysis: has_llm,
            error_message: None,
        }
    }

    /// Build the summary of an error report.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            total_findings: 0,
            severity_breakdown: BTreeMap::new(),
            category_breakdown: BTreeMap::new(),
            scan_status: ScanStatus::Error,
            has_llm_analysis: false,
            error_message: Some(message.into()),
        }
    }
}

/// LLM-derived insight block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmReview {
    /// Raw insight text (markdown)
    pub insights: String,
    /// Whether the review contains meaningful content
    pub has_content: bool,
    /// Parsed sections of the review, when available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sections: Option<BTreeMap<String, String>>,
}

impl LlmReview {
    /// Wrap raw insight text, flagging empty text as no content.
    #[must_use]
    pub fn from_insights(insights: impl Into<String>) -> Self {
        let insights = insights.into();
        let has_content = !insights.trim().is_empty();
        Self {
            insights,
            has_content,
            sections: None,
        }
    }
}

/// A generated diagram attached to a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagramData {
    /// Diagram kind (e.g. "class_diagram", "component_diagram")
    #[serde(rename = "type")]
    pub diagram_type: String,
    /// Rendering format (e.g. "plantuml", "mermaid")
    pub format: String,
    /// Diagram source text
    pub content: String,
    /// Display title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Longer description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Generation metadata attached to a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanMetadata {
    /// Version of each agent that participated
    pub agent_versions: BTreeMap<String, String>,
    /// When report generation finished
    pub generation_time: DateTime<Utc>,
    /// Number of files handed to the parser
    pub total_files_analyzed: usize,
    /// Number of files that parsed successfully
    pub successful_parses: usize,
    /// Error recorded during generation, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A complete scan report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportDetail {
    pub scan_info: ScanInfo,
    pub summary: ScanSummary,
    pub static_analysis_findings: Vec<Finding>,
    pub llm_review: LlmReview,
    pub diagrams: Vec<DiagramData>,
    pub metadata: ScanMetadata,
}
