//! Report assembly: structured detail, markdown and JSON.

use async_trait::async_trait;
use model::{
    DiagramData, Finding, LlmReview, ReportDetail, ScanInfo, ScanMetadata, ScanSummary,
    REPORT_VERSION,
};

use crate::error::AgentError;
use crate::traits::{ReportBundle, Reporter, ScanDetails, StructuralSummary};

/// Built-in reporter. Pure: the same inputs produce byte-identical output.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownReporter;

impl MarkdownReporter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Reporter for MarkdownReporter {
    async fn generate(
        &self,
        findings: &[Finding],
        insights: &str,
        details: &ScanDetails,
    ) -> Result<ReportBundle, AgentError> {
        let llm_review = LlmReview::from_insights(insights);
        let mut summary =
            ScanSummary::from_findings(findings, details.scan_status, llm_review.has_content);
        summary.error_message = details.error_message.clone();

        let diagrams = component_diagram(&details.structural_summaries)
            .into_iter()
            .collect();

        let report = ReportDetail {
            scan_info: ScanInfo {
                scan_id: details.scan_id.clone(),
                repository: details.repository.clone(),
                pr_id: details.pr_id,
                branch: details.branch.clone(),
                scan_type: details.scan_type,
                timestamp: details.generated_at,
                report_version: REPORT_VERSION.to_string(),
            },
            summary,
            static_analysis_findings: findings.to_vec(),
            llm_review,
            diagrams,
            metadata: ScanMetadata {
                agent_versions: details.agent_versions.clone(),
                generation_time: details.generated_at,
                total_files_analyzed: details.total_files_analyzed,
                successful_parses: details.successful_parses,
                error: details.error_message.clone(),
            },
        };

        let markdown = render_markdown(&report);
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| AgentError::Report(e.to_string()))?;

        Ok(ReportBundle {
            report,
            markdown,
            json,
        })
    }
}

fn render_markdown(report: &ReportDetail) -> String {
    let mut out = String::new();
    out.push_str("# Code Review Report\n\n");

    out.push_str(&format!(
        "- **Repository**: {}\n- **Scan**: {} ({})\n",
        report.scan_info.repository, report.scan_info.scan_id, report.scan_info.scan_type
    ));
    if let Some(pr_id) = report.scan_info.pr_id {
        out.push_str(&format!("- **Pull request**: #{pr_id}\n"));
    }
    if let Some(branch) = &report.scan_info.branch {
        out.push_str(&format!("- **Branch**: {branch}\n"));
    }
    out.push_str(&format!(
        "- **Generated**: {}\n\n",
        report.scan_info.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    out.push_str("## Summary\n\n");
    if let Some(error) = &report.summary.error_message {
        out.push_str(&format!("The scan failed: {error}\n\n"));
    }
    out.push_str(&format!(
        "{} findings across {} files.\n\n",
        report.summary.total_findings, report.metadata.total_files_analyzed
    ));
    for (severity, count) in &report.summary.severity_breakdown {
        out.push_str(&format!("- {severity}: {count}\n"));
    }
    if !report.summary.severity_breakdown.is_empty() {
        out.push('\n');
    }

    if !report.static_analysis_findings.is_empty() {
        out.push_str("## Findings\n\n");
        for finding in &report.static_analysis_findings {
            out.push_str(&format!(
                "- **{}** `{}` {}:{} - {}\n",
                finding.severity, finding.rule_id, finding.file, finding.line, finding.message
            ));
            if let Some(suggestion) = &finding.suggestion {
                out.push_str(&format!("  - Suggestion: {suggestion}\n"));
            }
        }
        out.push('\n');
    }

    if report.llm_review.has_content {
        out.push_str("## AI Review\n\n");
        out.push_str(&report.llm_review.insights);
        if !report.llm_review.insights.ends_with('\n') {
            out.push('\n');
        }
        out.push('\n');
    }

    for diagram in &report.diagrams {
        if let Some(title) = &diagram.title {
            out.push_str(&format!("## {title}\n\n"));
        }
        out.push_str(&format!("```{}\n{}\n```\n\n", diagram.format, diagram.content));
    }

    out
}

/// PlantUML class diagram from structural summaries, when any classes
/// were found. One block per file keeps the overview readable.
fn component_diagram(
    summaries: &std::collections::BTreeMap<String, StructuralSummary>,
) -> Option<DiagramData> {
    let mut body = String::new();
    for summary in summaries.values() {
        let Some(class) = summary.classes.first() else {
            continue;
        };
        body.push_str(&format!("class {class} {{\n"));
        for function in summary.functions.iter().take(8) {
            body.push_str(&format!("    +{function}()\n"));
        }
        body.push_str("}\n");
    }
    if body.is_empty() {
        return None;
    }

    Some(DiagramData {
        diagram_type: "class_diagram".to_string(),
        format: "plantuml".to_string(),
        content: format!("@startuml\n{body}@enduml"),
        title: Some("Class Diagram - Core Components".to_string()),
        description: Some(
            "Overview of main classes detected in the analyzed code".to_string(),
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use model::{ScanStatus, ScanType, Severity};
    use std::collections::BTreeMap;

    fn details() -> ScanDetails {
        ScanDetails {
            scan_id: "pr_abc123".to_string(),
            repository: "https://github.com/o/r".to_string(),
            pr_id: Some(42),
            branch: None,
            scan_type: ScanType::Pr,
            scan_status: ScanStatus::Completed,
            error_message: None,
            agent_versions: BTreeMap::from([(
                "reporter".to_string(),
                "1.0.0".to_string(),
            )]),
            total_files_analyzed: 2,
            successful_parses: 2,
            structural_summaries: BTreeMap::new(),
            generated_at: chrono::Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        }
    }

    fn finding() -> Finding {
        Finding {
            rule_id: "PRINT_STATEMENT_FOUND".to_string(),
            message: "print() statement found - use logging instead".to_string(),
            file: "src/m.py".to_string(),
            line: 3,
            column: 1,
            severity: Severity::Info,
            category: "logging".to_string(),
            suggestion: Some("Use logger.info".to_string()),
        }
    }

    #[tokio::test]
    async fn test_markdown_has_report_heading_and_findings() {
        let reporter = MarkdownReporter::new();
        let bundle = reporter
            .generate(&[finding()], "Looks fine.", &details())
            .await
            .unwrap();

        assert!(bundle.markdown.contains("Code Review Report"));
        assert!(bundle.markdown.contains("PRINT_STATEMENT_FOUND"));
        assert!(bundle.report.llm_review.has_content);
        assert_eq!(bundle.report.summary.total_findings, 1);
    }

    #[tokio::test]
    async fn test_generate_is_pure() {
        let reporter = MarkdownReporter::new();
        let findings = vec![finding()];
        let details = details();
        let a = reporter.generate(&findings, "insight", &details).await.unwrap();
        let b = reporter.generate(&findings, "insight", &details).await.unwrap();
        assert_eq!(a.markdown, b.markdown);
        assert_eq!(a.json, b.json);
    }

    #[tokio::test]
    async fn test_generate_accepts_empty_inputs() {
        let reporter = MarkdownReporter::new();
        let bundle = reporter.generate(&[], "", &details()).await.unwrap();
        assert_eq!(bundle.report.summary.total_findings, 0);
        assert!(!bundle.report.llm_review.has_content);
        assert!(bundle.markdown.contains("Code Review Report"));
    }

    #[tokio::test]
    async fn test_diagram_from_summaries() {
        let mut details = details();
        details.structural_summaries.insert(
            "src/app.py".to_string(),
            StructuralSummary {
                classes: vec!["App".to_string()],
                functions: vec!["run".to_string()],
                imports: vec![],
            },
        );
        let reporter = MarkdownReporter::new();
        let bundle = reporter.generate(&[], "", &details).await.unwrap();
        assert_eq!(bundle.report.diagrams.len(), 1);
        let diagram = &bundle.report.diagrams[0];
        assert_eq!(diagram.format, "plantuml");
        assert!(diagram.content.contains("class App"));
        assert!(bundle.markdown.contains("@startuml"));
    }

    #[tokio::test]
    async fn test_error_report_carries_message() {
        let mut details = details();
        details.scan_status = ScanStatus::Error;
        details.error_message = Some("Repository URL is required".to_string());
        let reporter = MarkdownReporter::new();
        let bundle = reporter.generate(&[], "", &details).await.unwrap();
        assert_eq!(bundle.report.summary.scan_status, ScanStatus::Error);
        assert!(bundle.markdown.contains("Repository URL is required"));
    }
}
