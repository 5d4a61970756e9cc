//! Project-wide scanning: metrics, risk and an architectural summary.

use std::collections::BTreeMap;

use async_trait::async_trait;
use model::Finding;
use risk::{CodeMetrics, RiskPredictor};
use tracing::info;

use crate::error::AgentError;
use crate::traits::{ProjectScanResult, ProjectScanner};

/// Project scanner backed by the risk crate's metrics and predictor.
#[derive(Default)]
pub struct MetricsProjectScanner {
    predictor: RiskPredictor,
}

impl MetricsProjectScanner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProjectScanner for MetricsProjectScanner {
    async fn scan_entire_project(
        &self,
        files: &BTreeMap<String, String>,
        findings: &[Finding],
    ) -> Result<ProjectScanResult, AgentError> {
        let metrics = CodeMetrics::from_files(files);
        let architecture = architectural_summary(&metrics);
        let assessment = self
            .predictor
            .assess(&metrics, findings, Some(&architecture));

        info!(
            files = metrics.total_files,
            lines = metrics.total_lines,
            risk = %assessment.risk_level,
            "project scan complete"
        );

        Ok(ProjectScanResult {
            recommendations: assessment.recommendations.clone(),
            risk_assessment: assessment,
            complexity_metrics: metrics,
            architectural_analysis: architecture,
        })
    }
}

/// Human-readable architecture summary assembled from the metrics.
fn architectural_summary(metrics: &CodeMetrics) -> String {
    let mut text = String::new();
    text.push_str(&format!(
        "The project spans {} files and {} lines of code.\n",
        metrics.total_files, metrics.total_lines
    ));

    if !metrics.language_distribution.is_empty() {
        let mut languages: Vec<(&String, &usize)> = metrics.language_distribution.iter().collect();
        languages.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        let listed: Vec<String> = languages
            .iter()
            .map(|(language, count)| format!("{language} ({count})"))
            .collect();
        text.push_str(&format!("Language distribution: {}.\n", listed.join(", ")));
    }

    if let Some((file, lines)) = metrics.size_metrics.largest_files.first() {
        text.push_str(&format!("The largest file is {file} with {lines} lines.\n"));
    }

    let high = metrics.complexity.high_complexity_functions.len();
    if high > 0 {
        text.push_str(&format!(
            "{high} functions exceed the complexity threshold and are refactoring candidates.\n"
        ));
    }
    if metrics.size_metrics.files_over_threshold > 0 {
        text.push_str(&format!(
            "{} files exceed 500 lines and may benefit from splitting.\n",
            metrics.size_metrics.files_over_threshold
        ));
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scan_produces_metrics_and_assessment() {
        let scanner = MetricsProjectScanner::new();
        let mut files = BTreeMap::new();
        files.insert("src/a.py".to_string(), "def f():\n    return 1\n".to_string());
        files.insert("src/b.py".to_string(), "x = 1\n".to_string());

        let result = scanner.scan_entire_project(&files, &[]).await.unwrap();
        assert_eq!(result.complexity_metrics.total_files, 2);
        assert!(result.architectural_analysis.contains("2 files"));
        assert_eq!(
            result.recommendations,
            result.risk_assessment.recommendations
        );
    }

    #[tokio::test]
    async fn test_scan_of_empty_project_is_minimal_risk() {
        let scanner = MetricsProjectScanner::new();
        let result = scanner
            .scan_entire_project(&BTreeMap::new(), &[])
            .await
            .unwrap();
        assert_eq!(result.risk_assessment.risk_level, risk::RiskLevel::Minimal);
    }
}
